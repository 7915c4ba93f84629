//! Published trampoline slots

use std::sync::atomic::{AtomicUsize, Ordering};

/// Slot holding the trampoline that reaches an unhooked function
///
/// Written once by the interceptor before the target is patched, so a
/// replacement entered through the patch always observes a published value.
#[derive(Debug, Default)]
pub struct OriginalFn(AtomicUsize);

impl OriginalFn {
    pub const fn empty() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Record the trampoline address
    pub fn publish(&self, trampoline: *const ()) {
        self.0.store(trampoline as usize, Ordering::Release);
    }

    /// Withdraw the trampoline after a failed install
    pub fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn get(&self) -> Option<*const ()> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            addr => Some(addr as *const ()),
        }
    }

    pub fn is_published(&self) -> bool {
        self.get().is_some()
    }

    /// Reinterpret the trampoline as a function pointer
    ///
    /// # Safety
    /// `F` must be a function pointer type matching the hooked function's ABI.
    pub unsafe fn get_as<F: Copy>(&self) -> Option<F> {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());
        self.get().map(|ptr| std::mem::transmute_copy::<*const (), F>(&ptr))
    }
}
