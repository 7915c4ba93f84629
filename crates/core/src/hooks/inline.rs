//! Inline function hooks
//!
//! Overwrites the entry of a function with a branch to a replacement and
//! keeps a trampoline that runs the displaced prologue before resuming the
//! original body. At most one hook may exist per target address; hooks stay
//! installed for the lifetime of the process.

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use std::sync::LazyLock;

use super::arch;
use super::original::OriginalFn;
use super::patch;

new_key_type! {
    /// Handle for an inline hook
    pub struct InlineHookKey;
}

/// Error type for hook operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Invalid address: {0:x}")]
    InvalidAddress(usize),

    #[error("Target {target:x} is already hooked by '{existing}'")]
    AlreadyHooked { target: usize, existing: String },

    #[error("Failed to allocate trampoline memory")]
    AllocationFailed,

    #[error("Memory protection failed: {0}")]
    MemoryProtection(String),

    #[error("Instruction relocation failed: {0}")]
    RelocationFailed(String),

    #[error("Inline hooks are not supported on {0}")]
    UnsupportedArchitecture(&'static str),
}

/// Internal storage for an inline hook
struct InlineHookEntry {
    target: usize,
    replacement: usize,
    trampoline: usize,
    patch_len: usize,
    name: String,
}

/// Public view of an installed hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineHookInfo {
    pub name: String,
    pub target: usize,
    pub replacement: usize,
    pub trampoline: usize,
    pub patch_len: usize,
}

#[derive(Default)]
struct InlineHookRegistry {
    hooks: SlotMap<InlineHookKey, InlineHookEntry>,
    by_target: HashMap<usize, InlineHookKey>,
}

/// Global inline hook registry
///
/// Patched code is process-wide, so the one-hook-per-target rule is too.
static INLINE_HOOKS: LazyLock<RwLock<InlineHookRegistry>> =
    LazyLock::new(|| RwLock::new(InlineHookRegistry::default()));

/// Create an inline hook for a function
///
/// The trampoline is published into `original` before the target is
/// patched.
///
/// # Safety
/// - `target` must be the entry of a function at least as long as the patch
/// - `replacement` must be a function with the same signature and ABI
pub unsafe fn create_inline_hook(
    name: &str,
    target: *const (),
    replacement: *const (),
    original: &OriginalFn,
) -> Result<InlineHookKey, HookError> {
    if target.is_null() {
        return Err(HookError::InvalidAddress(0));
    }
    if replacement.is_null() {
        return Err(HookError::InvalidAddress(0));
    }

    tracing::debug!(
        "Creating inline hook '{}' at {:x} -> {:x}",
        name,
        target as usize,
        replacement as usize
    );

    // Held across the patch so two installers cannot race on one target
    let mut registry = INLINE_HOOKS.write();
    if let Some(&existing) = registry.by_target.get(&(target as usize)) {
        let existing = registry.hooks[existing].name.clone();
        tracing::warn!(
            "Refusing to hook '{}' at {:x}: already hooked by '{}'",
            name,
            target as usize,
            existing
        );
        return Err(HookError::AlreadyHooked {
            target: target as usize,
            existing,
        });
    }

    let prepared = arch::prepare(target as *const u8, replacement).inspect_err(|e| {
        tracing::error!("Failed to prepare inline hook '{}': {}", name, e);
    })?;

    let trampoline = prepared.trampoline.as_ptr() as *const ();
    publish_and_patch(original, trampoline, || {
        patch::write_code(target as *mut u8, &prepared.patch)
    })
    .inspect_err(|e| {
        tracing::error!("Failed to patch '{}' at {:x}: {}", name, target as usize, e);
    })?;

    let key = registry.hooks.insert(InlineHookEntry {
        target: target as usize,
        replacement: replacement as usize,
        trampoline: trampoline as usize,
        patch_len: prepared.patch.len(),
        name: name.to_string(),
    });
    registry.by_target.insert(target as usize, key);

    tracing::info!(
        "Created inline hook '{}' at {:x} (trampoline {:x})",
        name,
        target as usize,
        trampoline as usize
    );

    Ok(key)
}

/// Whether some hook already owns `target`
pub fn is_hooked(target: *const ()) -> bool {
    INLINE_HOOKS.read().by_target.contains_key(&(target as usize))
}

/// Describe an installed hook
pub fn inline_hook_info(key: InlineHookKey) -> Option<InlineHookInfo> {
    INLINE_HOOKS.read().hooks.get(key).map(|e| InlineHookInfo {
        name: e.name.clone(),
        target: e.target,
        replacement: e.replacement,
        trampoline: e.trampoline,
        patch_len: e.patch_len,
    })
}

/// Publish `trampoline`, then apply the patch, withdrawing it again if the patch fails
fn publish_and_patch(
    original: &OriginalFn,
    trampoline: *const (),
    patch: impl FnOnce() -> Result<(), HookError>,
) -> Result<(), HookError> {
    original.publish(trampoline);
    patch().inspect_err(|_| original.clear())
}

/// Number of installed hooks
pub fn inline_hook_count() -> usize {
    INLINE_HOOKS.read().hooks.len()
}

#[cfg(all(test, any(target_arch = "x86_64", target_arch = "aarch64")))]
mod tests {
    use super::*;
    use std::hint::black_box;

    type MixFn = extern "C" fn(u64) -> u64;

    static MIX_ORIGINAL: OriginalFn = OriginalFn::empty();

    #[inline(never)]
    extern "C" fn mix(x: u64) -> u64 {
        let a = black_box(x).wrapping_mul(3);
        let b = black_box(a).rotate_left(7);
        black_box(b ^ 0x55).wrapping_add(1)
    }

    extern "C" fn mix_replacement(x: u64) -> u64 {
        let original: MixFn = unsafe { MIX_ORIGINAL.get_as() }.unwrap();
        original(x).wrapping_add(1000)
    }

    #[test]
    fn test_hook_redirects_and_trampoline_reaches_original() {
        let call: MixFn = black_box(mix as MixFn);
        let expected = call(5);

        let key = unsafe {
            create_inline_hook(
                "mix",
                mix as *const (),
                mix_replacement as *const (),
                &MIX_ORIGINAL,
            )
        }
        .unwrap();

        assert_eq!(call(5), expected.wrapping_add(1000));
        assert!(is_hooked(mix as *const ()));
        assert!(inline_hook_count() >= 1);

        let info = inline_hook_info(key).unwrap();
        assert_eq!(info.name, "mix");
        assert_eq!(info.target, mix as usize);
        assert_eq!(Some(info.trampoline as *const ()), MIX_ORIGINAL.get());

        // A second hook on the same entry is refused and leaves the first intact
        let other = OriginalFn::empty();
        let result = unsafe {
            create_inline_hook("mix-again", mix as *const (), mix_replacement as *const (), &other)
        };
        assert!(matches!(result, Err(HookError::AlreadyHooked { .. })));
        assert!(!other.is_published());
        assert_eq!(call(5), expected.wrapping_add(1000));
    }

    #[test]
    fn test_failed_patch_withdraws_trampoline() {
        let slot = OriginalFn::empty();
        let result = publish_and_patch(&slot, mix as *const (), || {
            assert!(slot.is_published());
            Err(HookError::MemoryProtection("read-only".to_string()))
        });
        assert!(matches!(result, Err(HookError::MemoryProtection(_))));
        assert!(!slot.is_published());

        assert!(publish_and_patch(&slot, mix as *const (), || Ok(())).is_ok());
        assert_eq!(slot.get(), Some(mix as *const ()));
    }

    #[test]
    fn test_null_target_rejected() {
        let slot = OriginalFn::empty();
        let result = unsafe {
            create_inline_hook("null", std::ptr::null(), mix_replacement as *const (), &slot)
        };
        assert!(matches!(result, Err(HookError::InvalidAddress(0))));
        assert!(!slot.is_published());
    }
}
