//! Interception seam used by the attach sequence

use super::inline::{create_inline_hook, HookError};
use super::original::OriginalFn;

/// A function redirection that is now live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledHook {
    pub target: usize,
    pub replacement: usize,
    pub trampoline: usize,
}

/// Installs redirections of native functions
pub trait Interceptor: Send + Sync {
    /// Redirect `target` to `replacement`, publishing the trampoline into `original`
    ///
    /// # Safety
    /// `target` and `replacement` must be functions with identical signatures.
    unsafe fn intercept(
        &self,
        name: &str,
        target: *const (),
        replacement: *const (),
        original: &OriginalFn,
    ) -> Result<InstalledHook, HookError>;
}

/// Interceptor that patches function entries in place
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineInterceptor;

impl Interceptor for InlineInterceptor {
    unsafe fn intercept(
        &self,
        name: &str,
        target: *const (),
        replacement: *const (),
        original: &OriginalFn,
    ) -> Result<InstalledHook, HookError> {
        create_inline_hook(name, target, replacement, original)?;
        let trampoline = original.get().ok_or(HookError::AllocationFailed)?;
        Ok(InstalledHook {
            target: target as usize,
            replacement: replacement as usize,
            trampoline: trampoline as usize,
        })
    }
}
