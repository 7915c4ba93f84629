//! Per-architecture patch and trampoline construction

use std::ptr::NonNull;

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(target_arch = "aarch64")]
pub(crate) use aarch64::prepare;
#[cfg(target_arch = "x86_64")]
pub(crate) use x86_64::prepare;

/// Code generated for one hook, ready to be written over the target
pub(crate) struct PreparedHook {
    /// Entry of the relocated prologue; calling it behaves like the unhooked target
    pub trampoline: NonNull<u8>,
    /// Bytes to write at the target entry
    pub patch: Vec<u8>,
}

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
pub(crate) unsafe fn prepare(
    _target: *const u8,
    _replacement: *const (),
) -> Result<PreparedHook, super::HookError> {
    Err(super::HookError::UnsupportedArchitecture(
        std::env::consts::ARCH,
    ))
}
