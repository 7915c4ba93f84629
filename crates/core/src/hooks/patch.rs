//! Writing machine code into live text pages

use super::inline::HookError;

/// Overwrite `bytes.len()` bytes at `target`
///
/// The page is made writable for the duration of the copy; the previous
/// protection is restored when the guard drops.
///
/// # Safety
/// `target` must point to mapped code that may be overwritten.
pub(crate) unsafe fn write_code(target: *mut u8, bytes: &[u8]) -> Result<(), HookError> {
    let _guard = region::protect_with_handle(
        target as *const u8,
        bytes.len(),
        region::Protection::READ_WRITE_EXECUTE,
    )
    .map_err(|e| HookError::MemoryProtection(e.to_string()))?;

    std::ptr::copy_nonoverlapping(bytes.as_ptr(), target, bytes.len());
    flush_icache(target, bytes.len());
    Ok(())
}

/// Copy freshly generated code into an already executable trampoline slot
///
/// # Safety
/// `dest` must be a trampoline slot with room for `bytes.len()` bytes.
pub(crate) unsafe fn emit(dest: *mut u8, bytes: &[u8]) {
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), dest, bytes.len());
    flush_icache(dest, bytes.len());
}

/// Make instruction fetch observe the bytes just written through the data cache
///
/// # Safety
/// `addr` must point to at least `size` bytes of memory.
#[inline]
pub(crate) unsafe fn flush_icache(addr: *mut u8, size: usize) {
    #[cfg(target_arch = "aarch64")]
    {
        extern "C" {
            fn __clear_cache(beg: *mut libc::c_char, end: *mut libc::c_char);
        }
        __clear_cache(addr as *mut libc::c_char, addr.add(size) as *mut libc::c_char);
    }

    // x86_64 has coherent I-cache, no flush needed.
    #[cfg(not(target_arch = "aarch64"))]
    {
        let _ = (addr, size);
    }
}
