//! Executable memory for trampolines and relay stubs
//!
//! Slots are bump-allocated out of anonymous RWX pages that are never
//! unmapped. x86_64 patches reach their relay with a `jmp rel32`, so new pages
//! are requested as close to the hooked function as the kernel allows;
//! aarch64 stubs branch absolutely and accept any placement.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use parking_lot::Mutex;

const PAGE_SIZE: usize = 4096;

/// Room for a relocated prologue plus the jump back
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
pub(crate) const TRAMPOLINE_SIZE: usize = 128;

const SLOT_ALIGN: usize = 16;

/// Reach of a signed 32-bit displacement, minus a safety margin
const MAX_RANGE: usize = 0x7FFF_0000;

/// Spacing between placement hints
const HINT_STEP: usize = PAGE_SIZE * 64;

/// Hints tried on each side of the target
const MAX_PROBES: usize = 2048;

static ARENA: Mutex<CodeArena> = Mutex::new(CodeArena { pages: Vec::new() });

struct CodePage {
    base: usize,
    used: usize,
}

impl CodePage {
    fn take(&mut self, size: usize) -> Option<NonNull<u8>> {
        if self.used + size > PAGE_SIZE {
            return None;
        }
        let slot = self.base + self.used;
        self.used += size;
        NonNull::new(slot as *mut u8)
    }
}

struct CodeArena {
    pages: Vec<CodePage>,
}

impl CodeArena {
    fn reserve(&mut self, target: usize, size: usize) -> Option<NonNull<u8>> {
        let size = size.checked_next_multiple_of(SLOT_ALIGN)?;
        if size == 0 || size > PAGE_SIZE {
            return None;
        }

        let reused = self
            .pages
            .iter_mut()
            .filter(|page| distance(page.base, target) < MAX_RANGE)
            .find_map(|page| page.take(size));
        if reused.is_some() {
            return reused;
        }

        let mut page = CodePage {
            base: map_near(target)?,
            used: 0,
        };
        let slot = page.take(size);
        self.pages.push(page);
        slot
    }
}

fn distance(a: usize, b: usize) -> usize {
    a.abs_diff(b)
}

/// Map one page, nearest free hint first
fn map_near(target: usize) -> Option<usize> {
    let hints = (1..=MAX_PROBES)
        .flat_map(|i| [target.checked_sub(i * HINT_STEP), target.checked_add(i * HINT_STEP)])
        .flatten()
        .map(|hint| hint & !(PAGE_SIZE - 1))
        .filter(|&hint| hint != 0 && distance(hint, target) < MAX_RANGE);

    for hint in hints {
        let Some(base) = map_page(Some(hint)) else {
            continue;
        };
        // Without MAP_FIXED the hint is advisory
        if distance(base, target) < MAX_RANGE {
            return Some(base);
        }
        unmap_page(base);
    }

    let base = map_page(None)?;
    tracing::warn!(
        "No executable page within range of {:#x}, using {:#x}",
        target,
        base
    );
    Some(base)
}

fn map_page(hint: Option<usize>) -> Option<usize> {
    let len = NonZeroUsize::new(PAGE_SIZE)?;
    let prot = ProtFlags::PROT_READ | ProtFlags::PROT_WRITE | ProtFlags::PROT_EXEC;

    match unsafe { mmap_anonymous(hint.and_then(NonZeroUsize::new), len, prot, MapFlags::MAP_PRIVATE) } {
        Ok(ptr) => Some(ptr.as_ptr() as usize),
        Err(e) => {
            tracing::debug!("mmap near {:#x?} failed: {}", hint, e);
            None
        }
    }
}

fn unmap_page(base: usize) {
    if let Some(ptr) = NonNull::new(base as *mut c_void) {
        unsafe {
            let _ = munmap(ptr, PAGE_SIZE);
        }
    }
}

/// Reserve a full trampoline slot near `target`
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
pub(crate) fn alloc_trampoline(target: *const u8) -> Option<NonNull<u8>> {
    alloc_trampoline_sized(target, TRAMPOLINE_SIZE)
}

/// Reserve `size` bytes (rounded up to 16) near `target`
pub(crate) fn alloc_trampoline_sized(target: *const u8, size: usize) -> Option<NonNull<u8>> {
    ARENA.lock().reserve(target as usize, size)
}

/// Whether `ptr` is reachable from `target` with a 32-bit relative displacement
#[cfg_attr(not(target_arch = "x86_64"), allow(dead_code))]
pub(crate) fn is_near(target: *const u8, ptr: *const u8) -> bool {
    distance(target as usize, ptr as usize) < MAX_RANGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slots_are_bumped() {
        let mut page = CodePage {
            base: 0x10000,
            used: 0,
        };
        assert_eq!(page.take(128).map(|p| p.as_ptr() as usize), Some(0x10000));
        assert_eq!(page.take(16).map(|p| p.as_ptr() as usize), Some(0x10080));

        page.used = PAGE_SIZE - 16;
        assert!(page.take(32).is_none());
        assert!(page.take(16).is_some());
    }

    #[test]
    fn test_slots_are_aligned_and_distinct() {
        let target = test_slots_are_aligned_and_distinct as *const u8;

        let a = alloc_trampoline(target).unwrap().as_ptr();
        let b = alloc_trampoline_sized(target, 14).unwrap().as_ptr();
        let c = alloc_trampoline_sized(target, 14).unwrap().as_ptr();

        for ptr in [a, b, c] {
            assert_eq!(ptr as usize % SLOT_ALIGN, 0);
        }
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!((c as usize).abs_diff(b as usize) >= SLOT_ALIGN);
    }

    #[test]
    fn test_slot_near_local_code() {
        let target = test_slot_near_local_code as *const u8;
        let ptr = alloc_trampoline_sized(target, 16).unwrap();
        assert!(is_near(target, ptr.as_ptr()));
    }

    #[test]
    fn test_slot_is_writable() {
        let target = test_slot_is_writable as *const u8;
        let ptr = alloc_trampoline_sized(target, 4).unwrap().as_ptr();
        unsafe {
            ptr.write(0xC3);
            assert_eq!(ptr.read(), 0xC3);
        }
    }

    #[test]
    fn test_oversized_request_rejected() {
        let target = 0x7FFF_0000_2000usize as *const u8;
        assert!(alloc_trampoline_sized(target, PAGE_SIZE + 1).is_none());
    }
}
