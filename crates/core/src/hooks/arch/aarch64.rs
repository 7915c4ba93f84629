//! AArch64 entry patching
//!
//! The patch is `ldr x16, #8; br x16; .quad replacement`. The four displaced
//! instructions are copied into the trampoline, PC-relative ones rewritten
//! into absolute sequences that go through x17.

use super::PreparedHook;
use crate::hooks::inline::HookError;
use crate::hooks::patch;
use crate::hooks::trampoline::alloc_trampoline_sized;

/// Bytes overwritten at the target
pub(crate) const PATCH_SIZE: usize = 16;

const DISPLACED: usize = PATCH_SIZE / 4;

const LDR_X16_LIT8: u32 = 0x5800_0050;
const LDR_X17_LIT8: u32 = 0x5800_0051;
const BR_X16: u32 = 0xD61F_0200;
const BR_X17: u32 = 0xD61F_0220;
const BLR_X17: u32 = 0xD63F_0220;
const B_FWD_12: u32 = 0x1400_0003;
const NOP: u32 = 0xD503_201F;
const X17: u32 = 17;

/// Longest rewrite is 5 words plus a 2-word literal; four of those plus the jump back
const MAX_TRAMPOLINE_WORDS: usize = DISPLACED * 6 + 4;

/// Classification of an instruction that reads the PC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PcRelative {
    B,
    Bl,
    BCond,
    Cbz,
    Tbz,
    Adr,
    Adrp,
    LdrW,
    LdrX,
    Ldrsw,
    LdrS,
    LdrD,
    LdrQ,
    Prfm,
}

fn classify(insn: u32) -> Option<PcRelative> {
    use PcRelative::*;
    match insn {
        i if i & 0xFC00_0000 == 0x1400_0000 => Some(B),
        i if i & 0xFC00_0000 == 0x9400_0000 => Some(Bl),
        i if i & 0xFF00_0010 == 0x5400_0000 => Some(BCond),
        i if i & 0x7E00_0000 == 0x3400_0000 => Some(Cbz),
        i if i & 0x7E00_0000 == 0x3600_0000 => Some(Tbz),
        i if i & 0x9F00_0000 == 0x1000_0000 => Some(Adr),
        i if i & 0x9F00_0000 == 0x9000_0000 => Some(Adrp),
        i if i & 0xFF00_0000 == 0x1800_0000 => Some(LdrW),
        i if i & 0xFF00_0000 == 0x5800_0000 => Some(LdrX),
        i if i & 0xFF00_0000 == 0x9800_0000 => Some(Ldrsw),
        i if i & 0xFF00_0000 == 0x1C00_0000 => Some(LdrS),
        i if i & 0xFF00_0000 == 0x5C00_0000 => Some(LdrD),
        i if i & 0xFF00_0000 == 0x9C00_0000 => Some(LdrQ),
        i if i & 0xFF00_0000 == 0xD800_0000 => Some(Prfm),
        _ => None,
    }
}

/// Sign-extend the low `bits` bits of `value`
fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value as i64) << shift) >> shift
}

fn imm19_target(insn: u32, pc: u64) -> u64 {
    let offset = sign_extend((insn >> 5) & 0x7_FFFF, 19) << 2;
    pc.wrapping_add(offset as u64)
}

fn adr_imm(insn: u32) -> i64 {
    let immlo = (insn >> 29) & 0x3;
    let immhi = (insn >> 5) & 0x7_FFFF;
    sign_extend((immhi << 2) | immlo, 21)
}

/// Output buffer of instruction words
struct Emitter {
    words: Vec<u32>,
}

impl Emitter {
    fn new() -> Self {
        Self {
            words: Vec::with_capacity(MAX_TRAMPOLINE_WORDS),
        }
    }

    fn push(&mut self, word: u32) {
        self.words.push(word);
    }

    fn literal(&mut self, value: u64) {
        self.words.push(value as u32);
        self.words.push((value >> 32) as u32);
    }

    /// `ldr x17, #8; br x17; .quad dest`
    fn jump_x17(&mut self, dest: u64) {
        self.push(LDR_X17_LIT8);
        self.push(BR_X17);
        self.literal(dest);
    }

    /// `ldr x17, #8; b #12; .quad addr; <load through x17>`
    fn load_via_x17(&mut self, addr: u64, load: u32) {
        self.push(LDR_X17_LIT8);
        self.push(B_FWD_12);
        self.literal(addr);
        self.push(load);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

/// Append the position-independent equivalent of `insn`, originally at `pc`
fn relocate(insn: u32, pc: u64, out: &mut Emitter) -> Result<(), HookError> {
    let rt = insn & 0x1F;
    let Some(kind) = classify(insn) else {
        out.push(insn);
        return Ok(());
    };

    match kind {
        PcRelative::B => {
            let dest = pc.wrapping_add((sign_extend(insn & 0x03FF_FFFF, 26) << 2) as u64);
            out.jump_x17(dest);
        }
        PcRelative::Bl => {
            let dest = pc.wrapping_add((sign_extend(insn & 0x03FF_FFFF, 26) << 2) as u64);
            out.push(LDR_X17_LIT8);
            out.push(B_FWD_12);
            out.literal(dest);
            out.push(BLR_X17);
        }
        PcRelative::BCond => {
            let cond = insn & 0xF;
            // AL and NV have no inverse
            if cond >= 0xE {
                return Err(HookError::RelocationFailed(format!(
                    "unconditional b.cond at {pc:#x}"
                )));
            }
            // Inverted condition skips the 16-byte far jump
            out.push(0x5400_0000 | (5 << 5) | (cond ^ 1));
            out.jump_x17(imm19_target(insn, pc));
        }
        PcRelative::Cbz => {
            let dest = imm19_target(insn, pc);
            out.push(((insn ^ (1 << 24)) & !(0x7_FFFF << 5)) | (5 << 5));
            out.jump_x17(dest);
        }
        PcRelative::Tbz => {
            let offset = sign_extend((insn >> 5) & 0x3FFF, 14) << 2;
            let dest = pc.wrapping_add(offset as u64);
            out.push(((insn ^ (1 << 24)) & !(0x3FFF << 5)) | (5 << 5));
            out.jump_x17(dest);
        }
        PcRelative::Adr | PcRelative::Adrp => {
            let value = if kind == PcRelative::Adr {
                pc.wrapping_add(adr_imm(insn) as u64)
            } else {
                (pc & !0xFFF).wrapping_add((adr_imm(insn) << 12) as u64)
            };
            // ldr xd, #8; b #12; .quad value
            out.push(0x5800_0040 | rt);
            out.push(B_FWD_12);
            out.literal(value);
        }
        PcRelative::LdrW => out.load_via_x17(imm19_target(insn, pc), 0xB940_0000 | (X17 << 5) | rt),
        PcRelative::LdrX => out.load_via_x17(imm19_target(insn, pc), 0xF940_0000 | (X17 << 5) | rt),
        PcRelative::Ldrsw => {
            out.load_via_x17(imm19_target(insn, pc), 0xB980_0000 | (X17 << 5) | rt)
        }
        PcRelative::LdrS => out.load_via_x17(imm19_target(insn, pc), 0xBD40_0000 | (X17 << 5) | rt),
        PcRelative::LdrD => out.load_via_x17(imm19_target(insn, pc), 0xFD40_0000 | (X17 << 5) | rt),
        PcRelative::LdrQ => out.load_via_x17(imm19_target(insn, pc), 0x3DC0_0000 | (X17 << 5) | rt),
        PcRelative::Prfm => out.push(NOP),
    }
    Ok(())
}

/// The 16-byte absolute jump written over the target entry
pub(crate) fn entry_patch(replacement: u64) -> [u8; PATCH_SIZE] {
    let mut bytes = [0u8; PATCH_SIZE];
    bytes[0..4].copy_from_slice(&LDR_X16_LIT8.to_le_bytes());
    bytes[4..8].copy_from_slice(&BR_X16.to_le_bytes());
    bytes[8..16].copy_from_slice(&replacement.to_le_bytes());
    bytes
}

/// Build the trampoline for `target` and the patch redirecting it to `replacement`
///
/// # Safety
/// `target` must point to at least 16 bytes of readable code.
pub(crate) unsafe fn prepare(
    target: *const u8,
    replacement: *const (),
) -> Result<PreparedHook, HookError> {
    let code = build_trampoline(target)?;

    let slot = alloc_trampoline_sized(target, code.len()).ok_or(HookError::AllocationFailed)?;
    patch::emit(slot.as_ptr(), &code);

    Ok(PreparedHook {
        trampoline: slot,
        patch: entry_patch(replacement as u64).to_vec(),
    })
}

unsafe fn build_trampoline(target: *const u8) -> Result<Vec<u8>, HookError> {
    let base = target as u64;
    let mut out = Emitter::new();

    for i in 0..DISPLACED {
        let insn = std::ptr::read_unaligned(target.add(i * 4) as *const u32);
        relocate(insn, base + (i * 4) as u64, &mut out)?;
    }

    // ldr x16, #8; br x16; .quad target+16
    out.push(LDR_X16_LIT8);
    out.push(BR_X16);
    out.literal(base + PATCH_SIZE as u64);

    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relocated(insn: u32, pc: u64) -> Vec<u32> {
        let mut out = Emitter::new();
        relocate(insn, pc, &mut out).unwrap();
        out.words
    }

    #[test]
    fn test_plain_instruction_copied() {
        // stp x29, x30, [sp, #-16]!
        assert_eq!(relocated(0xA9BF_7BFD, 0x1000), vec![0xA9BF_7BFD]);
    }

    #[test]
    fn test_branch_becomes_absolute() {
        // b #+0x100
        let words = relocated(0x1400_0040, 0x1000);
        assert_eq!(words, vec![LDR_X17_LIT8, BR_X17, 0x1100, 0]);
    }

    #[test]
    fn test_bl_keeps_link() {
        // bl #-8
        let words = relocated(0x97FF_FFFE, 0x2000);
        assert_eq!(words, vec![LDR_X17_LIT8, B_FWD_12, 0x1FF8, 0, BLR_X17]);
    }

    #[test]
    fn test_adrp_materializes_page() {
        // adrp x0, #0x1000
        let words = relocated(0xB000_0000, 0x4321_0123);
        assert_eq!(words[0], 0x5800_0040);
        assert_eq!(words[2] as u64 | ((words[3] as u64) << 32), 0x4321_1000);
    }

    #[test]
    fn test_cbz_inverted() {
        // cbz x1, #+8
        let words = relocated(0xB400_0041, 0x1000);
        assert_eq!(words[0], 0xB500_00A1);
        assert_eq!(words[3], 0x1008);
    }

    #[test]
    fn test_ldr_literal_loads_through_scratch() {
        // ldr x2, #+16
        let words = relocated(0x5800_0082, 0x1000);
        assert_eq!(words, vec![LDR_X17_LIT8, B_FWD_12, 0x1010, 0, 0xF940_0222]);
    }

    #[test]
    fn test_entry_patch_layout() {
        let bytes = entry_patch(0x1122_3344_5566_7788);
        assert_eq!(&bytes[0..4], &LDR_X16_LIT8.to_le_bytes());
        assert_eq!(&bytes[4..8], &BR_X16.to_le_bytes());
        assert_eq!(&bytes[8..], &0x1122_3344_5566_7788u64.to_le_bytes());
    }
}
