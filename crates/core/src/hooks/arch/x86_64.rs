//! x86_64 entry patching
//!
//! The target entry becomes a `jmp rel32` to a relay stub allocated within
//! ±2GB, and the relay does `jmp [rip+0]` to the replacement. Displaced
//! instructions are re-encoded into the trampoline by iced's block encoder,
//! which fixes up relative branches and RIP-relative operands.

use iced_x86::{
    BlockEncoder, BlockEncoderOptions, Code, Decoder, DecoderOptions, FlowControl, Instruction,
    InstructionBlock,
};

use super::PreparedHook;
use crate::hooks::inline::HookError;
use crate::hooks::patch;
use crate::hooks::trampoline::{alloc_trampoline, alloc_trampoline_sized, is_near, TRAMPOLINE_SIZE};

const JMP_REL32_LEN: usize = 5;
const ABS_JMP_LEN: usize = 14;
/// An instruction starting inside the patch ends within 15 more bytes
const DECODE_WINDOW: usize = JMP_REL32_LEN + 15;

/// `jmp qword ptr [rip+0]; dq dest`
fn absolute_jump(dest: u64) -> [u8; ABS_JMP_LEN] {
    let mut bytes = [0u8; ABS_JMP_LEN];
    bytes[0] = 0xFF;
    bytes[1] = 0x25;
    bytes[6..].copy_from_slice(&dest.to_le_bytes());
    bytes
}

fn relative_jump(from: u64, to: u64) -> Option<[u8; JMP_REL32_LEN]> {
    let disp = (to as i64).wrapping_sub(from as i64 + JMP_REL32_LEN as i64);
    let disp = i32::try_from(disp).ok()?;
    let mut bytes = [0u8; JMP_REL32_LEN];
    bytes[0] = 0xE9;
    bytes[1..].copy_from_slice(&disp.to_le_bytes());
    Some(bytes)
}

/// Decode whole instructions from `target` until at least five bytes are covered
unsafe fn displaced_instructions(target: *const u8) -> Result<(Vec<Instruction>, usize), HookError> {
    let window = std::slice::from_raw_parts(target, DECODE_WINDOW);
    let mut decoder = Decoder::with_ip(64, window, target as u64, DecoderOptions::NONE);

    let mut instructions = Vec::new();
    let mut stolen = 0usize;
    while stolen < JMP_REL32_LEN {
        let insn = decoder.decode();
        if insn.is_invalid() {
            return Err(HookError::RelocationFailed(format!(
                "undecodable instruction at {:#x}",
                insn.ip()
            )));
        }
        stolen += insn.len();
        instructions.push(insn);

        let ends_flow = matches!(
            insn.flow_control(),
            FlowControl::Return | FlowControl::UnconditionalBranch | FlowControl::IndirectBranch
        );
        if ends_flow && stolen < JMP_REL32_LEN {
            return Err(HookError::RelocationFailed(format!(
                "function at {:#x} is shorter than the patch",
                target as usize
            )));
        }
    }
    Ok((instructions, stolen))
}

/// Build the trampoline and relay for `target`
///
/// # Safety
/// `target` must point to readable code with a decodable prologue.
pub(crate) unsafe fn prepare(
    target: *const u8,
    replacement: *const (),
) -> Result<PreparedHook, HookError> {
    let (mut instructions, stolen) = displaced_instructions(target)?;

    let trampoline = alloc_trampoline(target).ok_or(HookError::AllocationFailed)?;
    let resume = target as u64 + stolen as u64;
    let jump_back = Instruction::with_branch(Code::Jmp_rel32_64, resume)
        .map_err(|e| HookError::RelocationFailed(e.to_string()))?;
    instructions.push(jump_back);

    let block = InstructionBlock::new(&instructions, trampoline.as_ptr() as u64);
    let encoded = BlockEncoder::encode(64, block, BlockEncoderOptions::NONE)
        .map_err(|e| HookError::RelocationFailed(e.to_string()))?;
    if encoded.code_buffer.len() > TRAMPOLINE_SIZE {
        return Err(HookError::RelocationFailed(format!(
            "relocated prologue of {:#x} needs {} bytes",
            target as usize,
            encoded.code_buffer.len()
        )));
    }
    patch::emit(trampoline.as_ptr(), &encoded.code_buffer);

    let relay = alloc_trampoline_sized(target, ABS_JMP_LEN).ok_or(HookError::AllocationFailed)?;
    if !is_near(target, relay.as_ptr()) {
        return Err(HookError::AllocationFailed);
    }
    patch::emit(relay.as_ptr(), &absolute_jump(replacement as u64));

    let jump = relative_jump(target as u64, relay.as_ptr() as u64).ok_or(HookError::AllocationFailed)?;
    let mut bytes = jump.to_vec();
    // Pad the tail of a split instruction so disassembly stays readable
    bytes.resize(stolen, 0xCC);

    Ok(PreparedHook {
        trampoline,
        patch: bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_jump_encoding() {
        let bytes = relative_jump(0x1000, 0x2000).unwrap();
        assert_eq!(bytes[0], 0xE9);
        assert_eq!(i32::from_le_bytes(bytes[1..].try_into().unwrap()), 0x2000 - 0x1005);
    }

    #[test]
    fn test_relative_jump_out_of_range() {
        assert!(relative_jump(0x1000, 0x1_0000_1000).is_none());
    }

    #[test]
    fn test_absolute_jump_layout() {
        let bytes = absolute_jump(0xDEAD_BEEF_0000_1234);
        assert_eq!(&bytes[..6], &[0xFF, 0x25, 0, 0, 0, 0]);
        assert_eq!(&bytes[6..], &0xDEAD_BEEF_0000_1234u64.to_le_bytes());
    }

    #[test]
    fn test_displaced_covers_patch() {
        // push rbp; mov rbp, rsp; sub rsp, 0x20; ret
        let code: [u8; 32] = {
            let mut c = [0x90u8; 32];
            c[..9].copy_from_slice(&[0x55, 0x48, 0x89, 0xE5, 0x48, 0x83, 0xEC, 0x20, 0xC3]);
            c
        };
        let (instructions, stolen) = unsafe { displaced_instructions(code.as_ptr()).unwrap() };
        assert_eq!(instructions.len(), 3);
        assert_eq!(stolen, 8);
    }

    #[test]
    fn test_short_function_rejected() {
        // xor eax, eax; ret
        let mut code = [0xCCu8; 32];
        code[..3].copy_from_slice(&[0x31, 0xC0, 0xC3]);
        let result = unsafe { displaced_instructions(code.as_ptr()) };
        assert!(matches!(result, Err(HookError::RelocationFailed(_))));
    }
}
