//! Raw state snapshots: a fixed register block followed by the full
//! 64 KiB guest image. No header, no version.

use std::path::Path;

use crate::regs::Flags;
use crate::traits::GUEST_SPACE;
use crate::{CoreError, Cpu, MemoryMapper, Result};

/// Size of the register/flag block at the front of a snapshot.
pub const STATE_BLOCK_LEN: usize = 16;

/// Total size of a snapshot file.
pub const SNAPSHOT_LEN: usize = STATE_BLOCK_LEN + GUEST_SPACE;

fn state_block(cpu: &Cpu) -> [u8; STATE_BLOCK_LEN] {
    let mut block = [0u8; STATE_BLOCK_LEN];
    block[0] = cpu.a;
    block[1] = cpu.b;
    block[2] = cpu.c;
    block[3] = cpu.d;
    block[4] = cpu.e;
    block[5] = cpu.h;
    block[6] = cpu.l;
    block[7..9].copy_from_slice(&cpu.sp.to_le_bytes());
    block[9..11].copy_from_slice(&cpu.pc.to_le_bytes());
    block[11] = cpu.flags.to_psw_byte();
    block[12] = cpu.interrupts_enabled() as u8;
    block[13] = cpu.halted() as u8;
    block[14] = cpu.last_opcode();
    // block[15] reserved, always zero.
    block
}

/// Dump the register block and the full guest image to `path`. Memory is
/// traversed through the read-only iterator, so a shared reference
/// suffices.
pub fn save_state(path: &Path, cpu: &Cpu, mem: &impl MemoryMapper) -> Result<()> {
    let mut image = Vec::with_capacity(SNAPSHOT_LEN);
    image.extend_from_slice(&state_block(cpu));
    for byte in mem.iter_guest() {
        image.push(byte?);
    }
    std::fs::write(path, image)
        .map_err(|err| CoreError::InvalidOpcode(format!("failed to write state file: {err}")))
}

/// Restore a snapshot written by [`save_state`]. Files of any other size
/// are rejected.
pub fn load_state(path: &Path, cpu: &mut Cpu, mem: &mut impl MemoryMapper) -> Result<()> {
    let image = std::fs::read(path)
        .map_err(|err| CoreError::InvalidOpcode(format!("failed to open state file: {err}")))?;
    if image.len() != SNAPSHOT_LEN {
        return Err(CoreError::MemoryAccessViolation(format!(
            "state file is {} bytes, expected {SNAPSHOT_LEN}",
            image.len()
        )));
    }

    cpu.a = image[0];
    cpu.b = image[1];
    cpu.c = image[2];
    cpu.d = image[3];
    cpu.e = image[4];
    cpu.h = image[5];
    cpu.l = image[6];
    cpu.sp = u16::from_le_bytes([image[7], image[8]]);
    cpu.pc = u16::from_le_bytes([image[9], image[10]]);
    cpu.flags = Flags::from_psw_byte(image[11]);
    cpu.set_interrupts_enabled(image[12] != 0);
    cpu.set_halted(image[13] != 0);
    cpu.set_last_opcode(image[14]);

    for (offset, byte) in image[STATE_BLOCK_LEN..].iter().enumerate() {
        mem.write(offset as u16, *byte)?;
    }
    Ok(())
}
