//! Cell-level injection primitives.
//!
//! Mode engines decide what a corrupted word looks like; this module
//! knows where words live. All cell traffic narrower than a machine
//! word goes through [`read_cell`] and [`write_cell`] so every engine
//! sees the same width handling.

pub mod lockup;

use crate::config::CellWidth;
use crate::faults::{FaultMode, FaultParams, Level, StatusFlag};
use crate::host::{CpuState, Machine, MemoryState};

/// Read one cell, masked to the cell width. Register files index
/// registers 0 through 15; anything above reads the status word.
pub fn read_cell<M: Machine>(m: &M, on_register: bool, addr: u64, width: CellWidth) -> u64 {
    let word = if on_register {
        if addr < 16 {
            m.register(addr as u32)
        } else {
            m.status_flags()
        }
    } else {
        read_memory_word(m, addr, width)
    };
    word & width.mask()
}

/// Write one cell. Bits above the cell width are preserved in
/// registers and never leave the engine for memory.
pub fn write_cell<M: Machine>(
    m: &mut M,
    on_register: bool,
    addr: u64,
    value: u64,
    width: CellWidth,
) {
    let masked = value & width.mask();
    if on_register {
        if addr < 16 {
            let keep = m.register(addr as u32) & !width.mask();
            m.set_register(addr as u32, keep | masked);
        } else {
            m.set_status_flags(masked, width.mask());
        }
    } else {
        let bytes = masked.to_le_bytes();
        m.write(addr, &bytes[..width.bytes()]);
    }
}

pub fn read_memory_word<M: MemoryState>(m: &M, addr: u64, width: CellWidth) -> u64 {
    let mut bytes = [0u8; 8];
    m.read(addr, &mut bytes[..width.bytes()]);
    u64::from_le_bytes(bytes)
}

/// Instructions are whole 32-bit words regardless of the cell width.
pub fn read_insn_word<M: MemoryState>(m: &M, addr: u64) -> u32 {
    let mut bytes = [0u8; 4];
    m.read(addr, &mut bytes);
    u32::from_le_bytes(bytes)
}

pub fn write_insn_word<M: MemoryState>(m: &mut M, addr: u64, insn: u32) {
    m.write(addr, &insn.to_le_bytes());
}

/// Drive one status flag to a level, leaving the others alone.
pub fn apply_status_flag<M: CpuState>(m: &mut M, flag: StatusFlag, level: Level) {
    let value = if level.as_bool() { flag.word_mask() } else { 0 };
    m.set_status_flags(value, flag.word_mask());
}

/// Merge a corrupted word into a base word: attacked bits take the
/// corruption, the rest keep the base. The mask is clamped to the cell
/// width, so bits a campaign names beyond the width never move.
pub fn merge_bits(corrupted: u64, base: u64, mask: u64, width: CellWidth) -> u64 {
    let mask = mask & width.mask();
    (corrupted & mask) | (base & !mask)
}

/// The whole-word corruptions shared by address faults and the
/// periodic injector: `BIT-FLIP`, `NEW VALUE` and stuck-at. `None`
/// for modes that need access context to evaluate.
pub fn mutate_word(mode: FaultMode, params: &FaultParams, old: u64, width: CellWidth) -> Option<u64> {
    let masked = params.mask & width.mask();
    Some(match mode {
        FaultMode::BitFlip => old ^ masked,
        FaultMode::NewValue => params.mask,
        FaultMode::StuckAt => (old & !masked) | (params.set_bit & masked),
        _ => return None,
    })
}
