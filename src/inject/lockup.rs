//! The trap machine behind time-triggered instruction faults.
//!
//! Tripping it pins execution to one spot: the word at the current
//! program counter is saved and replaced with a trap word, and as soon
//! as the core is observed somewhere else the original word goes back,
//! so the program image is intact once the campaign ends.

use serde::{Deserialize, Serialize};

use crate::host::Machine;
use crate::inject::{read_insn_word, write_insn_word};

/// Marker word an access-triggered execution fault arms on. Campaigns
/// plant it in the instruction stream where the fault should land.
pub const EXECUTION_ARM_MARKER: u64 = 0xDEAD_BEEF;

/// `MOV R8, R8`, the classic ARM no-op. Replaces a marker word when an
/// execution fault fires, so the marked instruction never runs.
pub const NOP_MOV_R8_R8: u32 = 0xE1A0_8008;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum Phase {
    #[default]
    Armed,
    Engaged { pc: u64, saved: u32 },
}

/// Saved-instruction state for the one in-flight trap.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Lockup {
    phase: Phase,
}

impl Lockup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any saved instruction without restoring it. Runs when a
    /// new campaign loads over the old program image.
    pub fn reset(&mut self) {
        self.phase = Phase::Armed;
    }

    pub fn is_engaged(&self) -> bool {
        matches!(self.phase, Phase::Engaged { .. })
    }

    /// One periodic step. Armed: trap the instruction at the current
    /// pc. Engaged: once the core shows up anywhere else, put the
    /// saved word back and re-arm for the next firing.
    pub fn trip<M: Machine>(&mut self, m: &mut M, trap_word: u32) {
        match self.phase {
            Phase::Armed => {
                let pc = m.program_counter();
                let saved = read_insn_word(m, pc);
                write_insn_word(m, pc, trap_word);
                self.phase = Phase::Engaged { pc, saved };
            }
            Phase::Engaged { pc, saved } => {
                if m.program_counter() != pc {
                    write_insn_word(m, pc, saved);
                    self.phase = Phase::Armed;
                }
            }
        }
    }
}
