//! Engine-wide configuration.
//!
//! The controller is generic over the width of the cells it attacks:
//! memory-test campaigns written for 8-, 16- or 32-bit memories all
//! run against the same engine, with the cell width fixed here.

use serde::{Deserialize, Serialize};

/// Width of a memory or register cell as seen by the fault engine.
///
/// Cell reads and writes move `bits() / 8` bytes, little-endian.
/// Operation history and per-bit fault masks are sized to this width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellWidth {
    #[serde(rename = "8")]
    Bits8,
    #[serde(rename = "16")]
    Bits16,
    #[serde(rename = "32")]
    Bits32,
}

impl CellWidth {
    pub fn bits(self) -> u32 {
        match self {
            CellWidth::Bits8 => 8,
            CellWidth::Bits16 => 16,
            CellWidth::Bits32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// All-ones word of this width.
    pub fn mask(self) -> u64 {
        (1u64 << self.bits()) - 1
    }

    /// True if the bit position lies inside a cell of this width.
    pub fn holds_bit(self, bit: u32) -> bool {
        bit < self.bits()
    }
}

impl Default for CellWidth {
    fn default() -> Self {
        CellWidth::Bits32
    }
}

/// Tunables for a [`FaultController`](crate::FaultController).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Width of the cells the campaign targets.
    #[serde(default)]
    pub cell_width: CellWidth,

    /// Mirror register accesses (cell index 0..=15) into the access profile.
    #[serde(default)]
    pub profile_registers: bool,

    /// Mirror memory accesses into the access profile.
    #[serde(default)]
    pub profile_memory: bool,

    /// Scale intermittent intervals as milliseconds no matter which unit
    /// suffix the campaign wrote, as older campaign files expect. When
    /// off, every time field is scaled by its own suffix.
    #[serde(default)]
    pub legacy_interval_ms_scale: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cell_width: CellWidth::default(),
            profile_registers: false,
            profile_memory: false,
            legacy_interval_ms_scale: false,
        }
    }
}
