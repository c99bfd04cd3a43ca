//! Per-bit write history.
//!
//! Dynamic fault modes (`RDF01`, `IRF10`, ...) fire only on bits whose
//! most recent write performed a particular operation. The controller
//! records that operation per fault, per bit, every time a write passes
//! through a cell one of the campaign's faults watches.

use serde::{Deserialize, Serialize};

use crate::config::CellWidth;

/// The four operations a write can perform on a single bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellOp {
    ZeroToZero,
    ZeroToOne,
    OneToZero,
    OneToOne,
}

impl CellOp {
    pub fn from_levels(before: bool, after: bool) -> CellOp {
        match (before, after) {
            (false, false) => CellOp::ZeroToZero,
            (false, true) => CellOp::ZeroToOne,
            (true, false) => CellOp::OneToZero,
            (true, true) => CellOp::OneToOne,
        }
    }

    /// Suffix digits as dynamic mode names spell them.
    pub fn digits(self) -> &'static str {
        match self {
            CellOp::ZeroToZero => "00",
            CellOp::ZeroToOne => "01",
            CellOp::OneToZero => "10",
            CellOp::OneToOne => "11",
        }
    }

    /// Level the bit holds after the operation.
    pub fn ends_at(self) -> bool {
        matches!(self, CellOp::ZeroToOne | CellOp::OneToOne)
    }
}

/// Memory cells and register cells keep separate histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellBank {
    Memory,
    Register,
}

/// Write history for every fault id in the loaded campaign.
///
/// Rows are indexed by fault id minus one and sized to the configured
/// cell width. A slot stays `None` until a watched write touches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpHistory {
    width: CellWidth,
    memory: Vec<Vec<Option<CellOp>>>,
    register: Vec<Vec<Option<CellOp>>>,
}

impl OpHistory {
    pub fn new(width: CellWidth) -> Self {
        Self {
            width,
            memory: Vec::new(),
            register: Vec::new(),
        }
    }

    /// Drop all recorded operations and resize for a campaign whose
    /// largest fault id is `max_id`.
    pub fn reset(&mut self, max_id: u32, width: CellWidth) {
        let blank = vec![None; width.bits() as usize];
        self.width = width;
        self.memory = vec![blank.clone(); max_id as usize];
        self.register = vec![blank; max_id as usize];
    }

    fn rows(&self, bank: CellBank) -> &[Vec<Option<CellOp>>] {
        match bank {
            CellBank::Memory => &self.memory,
            CellBank::Register => &self.register,
        }
    }

    /// Record the per-bit operations of one write, for the mask bits of
    /// the given fault. Bits outside the configured width are ignored.
    pub fn record_write(&mut self, bank: CellBank, id: u32, mask: u64, before: u64, after: u64) {
        let width = self.width;
        let rows = match bank {
            CellBank::Memory => &mut self.memory,
            CellBank::Register => &mut self.register,
        };
        let row = match id.checked_sub(1).and_then(|i| rows.get_mut(i as usize)) {
            Some(row) => row,
            None => return,
        };

        let mut remaining = mask;
        while remaining != 0 {
            let bit = remaining & remaining.wrapping_neg();
            remaining ^= bit;

            let pos = bit.trailing_zeros();
            if !width.holds_bit(pos) {
                continue;
            }
            row[pos as usize] = Some(CellOp::from_levels(
                before & bit != 0,
                after & bit != 0,
            ));
        }
    }

    /// Last recorded operation on one bit, if any write was seen.
    pub fn op_at(&self, bank: CellBank, id: u32, bit: u32) -> Option<CellOp> {
        let row = id
            .checked_sub(1)
            .and_then(|i| self.rows(bank).get(i as usize))?;
        row.get(bit as usize).copied().flatten()
    }

    pub fn width(&self) -> CellWidth {
        self.width
    }
}
