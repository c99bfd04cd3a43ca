//! Static single-cell fault engines.
//!
//! Each engine corrupts one access to one cell, with the polarity
//! carried in the mode name. Write-side faults only mutate the
//! in-flight value: the host completes the write afterwards, so the
//! disturbed word is what lands in the cell. Read-side faults decide
//! per mode whether the cell, the returned word, or both take the
//! corruption.

use crate::faults::{FaultParams, Level};
use crate::host::Machine;
use crate::inject;

use super::{AccessKind, CellAccess, FaultController};

pub trait CellFaultOps {
    /// `TF0`/`TF1`: the cell refuses the write transition towards the
    /// named level.
    fn inject_transition<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    );

    /// `RDF0`/`RDF1`: a read flips the cell and returns the flipped word.
    fn inject_read_disturb<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    );

    /// `WDF0`/`WDF1`: the written word lands disturbed.
    fn inject_write_disturb<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    );

    /// `IRF0`/`IRF1`: the read returns garbage, the cell is intact.
    fn inject_incorrect_read<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    );

    /// `DRDF0`/`DRDF1`: the read returns the right word but flips the cell.
    fn inject_deceptive_read_disturb<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    );
}

impl CellFaultOps for FaultController {
    fn inject_transition<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Write {
            return;
        }
        let width = self.config.cell_width;
        let old = self.guarded_read(m, acc.on_register, acc.addr);

        // a refused 1->0 keeps old ones high; a refused 0->1 keeps old
        // zeros low
        let fv = match level {
            Level::Zero => old | *value,
            Level::One => old & *value,
        };
        *value = inject::merge_bits(fv, *value, params.mask, width);
    }

    fn inject_read_disturb<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Read {
            return;
        }
        let width = self.config.cell_width;
        let fv = match level {
            Level::Zero => width.mask(),
            Level::One => 0,
        };
        let merged = inject::merge_bits(fv, *value, params.mask, width);
        *value = merged;
        self.guarded_write(m, acc.on_register, acc.addr, merged);
    }

    fn inject_write_disturb<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Write {
            return;
        }
        let width = self.config.cell_width;
        let old = self.guarded_read(m, acc.on_register, acc.addr);

        let fv = match level {
            Level::Zero => !(old & !*value),
            Level::One => !old & *value,
        };
        *value = inject::merge_bits(fv, *value, params.mask, width);
    }

    fn inject_incorrect_read<M: Machine>(
        &mut self,
        _m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Read {
            return;
        }
        let width = self.config.cell_width;
        let fv = match level {
            Level::Zero => width.mask(),
            Level::One => 0,
        };
        *value = inject::merge_bits(fv, *value, params.mask, width);
    }

    fn inject_deceptive_read_disturb<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        level: Level,
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Read {
            return;
        }
        let width = self.config.cell_width;
        let fv = match level {
            Level::Zero => width.mask(),
            Level::One => 0,
        };
        let merged = inject::merge_bits(fv, *value, params.mask, width);
        self.guarded_write(m, acc.on_register, acc.addr, merged);
    }
}
