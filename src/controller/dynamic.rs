//! Dynamic fault engines.
//!
//! A dynamic mode fires per bit, keyed to the operation the last
//! watched write performed on that bit. Bits whose history matches the
//! mode's selector get disturbed away from the level that write left
//! them at; every other bit passes through untouched.

use crate::config::CellWidth;
use crate::faults::FaultParams;
use crate::history::{CellBank, CellOp, OpHistory};
use crate::host::Machine;
use crate::inject;

use super::{AccessKind, CellAccess, FaultController};

pub trait DynamicFaultOps {
    /// `RDF00`..`RDF11`: the read disturbs the cell and returns the
    /// disturbed word.
    fn inject_dynamic_read_disturb<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        op: CellOp,
        params: FaultParams,
    );

    /// `IRF00`..`IRF11`: the read lies, the cell is intact.
    fn inject_dynamic_incorrect_read<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        op: CellOp,
        params: FaultParams,
    );

    /// `DRDF00`..`DRDF11`: the read is right but the cell flips.
    fn inject_dynamic_deceptive_read<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        op: CellOp,
        params: FaultParams,
    );
}

/// Build the disturbed word: selector-matching bits flip away from the
/// level their last write established, the rest carry the read value.
fn history_keyed(
    history: &OpHistory,
    width: CellWidth,
    bank: CellBank,
    id: u32,
    op: CellOp,
    returned: u64,
) -> u64 {
    let mut fv = 0u64;
    for pos in 0..width.bits() {
        let bit = 1u64 << pos;
        if history.op_at(bank, id, pos) == Some(op) {
            if !op.ends_at() {
                fv |= bit;
            }
        } else {
            fv |= returned & bit;
        }
    }
    fv
}

fn bank_of(acc: CellAccess) -> CellBank {
    if acc.on_register {
        CellBank::Register
    } else {
        CellBank::Memory
    }
}

impl DynamicFaultOps for FaultController {
    fn inject_dynamic_read_disturb<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        op: CellOp,
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Read {
            return;
        }
        let width = self.config.cell_width;
        let fv = history_keyed(&self.history, width, bank_of(acc), acc.id, op, *value);
        let merged = inject::merge_bits(fv, *value, params.mask, width);
        *value = merged;
        self.guarded_write(m, acc.on_register, acc.addr, merged);
    }

    fn inject_dynamic_incorrect_read<M: Machine>(
        &mut self,
        _m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        op: CellOp,
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Read {
            return;
        }
        let width = self.config.cell_width;
        let fv = history_keyed(&self.history, width, bank_of(acc), acc.id, op, *value);
        *value = inject::merge_bits(fv, *value, params.mask, width);
    }

    fn inject_dynamic_deceptive_read<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        op: CellOp,
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Read {
            return;
        }
        let width = self.config.cell_width;
        let fv = history_keyed(&self.history, width, bank_of(acc), acc.id, op, *value);
        let merged = inject::merge_bits(fv, *value, params.mask, width);
        self.guarded_write(m, acc.on_register, acc.addr, merged);
    }
}
