//! Coupling fault engines.
//!
//! A coupling fault pairs an aggressor cell with a victim cell and
//! fires when the aggressor's state or activity matches the mode's
//! code. With both roles on the same cell (the intra-cell case) the
//! mode degenerates to per-bit rules inside one word: `set_bit` flags
//! the aggressor bits, `mask` selects the victim bits, and bits flagged
//! on both sides are skipped.
//!
//! Role conventions differ by family. `CFST` and `CFDS` put the
//! aggressor at `params.address` and the victim at `cf_address`; the
//! victim-fired families (`CFTR`, `CFWD`, `CFRD`, `CFIR`, `CFDR`) put
//! the victim at `params.address` and read the aggressor from
//! `cf_address`.

use crate::config::CellWidth;
use crate::faults::{DisturbCode, FaultParams, Level};
use crate::host::Machine;
use crate::inject;

use super::{AccessKind, CellAccess, FaultController};

/// What a read-coupling family writes back when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTail {
    /// `CFRD`: the returned word and the cell both take the corruption.
    DisturbBoth,
    /// `CFIR`: only the returned word lies; the cell is intact.
    ReturnOnly,
    /// `CFDR`: the cell flips while the returned word stays right.
    CellOnly,
}

pub trait CouplingFaultOps {
    /// `CFST<aggressor level><action>`: the victim is forced while the
    /// aggressor holds a level. Fires from either cell's accesses and
    /// reports whether any victim bit actually moved.
    fn inject_state_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        levels: (Level, Level),
        params: FaultParams,
        partner_hit: bool,
    ) -> bool;

    /// `CFDS<before><W|R><after><attacked>`: aggressor activity of the
    /// coded shape disturbs victim bits at the attacked level.
    fn inject_disturb_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        code: DisturbCode,
        params: FaultParams,
    );

    /// `CFTR<aggressor level><destination>`: victim write transitions
    /// towards the destination fail while the aggressor holds a level.
    fn inject_transition_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        levels: (Level, Level),
        params: FaultParams,
    );

    /// `CFWD<aggressor level><held level>`: a non-transition victim
    /// write lands disturbed while the aggressor holds a level.
    fn inject_write_disturb_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        levels: (Level, Level),
        params: FaultParams,
    );

    /// `CFRD`/`CFIR`/`CFDR`: a victim read misbehaves while the
    /// aggressor holds a level; the tail picks where the corruption
    /// lands.
    fn inject_read_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        levels: (Level, Level),
        params: FaultParams,
        tail: ReadTail,
    );
}

fn inv(word: u64, width: CellWidth) -> u64 {
    !word & width.mask()
}

/// Bits of `word` sitting at `level`, within the cell width.
fn polarized(word: u64, level: Level, width: CellWidth) -> u64 {
    match level {
        Level::One => word & width.mask(),
        Level::Zero => inv(word, width),
    }
}

/// Per-bit intra-cell disturb: walk `bits`, and where the base word
/// holds `at`, set or clear the bit in `fv`.
fn flip_matching_bits(fv: &mut u64, base: u64, bits: u64, at: Level, set: bool) {
    let mut rest = bits;
    while rest != 0 {
        let bit = rest & rest.wrapping_neg();
        rest ^= bit;

        let matches = match at {
            Level::One => base & bit != 0,
            Level::Zero => base & bit == 0,
        };
        if matches {
            if set {
                *fv |= bit;
            } else {
                *fv &= !bit;
            }
        }
    }
}

impl CouplingFaultOps for FaultController {
    fn inject_state_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        (agg_level, forced): (Level, Level),
        params: FaultParams,
        partner_hit: bool,
    ) -> bool {
        let (Some(agg_addr), Some(victim_addr)) = (params.address, params.cf_address) else {
            return false;
        };
        let width = self.config.cell_width;
        let wmask = width.mask();
        let intra = agg_addr == victim_addr;

        // accesses on the victim side carry the victim's word, so the
        // aggressor has to be re-read; aggressor-side accesses carry it
        let agg = if partner_hit {
            self.guarded_read(m, acc.on_register, agg_addr)
        } else {
            *value & wmask
        };
        let victim = self.guarded_read(m, acc.on_register, victim_addr);
        let set_bit = params.set_bit & wmask;

        let fv = if intra {
            match agg_level {
                Level::Zero => {
                    if set_bit & agg != 0 {
                        return false;
                    }
                }
                Level::One => {
                    if set_bit & agg == 0 {
                        return false;
                    }
                }
            }
            let mut fv = agg;
            flip_matching_bits(
                &mut fv,
                agg,
                params.mask & wmask & !set_bit,
                forced,
                forced == Level::Zero,
            );
            fv
        } else {
            match (agg_level, forced) {
                (Level::Zero, Level::Zero) => inv(agg & inv(victim, width), width),
                (Level::Zero, Level::One) => agg & victim,
                (Level::One, Level::Zero) => agg | victim,
                (Level::One, Level::One) => inv(agg, width) & victim,
            }
        };

        let merged = inject::merge_bits(fv, victim, params.mask, width);
        let moved = merged != victim;
        if partner_hit {
            *value = merged;
        } else {
            self.guarded_write(m, acc.on_register, victim_addr, merged);
        }
        moved
    }

    fn inject_disturb_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        code: DisturbCode,
        params: FaultParams,
    ) {
        let (Some(agg_addr), Some(victim_addr)) = (params.address, params.cf_address) else {
            return;
        };
        // a read cannot move the aggressor, so transition shapes only
        // exist on writes
        if !code.holds_level() && acc.kind != AccessKind::Write {
            return;
        }
        let width = self.config.cell_width;
        let wmask = width.mask();
        let intra = agg_addr == victim_addr;

        let before = self.guarded_read(m, acc.on_register, agg_addr);
        let after = *value & wmask;
        let shape_bits =
            polarized(before, code.before, width) & polarized(after, code.after, width);

        let victim = self.guarded_read(m, acc.on_register, victim_addr);
        let set_bit = params.set_bit & wmask;

        let fv = if intra {
            // flagged aggressor bits must all perform the coded shape
            if set_bit & inv(shape_bits, width) != 0 {
                return;
            }
            let mut fv = victim;
            flip_matching_bits(
                &mut fv,
                victim,
                params.mask & wmask & !set_bit,
                code.attacked,
                code.attacked == Level::Zero,
            );
            fv
        } else {
            match code.attacked {
                Level::Zero => (shape_bits & inv(victim, width)) | victim,
                Level::One => inv(shape_bits & victim, width) & victim,
            }
        };

        let merged = inject::merge_bits(fv, victim, params.mask, width);
        self.guarded_write(m, acc.on_register, victim_addr, merged);
        if intra {
            *value = merged;
        }
    }

    fn inject_transition_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        (agg_level, dest): (Level, Level),
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Write {
            return;
        }
        let (Some(victim_addr), Some(agg_addr)) = (params.address, params.cf_address) else {
            return;
        };
        let width = self.config.cell_width;
        let wmask = width.mask();
        let intra = victim_addr == agg_addr;

        let vb = self.guarded_read(m, acc.on_register, victim_addr);
        let vin = *value & wmask;
        let set_bit = params.set_bit & wmask;

        let fv = if intra {
            // flagged bits must make the guarded transition
            let transition = match dest {
                Level::One => inv(vb, width) & vin,
                Level::Zero => vb & inv(vin, width),
            };
            if set_bit & inv(transition, width) != 0 {
                return;
            }
            let mut fv = vin;
            flip_matching_bits(
                &mut fv,
                vb,
                params.mask & wmask & !set_bit,
                agg_level,
                dest == Level::Zero,
            );
            fv
        } else {
            let agg = self.guarded_read(m, acc.on_register, agg_addr);
            let agg_at = polarized(agg, agg_level, width);
            match dest {
                Level::One => inv(agg_at & inv(vb, width) & vin, width) & vin,
                Level::Zero => (agg_at & vb & inv(vin, width)) | vin,
            }
        };

        *value = inject::merge_bits(fv, *value, params.mask, width);
    }

    fn inject_write_disturb_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        (agg_level, held): (Level, Level),
        params: FaultParams,
    ) {
        if acc.kind != AccessKind::Write {
            return;
        }
        let (Some(victim_addr), Some(agg_addr)) = (params.address, params.cf_address) else {
            return;
        };
        let width = self.config.cell_width;
        let wmask = width.mask();
        let intra = victim_addr == agg_addr;

        let vb = self.guarded_read(m, acc.on_register, victim_addr);
        let vin = *value & wmask;
        let set_bit = params.set_bit & wmask;

        let fv = if intra {
            // flagged bits must rewrite the held level
            let steady = match held {
                Level::Zero => inv(vb | vin, width),
                Level::One => vb & vin,
            };
            if set_bit & inv(steady, width) != 0 {
                return;
            }
            let mut fv = vin;
            flip_matching_bits(
                &mut fv,
                vb,
                params.mask & wmask & !set_bit,
                agg_level,
                held == Level::Zero,
            );
            fv
        } else {
            let agg = self.guarded_read(m, acc.on_register, agg_addr);
            let agg_at = polarized(agg, agg_level, width);
            match held {
                Level::Zero => (agg_at & inv(vb, width) & inv(vin, width)) | vin,
                Level::One => inv(agg_at & vb & vin, width) & vin,
            }
        };

        *value = inject::merge_bits(fv, *value, params.mask, width);
    }

    fn inject_read_coupling<M: Machine>(
        &mut self,
        m: &mut M,
        acc: CellAccess,
        value: &mut u64,
        (agg_level, victim_level): (Level, Level),
        params: FaultParams,
        tail: ReadTail,
    ) {
        if acc.kind != AccessKind::Read {
            return;
        }
        let (Some(victim_addr), Some(agg_addr)) = (params.address, params.cf_address) else {
            return;
        };
        let width = self.config.cell_width;
        let wmask = width.mask();
        let intra = victim_addr == agg_addr;

        let returned = *value & wmask;
        let set_bit = params.set_bit & wmask;

        let fv = if intra {
            // flagged bits must hold the aggressor level
            match agg_level {
                Level::Zero => {
                    if set_bit & returned != 0 {
                        return;
                    }
                }
                Level::One => {
                    if set_bit & inv(returned, width) != 0 {
                        return;
                    }
                }
            }
            let mut fv = returned;
            flip_matching_bits(
                &mut fv,
                returned,
                params.mask & wmask & !set_bit,
                victim_level,
                victim_level == Level::Zero,
            );
            fv
        } else {
            let agg = self.guarded_read(m, acc.on_register, agg_addr);
            let agg_at = polarized(agg, agg_level, width);
            match victim_level {
                Level::Zero => (agg_at & inv(returned, width)) | returned,
                Level::One => inv(agg_at & returned, width) & returned,
            }
        };

        let merged = inject::merge_bits(fv, *value, params.mask, width);
        match tail {
            ReadTail::DisturbBoth => {
                *value = merged;
                self.guarded_write(m, acc.on_register, victim_addr, merged);
            }
            ReadTail::ReturnOnly => *value = merged,
            ReadTail::CellOnly => self.guarded_write(m, acc.on_register, victim_addr, merged),
        }
    }
}
