//! Activation accounting.
//!
//! A fault id is counted the first time it fires and never again until
//! the next campaign load. Without that gate a windowed fault would be
//! counted once per access inside its window and drown out the per-id
//! coverage figures the experiment is after.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::faults::Component;

/// Counting bucket: the attacked component crossed with whether the
/// firing was windowed or permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    RamTransient,
    RamPermanent,
    CpuTransient,
    CpuPermanent,
    RegisterTransient,
    RegisterPermanent,
}

impl FaultClass {
    pub fn classify(component: Component, permanent: bool) -> Self {
        match (component, permanent) {
            (Component::Ram, false) => FaultClass::RamTransient,
            (Component::Ram, true) => FaultClass::RamPermanent,
            (Component::Cpu, false) => FaultClass::CpuTransient,
            (Component::Cpu, true) => FaultClass::CpuPermanent,
            (Component::Register, false) => FaultClass::RegisterTransient,
            (Component::Register, true) => FaultClass::RegisterPermanent,
        }
    }
}

/// Injection totals for the running experiment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InjectionCounters {
    pub total: u64,
    pub ram_transient: u64,
    pub ram_permanent: u64,
    pub cpu_transient: u64,
    pub cpu_permanent: u64,
    pub register_transient: u64,
    pub register_permanent: u64,
    counted: Vec<bool>,
}

impl InjectionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every bucket and size the once-per-id gate for a campaign
    /// whose largest fault id is `max_id`.
    pub fn reset(&mut self, max_id: u32) {
        *self = Self {
            counted: vec![false; max_id as usize],
            ..Self::default()
        };
    }

    /// Zero the buckets without reopening the once-per-id gate: ids that
    /// already fired stay suppressed until the next campaign load.
    pub fn clear_totals(&mut self) {
        let counted = std::mem::take(&mut self.counted);
        *self = Self {
            counted,
            ..Self::default()
        };
    }

    /// Count one firing of `id`. Only the first firing of each id after
    /// a reset lands in the buckets.
    pub fn record(&mut self, id: u32, class: FaultClass) {
        let slot = match id.checked_sub(1).and_then(|i| self.counted.get_mut(i as usize)) {
            Some(slot) => slot,
            None => {
                warn!("fault {id}: outside the counted id range; not counted");
                return;
            }
        };
        if *slot {
            return;
        }
        *slot = true;

        self.total += 1;
        match class {
            FaultClass::RamTransient => self.ram_transient += 1,
            FaultClass::RamPermanent => self.ram_permanent += 1,
            FaultClass::CpuTransient => self.cpu_transient += 1,
            FaultClass::CpuPermanent => self.cpu_permanent += 1,
            FaultClass::RegisterTransient => self.register_transient += 1,
            FaultClass::RegisterPermanent => self.register_permanent += 1,
        }
    }

    /// True once `id` has fired at least once since the last reset.
    pub fn was_counted(&self, id: u32) -> bool {
        id.checked_sub(1)
            .and_then(|i| self.counted.get(i as usize))
            .copied()
            .unwrap_or(false)
    }
}

impl fmt::Display for InjectionCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "injected faults: {}", self.total)?;
        writeln!(
            f,
            "  ram:      {} transient, {} permanent",
            self.ram_transient, self.ram_permanent
        )?;
        writeln!(
            f,
            "  cpu:      {} transient, {} permanent",
            self.cpu_transient, self.cpu_permanent
        )?;
        write!(
            f,
            "  register: {} transient, {} permanent",
            self.register_transient, self.register_permanent
        )
    }
}
