//! The fault campaign model.
//!
//! A campaign is a list of [`FaultSpec`] entries. Each entry names the
//! attacked component, the structure inside it, a fault mode from the
//! closed vocabulary in [`modes`], a trigger, and the numeric
//! parameters the mode consumes. Campaigns are validated as a whole
//! before any of them can fire; see [`validate`].

pub mod modes;
pub mod validate;

pub use modes::{
    Component, DisturbCode, FaultMode, Level, ModeParseError, Persistence, StatusFlag, Target,
    Trigger,
};
pub use validate::{CampaignError, ValidationIssue};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::trigger::{self, TriggerWindow};

/// Numeric parameters of one fault.
///
/// Which fields matter depends on the mode: `mask` selects attacked
/// bits for most modes but carries the whole replacement word for
/// `NEW VALUE`; `set_bit` holds per-bit levels for `SF`, marks the
/// partner cell's flag bits for coupling modes, and carries the flag
/// level for condition-flag faults; `instruction` is the replacement
/// word for instruction faults and the injection target (register
/// index or memory address) for time- and PC-triggered cell faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultParams {
    #[serde(default)]
    pub address: Option<u64>,
    #[serde(default)]
    pub cf_address: Option<u64>,
    #[serde(default)]
    pub mask: u64,
    #[serde(default)]
    pub set_bit: u64,
    #[serde(default)]
    pub instruction: Option<u64>,
}

/// One fault definition from a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultSpec {
    /// Campaign-unique id, starting at 1.
    pub id: u32,
    #[serde(default)]
    pub component: Option<Component>,
    #[serde(default)]
    pub target: Option<Target>,
    /// Unknown mode spellings decode to `None` rather than rejecting
    /// the file; the validator flags them and the fault never fires.
    #[serde(default, deserialize_with = "modes::lenient_mode")]
    pub mode: Option<FaultMode>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    /// Persistence class, spelled `type` in campaign files.
    #[serde(rename = "type", default)]
    pub persistence: Option<Persistence>,
    /// Window start, e.g. `"100MS"`.
    #[serde(default)]
    pub timer: Option<String>,
    /// Window end.
    #[serde(default)]
    pub duration: Option<String>,
    /// Intermittent on/off period.
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub params: FaultParams,
    /// Whether the fault fired on the most recent event that gated it.
    #[serde(default)]
    pub is_active: bool,
    /// Normalized firing window, computed when the campaign loads.
    #[serde(skip)]
    pub window: TriggerWindow,
}

impl FaultSpec {
    /// A blank fault with the given id; tests and builders fill in the rest.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            component: None,
            target: None,
            mode: None,
            trigger: None,
            persistence: None,
            timer: None,
            duration: None,
            interval: None,
            params: FaultParams::default(),
            is_active: false,
            window: TriggerWindow::default(),
        }
    }
}

impl fmt::Display for FaultSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}:", self.id)?;
        if let Some(c) = self.component {
            write!(f, " {c}")?;
        }
        if let Some(t) = self.target {
            write!(f, " {t}")?;
        }
        if let Some(m) = self.mode {
            write!(f, " {m}")?;
        }
        if let Some(t) = self.trigger {
            write!(f, " on {t}")?;
        }
        if let Some(a) = self.params.address {
            write!(f, " @ {a:#x}")?;
        }
        write!(f, " [{}]", if self.is_active { "active" } else { "idle" })
    }
}

/// The loaded campaign, in file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultStore {
    faults: Vec<FaultSpec>,
    max_id: u32,
}

impl FaultStore {
    pub fn new(faults: Vec<FaultSpec>) -> Self {
        let max_id = faults.iter().map(|f| f.id).max().unwrap_or(0);
        Self { faults, max_id }
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Largest fault id in the campaign; sizes the history and counter
    /// tables.
    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FaultSpec> {
        self.faults.iter()
    }

    pub fn faults(&self) -> &[FaultSpec] {
        &self.faults
    }

    pub fn get(&self, idx: usize) -> Option<&FaultSpec> {
        self.faults.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut FaultSpec> {
        self.faults.get_mut(idx)
    }

    /// Recompute every fault's normalized window. Runs at load and
    /// again after state restore, since windows are not persisted.
    pub fn renormalize(&mut self, legacy_interval_ms: bool) {
        for fault in &mut self.faults {
            fault.window = trigger::normalize(
                fault.timer.as_deref(),
                fault.duration.as_deref(),
                fault.interval.as_deref(),
                legacy_interval_ms,
            );
        }
    }
}

#[cfg(test)]
mod tests_model;
