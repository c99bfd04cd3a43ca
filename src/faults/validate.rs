//! Load-time campaign validation.
//!
//! Every fault is checked before the campaign is installed. Issues
//! are reported per fault but do not block the load: a flagged fault
//! stays in the store and simply never fires (or fires with bits
//! silently dropped), which almost always means a typo in the
//! campaign file. The one exception is the fault-id cap, which bounds
//! the engine's table allocations and rejects the load.

use thiserror::Error;

use crate::config::EngineConfig;
use crate::faults::{FaultMode, FaultSpec, FaultStore, Persistence, Target, Trigger};
use crate::inject::lockup::EXECUTION_ARM_MARKER;

/// Largest id a fault may carry. The counter and history tables are
/// indexed by id, so the cap bounds what one campaign can allocate.
pub const MAX_FAULT_ID: u32 = 4096;

/// One diagnosis for one fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("fault {id}: id must be positive")]
    NonPositiveId { id: u32 },
    #[error("fault {id}: ids above {MAX_FAULT_ID} are not supported")]
    IdOutOfRange { id: u32 },
    #[error("fault {id}: no component")]
    MissingComponent { id: u32 },
    #[error("fault {id}: no target")]
    MissingTarget { id: u32 },
    #[error("fault {id}: no mode")]
    MissingMode { id: u32 },
    #[error("fault {id}: no trigger")]
    MissingTrigger { id: u32 },
    #[error("fault {id}: access- and time-triggered faults need a persistence type")]
    MissingPersistence { id: u32 },
    #[error("fault {id}: pc-triggered faults match on params.address")]
    PcTriggerWithoutAddress { id: u32 },
    #[error("fault {id}: access-triggered faults match on params.address")]
    AccessTriggerWithoutAddress { id: u32 },
    #[error("fault {id}: transient and intermittent faults need timer and duration")]
    WindowedWithoutTimer { id: u32 },
    #[error("fault {id}: intermittent faults need an interval")]
    IntermittentWithoutInterval { id: u32 },
    #[error("fault {id}: the firing window can never open")]
    DegenerateWindow { id: u32 },
    #[error("fault {id}: non-millisecond interval times differently under legacy scaling")]
    LegacyIntervalScale { id: u32 },
    #[error("fault {id}: coupling modes need params.cf_address")]
    CouplingWithoutPartner { id: u32 },
    #[error("fault {id}: cf_address set but the mode is not a coupling mode")]
    PartnerWithoutCoupling { id: u32 },
    #[error("fault {id}: mask and set_bit overlap; shared bits are skipped")]
    AggressorVictimOverlap { id: u32 },
    #[error("fault {id}: {field} has bits above the {width}-bit cell width")]
    BitsAboveWidth {
        id: u32,
        field: &'static str,
        width: u32,
    },
    #[error("fault {id}: condition-flag faults take set_bit 0 or 1")]
    FlagLevelNotBinary { id: u32 },
    #[error("fault {id}: flag modes attack CONDITION FLAGS only")]
    FlagModeOutsideConditionFlags { id: u32 },
    #[error("fault {id}: CONDITION FLAGS faults name a flag as their mode")]
    ConditionFlagsNeedFlagMode { id: u32 },
    #[error("fault {id}: instruction faults support mode NEW VALUE only")]
    InstructionFaultNeedsNewValue { id: u32 },
    #[error("fault {id}: instruction decoder faults need a replacement in params.instruction")]
    DecodeFaultWithoutReplacement { id: u32 },
    #[error("fault {id}: instruction execution faults arm on the {EXECUTION_ARM_MARKER:#x} marker word")]
    ExecutionFaultWithoutSentinel { id: u32 },
    #[error("fault {id}: time- and pc-triggered cell faults name their victim in params.instruction")]
    TimeCellFaultWithoutVictim { id: u32 },
    #[error("fault {id}: this component/target/trigger combination never dispatches")]
    UnroutedCombination { id: u32 },
    #[error("fault {id}: this mode is ignored by the chosen target")]
    ModeIgnoredByTarget { id: u32 },
}

impl ValidationIssue {
    /// Only the id cap rejects a campaign: the counter and history
    /// tables are sized by the largest id, so an id past the cap would
    /// be an unbounded allocation. Every other issue loads with a
    /// warning and the flagged fault stays inert at dispatch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ValidationIssue::IdOutOfRange { .. })
    }
}

/// A campaign that failed validation.
#[derive(Debug, Clone, Error)]
#[error("campaign rejected with {} fatal issue(s)", issues.len())]
pub struct CampaignError {
    pub issues: Vec<ValidationIssue>,
}

/// Check every fault in the campaign. Windows must be normalized first.
pub fn validate(store: &FaultStore, config: &EngineConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for fault in store.iter() {
        validate_fault(fault, config, &mut issues);
    }
    issues
}

fn validate_fault(fault: &FaultSpec, config: &EngineConfig, issues: &mut Vec<ValidationIssue>) {
    let id = fault.id;
    let mut push = |issue| issues.push(issue);

    if id == 0 {
        push(ValidationIssue::NonPositiveId { id });
    }
    if id > MAX_FAULT_ID {
        push(ValidationIssue::IdOutOfRange { id });
    }
    if fault.component.is_none() {
        push(ValidationIssue::MissingComponent { id });
    }
    if fault.target.is_none() {
        push(ValidationIssue::MissingTarget { id });
    }
    if fault.mode.is_none() {
        push(ValidationIssue::MissingMode { id });
    }
    if fault.trigger.is_none() {
        push(ValidationIssue::MissingTrigger { id });
    }

    match fault.trigger {
        Some(Trigger::Pc) => {
            if fault.params.address.is_none() {
                push(ValidationIssue::PcTriggerWithoutAddress { id });
            }
        }
        Some(Trigger::Access) => {
            if fault.params.address.is_none() {
                push(ValidationIssue::AccessTriggerWithoutAddress { id });
            }
            if fault.persistence.is_none() {
                push(ValidationIssue::MissingPersistence { id });
            }
        }
        Some(Trigger::Time) => {
            if fault.persistence.is_none() {
                push(ValidationIssue::MissingPersistence { id });
            }
        }
        None => {}
    }

    if matches!(
        fault.persistence,
        Some(Persistence::Transient) | Some(Persistence::Intermittent)
    ) {
        if fault.timer.is_none() || fault.duration.is_none() {
            push(ValidationIssue::WindowedWithoutTimer { id });
        } else if fault.window.is_degenerate() {
            push(ValidationIssue::DegenerateWindow { id });
        }
        if fault.persistence == Some(Persistence::Intermittent) && fault.interval.is_none() {
            push(ValidationIssue::IntermittentWithoutInterval { id });
        }
    }

    if let Some(interval) = fault.interval.as_deref() {
        let (_, scale) = crate::trigger::parse_time_field(interval);
        if scale.is_some() && scale != Some(crate::trigger::TimeScale::Ms) {
            push(ValidationIssue::LegacyIntervalScale { id });
        }
    }

    let width = config.cell_width;
    if let Some(mode) = fault.mode {
        if mode.is_coupling() {
            if fault.params.cf_address.is_none() {
                push(ValidationIssue::CouplingWithoutPartner { id });
            }
            if fault.params.address == fault.params.cf_address
                && fault.params.mask & fault.params.set_bit != 0
            {
                push(ValidationIssue::AggressorVictimOverlap { id });
            }
        } else if fault.params.cf_address.is_some() {
            push(ValidationIssue::PartnerWithoutCoupling { id });
        }

        if matches!(mode, FaultMode::StatusFlag(_))
            && fault.target != Some(Target::ConditionFlags)
        {
            push(ValidationIssue::FlagModeOutsideConditionFlags { id });
        }

        // address-decoder and instruction faults work on full words,
        // so the width check only makes sense for cell targets
        let on_cell = matches!(
            fault.target,
            Some(Target::MemoryCell) | Some(Target::RegisterCell) | Some(Target::RwLogic)
        );
        if on_cell && fault.params.mask & !width.mask() != 0 {
            push(ValidationIssue::BitsAboveWidth {
                id,
                field: "mask",
                width: width.bits(),
            });
        }
        if on_cell && fault.params.set_bit & !width.mask() != 0 {
            push(ValidationIssue::BitsAboveWidth {
                id,
                field: "set_bit",
                width: width.bits(),
            });
        }
    }

    match fault.target {
        Some(Target::ConditionFlags) => {
            if !matches!(fault.mode, Some(FaultMode::StatusFlag(_)) | None) {
                push(ValidationIssue::ConditionFlagsNeedFlagMode { id });
            }
            if fault.params.set_bit > 1 {
                push(ValidationIssue::FlagLevelNotBinary { id });
            }
        }
        Some(Target::InstructionDecoder) => {
            if !matches!(fault.mode, Some(FaultMode::NewValue) | None) {
                push(ValidationIssue::InstructionFaultNeedsNewValue { id });
            }
            if fault.trigger == Some(Trigger::Access) && fault.params.instruction.is_none() {
                push(ValidationIssue::DecodeFaultWithoutReplacement { id });
            }
        }
        Some(Target::InstructionExecution) => {
            if !matches!(fault.mode, Some(FaultMode::NewValue) | None) {
                push(ValidationIssue::InstructionFaultNeedsNewValue { id });
            }
            if fault.trigger == Some(Trigger::Access)
                && fault.params.instruction != Some(EXECUTION_ARM_MARKER)
            {
                push(ValidationIssue::ExecutionFaultWithoutSentinel { id });
            }
        }
        Some(Target::MemoryCell) | Some(Target::RwLogic) | Some(Target::RegisterCell) => {
            if matches!(fault.trigger, Some(Trigger::Time) | Some(Trigger::Pc)) {
                if fault.params.instruction.is_none() {
                    push(ValidationIssue::TimeCellFaultWithoutVictim { id });
                }
                // the periodic path injects whole-cell corruptions only
                if let Some(mode) = fault.mode {
                    if !mode.corrupts_addresses() {
                        push(ValidationIssue::ModeIgnoredByTarget { id });
                    }
                }
            }
        }
        Some(Target::AddressDecoder) => {
            if let Some(mode) = fault.mode {
                if !mode.corrupts_addresses() {
                    push(ValidationIssue::ModeIgnoredByTarget { id });
                }
            }
        }
        None => {}
    }

    if let (Some(component), Some(target), Some(trigger)) =
        (fault.component, fault.target, fault.trigger)
    {
        if !routes(component, target, trigger) {
            push(ValidationIssue::UnroutedCombination { id });
        }
    }
}

/// The dispatch matrix: which component/target pairs each trigger
/// reaches. Anything outside this table silently never fires, so the
/// validator calls it out.
fn routes(component: crate::faults::Component, target: Target, trigger: Trigger) -> bool {
    use crate::faults::Component::*;

    match (component, target) {
        (Ram, Target::MemoryCell) | (Ram, Target::RwLogic) => true,
        (Register, Target::RegisterCell) => true,
        (Ram, Target::AddressDecoder) | (Register, Target::AddressDecoder) => {
            trigger == Trigger::Access
        }
        (Cpu, Target::InstructionDecoder) | (Cpu, Target::InstructionExecution) => true,
        (Cpu, Target::ConditionFlags) => trigger != Trigger::Access,
        _ => false,
    }
}

#[cfg(test)]
#[path = "tests_validate.rs"]
mod tests_validate;
