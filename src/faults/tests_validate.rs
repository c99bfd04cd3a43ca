use super::*;
use crate::config::{CellWidth, EngineConfig};
use crate::faults::{Component, DisturbCode, FaultSpec, FaultStore, Level, StatusFlag};

fn issues_for(fault: FaultSpec, config: &EngineConfig) -> Vec<ValidationIssue> {
    let mut store = FaultStore::new(vec![fault]);
    store.renormalize(config.legacy_interval_ms_scale);
    validate(&store, config)
}

fn access_fault(id: u32) -> FaultSpec {
    let mut fault = FaultSpec::new(id);
    fault.component = Some(Component::Ram);
    fault.target = Some(Target::MemoryCell);
    fault.mode = Some(FaultMode::BitFlip);
    fault.trigger = Some(Trigger::Access);
    fault.persistence = Some(Persistence::Permanent);
    fault.params.address = Some(0x100);
    fault.params.mask = 0x1;
    fault
}

#[test]
fn clean_campaign_passes() {
    let issues = issues_for(access_fault(1), &EngineConfig::default());
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn empty_fault_warns_but_loads() {
    let issues = issues_for(FaultSpec::new(1), &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::MissingComponent { id: 1 }));
    assert!(issues.contains(&ValidationIssue::MissingTarget { id: 1 }));
    assert!(issues.contains(&ValidationIssue::MissingMode { id: 1 }));
    assert!(issues.contains(&ValidationIssue::MissingTrigger { id: 1 }));
    // none of it blocks the load; the fault stays inert instead
    assert!(issues.iter().all(|i| !i.is_fatal()));
}

#[test]
fn zero_id_warns() {
    let mut fault = access_fault(0);
    fault.id = 0;
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::NonPositiveId { id: 0 }));
    assert!(!ValidationIssue::NonPositiveId { id: 0 }.is_fatal());
}

#[test]
fn ids_above_the_cap_are_rejected() {
    let issues = issues_for(access_fault(5000), &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::IdOutOfRange { id: 5000 }));
    assert!(issues[0].is_fatal());
}

#[test]
fn pc_trigger_needs_a_match_address() {
    let mut fault = access_fault(3);
    fault.trigger = Some(Trigger::Pc);
    fault.params.address = None;
    fault.params.instruction = Some(0x200);
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::PcTriggerWithoutAddress { id: 3 }));
}

#[test]
fn windowed_faults_need_timer_and_duration() {
    let mut fault = access_fault(4);
    fault.persistence = Some(Persistence::Transient);
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::WindowedWithoutTimer { id: 4 }));
}

#[test]
fn intermittent_needs_an_interval() {
    let mut fault = access_fault(5);
    fault.persistence = Some(Persistence::Intermittent);
    fault.timer = Some("10MS".into());
    fault.duration = Some("50MS".into());
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::IntermittentWithoutInterval { id: 5 }));
}

#[test]
fn degenerate_window_is_a_warning() {
    let mut fault = access_fault(6);
    fault.persistence = Some(Persistence::Transient);
    fault.timer = Some("10NS".into());
    fault.duration = Some("0NS".into());
    let issues = issues_for(fault, &EngineConfig::default());
    assert_eq!(issues, vec![ValidationIssue::DegenerateWindow { id: 6 }]);
    assert!(!issues[0].is_fatal());
}

#[test]
fn coupling_modes_need_a_partner_cell() {
    let mut fault = access_fault(7);
    fault.mode = Some(FaultMode::CouplingState(Level::Zero, Level::Zero));
    fault.params.set_bit = 0x2;
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::CouplingWithoutPartner { id: 7 }));
}

#[test]
fn partner_cell_without_coupling_mode_warns() {
    let mut fault = access_fault(8);
    fault.params.cf_address = Some(0x104);
    let issues = issues_for(fault, &EngineConfig::default());
    assert_eq!(issues, vec![ValidationIssue::PartnerWithoutCoupling { id: 8 }]);
    assert!(!issues[0].is_fatal());
}

#[test]
fn intra_cell_overlap_warns() {
    let mut fault = access_fault(9);
    fault.mode = Some(FaultMode::CouplingDisturb(DisturbCode {
        before: Level::Zero,
        after: Level::Zero,
        attacked: Level::Zero,
        on_read: false,
    }));
    fault.params.cf_address = Some(0x100);
    fault.params.mask = 0b11;
    fault.params.set_bit = 0b01;
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::AggressorVictimOverlap { id: 9 }));
}

#[test]
fn bits_above_the_cell_width_warn() {
    let config = EngineConfig {
        cell_width: CellWidth::Bits8,
        ..EngineConfig::default()
    };
    let mut fault = access_fault(10);
    fault.params.mask = 0x100;
    let issues = issues_for(fault, &config);
    assert_eq!(
        issues,
        vec![ValidationIssue::BitsAboveWidth {
            id: 10,
            field: "mask",
            width: 8,
        }]
    );
    assert!(!issues[0].is_fatal());
}

#[test]
fn flag_faults_take_binary_levels() {
    let mut fault = access_fault(11);
    fault.component = Some(Component::Cpu);
    fault.target = Some(Target::ConditionFlags);
    fault.mode = Some(FaultMode::StatusFlag(StatusFlag::Zero));
    fault.trigger = Some(Trigger::Time);
    fault.params.set_bit = 4;
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::FlagLevelNotBinary { id: 11 }));
}

#[test]
fn flag_modes_stay_on_condition_flags() {
    let mut fault = access_fault(12);
    fault.mode = Some(FaultMode::StatusFlag(StatusFlag::Carry));
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::FlagModeOutsideConditionFlags { id: 12 }));
}

#[test]
fn execution_faults_arm_on_the_marker_word() {
    let mut fault = access_fault(13);
    fault.component = Some(Component::Cpu);
    fault.target = Some(Target::InstructionExecution);
    fault.mode = Some(FaultMode::NewValue);
    fault.params.instruction = Some(0x1234);
    let issues = issues_for(fault.clone(), &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::ExecutionFaultWithoutSentinel { id: 13 }));

    fault.params.instruction = Some(0xDEAD_BEEF);
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn time_cell_faults_name_their_victim() {
    let mut fault = access_fault(14);
    fault.trigger = Some(Trigger::Time);
    let issues = issues_for(fault, &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::TimeCellFaultWithoutVictim { id: 14 }));
}

#[test]
fn unrouted_pairs_warn() {
    let mut fault = access_fault(15);
    fault.component = Some(Component::Cpu);
    let issues = issues_for(fault, &EngineConfig::default());
    assert_eq!(issues, vec![ValidationIssue::UnroutedCombination { id: 15 }]);
    assert!(!issues[0].is_fatal());
}

#[test]
fn decoder_ignores_cell_modes() {
    let mut fault = access_fault(16);
    fault.target = Some(Target::AddressDecoder);
    fault.mode = Some(FaultMode::ReadDisturb(Level::Zero));
    let issues = issues_for(fault, &EngineConfig::default());
    assert_eq!(issues, vec![ValidationIssue::ModeIgnoredByTarget { id: 16 }]);
}

#[test]
fn non_millisecond_intervals_warn_about_legacy_scaling() {
    let intermittent = |interval: &str| {
        let mut fault = access_fault(17);
        fault.persistence = Some(Persistence::Intermittent);
        fault.timer = Some("1MS".into());
        fault.duration = Some("100MS".into());
        fault.interval = Some(interval.into());
        fault
    };
    let issues = issues_for(intermittent("10US"), &EngineConfig::default());
    assert!(issues.contains(&ValidationIssue::LegacyIntervalScale { id: 17 }));
    let issues = issues_for(intermittent("10MS"), &EngineConfig::default());
    assert!(!issues.contains(&ValidationIssue::LegacyIntervalScale { id: 17 }));
}
