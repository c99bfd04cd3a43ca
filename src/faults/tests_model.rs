use super::*;

const CAMPAIGN: &str = r#"[
    {
        "id": 1,
        "component": "RAM",
        "target": "MEMORY CELL",
        "mode": "BIT-FLIP",
        "trigger": "ACCESS",
        "type": "PERMANENT",
        "params": { "address": 4096, "mask": 129 }
    },
    {
        "id": 3,
        "component": "CPU",
        "target": "CONDITION FLAGS",
        "mode": "ZF",
        "trigger": "TIME",
        "type": "INTERMITTEND",
        "timer": "10MS",
        "duration": "90MS",
        "interval": "2MS",
        "params": { "set_bit": 1 }
    }
]"#;

#[test]
fn campaign_files_decode() {
    let faults: Vec<FaultSpec> = serde_json::from_str(CAMPAIGN).unwrap();
    assert_eq!(faults.len(), 2);

    assert_eq!(faults[0].component, Some(Component::Ram));
    assert_eq!(faults[0].mode, Some(FaultMode::BitFlip));
    assert_eq!(faults[0].persistence, Some(Persistence::Permanent));
    assert_eq!(faults[0].params.address, Some(4096));
    assert_eq!(faults[0].params.mask, 129);
    assert_eq!(faults[0].params.cf_address, None);

    // the historical misspelling still decodes
    assert_eq!(faults[1].persistence, Some(Persistence::Intermittent));
    assert_eq!(
        faults[1].mode,
        Some(FaultMode::StatusFlag(StatusFlag::Zero))
    );
    assert_eq!(faults[1].interval.as_deref(), Some("2MS"));
}

#[test]
fn specs_round_trip_through_json() {
    let faults: Vec<FaultSpec> = serde_json::from_str(CAMPAIGN).unwrap();
    let text = serde_json::to_string(&faults).unwrap();
    let back: Vec<FaultSpec> = serde_json::from_str(&text).unwrap();
    assert_eq!(back[0].mode, faults[0].mode);
    assert_eq!(back[1].persistence, faults[1].persistence);
    assert_eq!(back[1].timer, faults[1].timer);
    // persistence serializes under its file-format key
    assert!(text.contains("\"type\":\"INTERMITTENT\""));
}

#[test]
fn store_tracks_the_largest_id() {
    let faults: Vec<FaultSpec> = serde_json::from_str(CAMPAIGN).unwrap();
    let store = FaultStore::new(faults);
    assert_eq!(store.len(), 2);
    assert_eq!(store.max_id(), 3);
    assert_eq!(FaultStore::new(Vec::new()).max_id(), 0);
}

#[test]
fn renormalize_fills_in_windows() {
    let faults: Vec<FaultSpec> = serde_json::from_str(CAMPAIGN).unwrap();
    let mut store = FaultStore::new(faults);
    store.renormalize(false);

    // the permanent fault has no window fields
    assert_eq!(store.get(0).unwrap().window, TriggerWindow::default());

    // duration is the absolute stop bound, not an offset from start
    let window = store.get(1).unwrap().window;
    assert_eq!(window.start_ns, 10_000_000);
    assert_eq!(window.stop_ns, 90_000_000);
    assert_eq!(window.interval_ns, 2_000_000);
}

#[test]
fn display_names_the_fault() {
    let faults: Vec<FaultSpec> = serde_json::from_str(CAMPAIGN).unwrap();
    let line = faults[0].to_string();
    assert_eq!(
        line,
        "fault 1: RAM MEMORY CELL BIT-FLIP on ACCESS @ 0x1000 [idle]"
    );
}

#[test]
fn unknown_mode_spellings_decode_to_none() {
    // a typo in one fault's mode must not reject the whole file
    let fault: FaultSpec = serde_json::from_str(r#"{ "id": 4, "mode": "XF9" }"#).unwrap();
    assert_eq!(fault.mode, None);
}

#[test]
fn missing_fields_decode_as_none() {
    let fault: FaultSpec = serde_json::from_str(r#"{ "id": 9 }"#).unwrap();
    assert_eq!(fault.id, 9);
    assert_eq!(fault.component, None);
    assert_eq!(fault.mode, None);
    assert_eq!(fault.params, FaultParams::default());
    assert!(!fault.is_active);
}
