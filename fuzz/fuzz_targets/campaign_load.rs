#![no_main]

use faultline::host::TestMachine;
use faultline::{AccessKind, FaultController, InjectionPoint};
use libfuzzer_sys::fuzz_target;

// Probe addresses: start of memory, unaligned, a page boundary, and one
// far above the test machine's backing store.
const ADDRS: [u64; 5] = [0x0, 0x3, 0x100, 0x1000, 0xFFFF_0000];

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut engine = FaultController::default();
    let mut m = TestMachine::new();
    if engine.reload_json(&m, text).is_err() {
        return;
    }

    // Whatever loaded, driving it must not panic.
    for round in 0..3u64 {
        for &addr in &ADDRS {
            let mut a = addr;
            let mut value = 0xAAu64;
            engine.on_access(&mut m, InjectionPoint::MemoryAddress, &mut a, &mut 0, AccessKind::Read);
            engine.on_access(&mut m, InjectionPoint::MemoryContent, &mut a, &mut value, AccessKind::Read);
            engine.on_access(&mut m, InjectionPoint::MemoryContent, &mut a, &mut value, AccessKind::Write);

            let mut reg = addr % 16;
            let mut content = m.regs[reg as usize];
            engine.on_access(&mut m, InjectionPoint::RegisterAddress, &mut reg, &mut 0, AccessKind::Read);
            let mut reg = reg % 16;
            engine.on_access(&mut m, InjectionPoint::RegisterContent, &mut reg, &mut content, AccessKind::Write);

            let mut pc = addr;
            let mut insn = 0xE1A0_0000u64;
            engine.on_access(&mut m, InjectionPoint::InstructionDecode, &mut pc, &mut insn, AccessKind::Execute);
        }

        m.set_pc(0x100 + round * 4);
        engine.on_time_tick(&mut m);
        m.advance(1_000_000);
    }

    // The totals and the snapshot must stay well formed under any
    // campaign the validator lets through.
    assert!(engine.counters().total <= engine.store().len() as u64);
    let _ = engine.report();

    let snapshot = engine.read_state();
    let round_trip = serde_json::to_string(&snapshot).expect("snapshot must serialize");
    let parsed: serde_json::Value = serde_json::from_str(&round_trip).expect("snapshot must parse");
    let mut restored = FaultController::default();
    restored.write_state(parsed);
    assert_eq!(restored.store().len(), engine.store().len());
});
