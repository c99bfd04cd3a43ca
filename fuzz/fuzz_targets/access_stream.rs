#![no_main]

use faultline::faults::{Component, Persistence, Target, Trigger};
use faultline::host::TestMachine;
use faultline::{AccessKind, FaultController, FaultSpec, InjectionPoint};
use libfuzzer_sys::fuzz_target;

fn fault(id: u32, mode: &str, addr: u64) -> FaultSpec {
    let mut f = FaultSpec::new(id);
    f.component = Some(Component::Ram);
    f.target = Some(Target::MemoryCell);
    f.mode = Some(mode.parse().unwrap());
    f.trigger = Some(Trigger::Access);
    f.persistence = Some(Persistence::Permanent);
    f.params.address = Some(addr);
    f.params.mask = 0xFF;
    f
}

// One campaign touching every dispatch family: plain cell corruptions,
// a dynamic read fault with a window, two couplings, a condition flag
// on the tick path and an instruction swap on the decode path.
fn campaign() -> Vec<FaultSpec> {
    let mut sf = fault(2, "SF", 0x140);
    sf.params.mask = 0x1;
    sf.params.set_bit = 0x1;

    let mut tf = fault(3, "TF0", 0x180);
    tf.params.mask = 0x1;

    let mut rdf = fault(4, "RDF01", 0x1C0);
    rdf.persistence = Some(Persistence::Transient);
    rdf.timer = Some("1MS".into());
    rdf.duration = Some("4MS".into());
    rdf.params.mask = 0xF;

    let mut cfst = fault(5, "CFST11", 0x200);
    cfst.params.cf_address = Some(0x240);

    let mut cfwd = fault(6, "CFWD10", 0x280);
    cfwd.params.cf_address = Some(0x2C0);
    cfwd.params.mask = 0x1;

    let mut flag = FaultSpec::new(7);
    flag.component = Some(Component::Cpu);
    flag.target = Some(Target::ConditionFlags);
    flag.mode = Some("ZF".parse().unwrap());
    flag.trigger = Some(Trigger::Time);
    flag.persistence = Some(Persistence::Transient);
    flag.timer = Some("1MS".into());
    flag.duration = Some("4MS".into());
    flag.params.set_bit = 1;

    let mut decode = FaultSpec::new(8);
    decode.component = Some(Component::Cpu);
    decode.target = Some(Target::InstructionDecoder);
    decode.mode = Some("NEW VALUE".parse().unwrap());
    decode.trigger = Some(Trigger::Access);
    decode.persistence = Some(Persistence::Permanent);
    decode.params.address = Some(0x300);
    decode.params.instruction = Some(0xE3A0_0001);

    vec![
        fault(1, "BIT-FLIP", 0x100),
        sf,
        tf,
        rdf,
        cfst,
        cfwd,
        flag,
        decode,
    ]
}

fuzz_target!(|ops: Vec<(u8, u8, u64, u64)>| {
    let mut engine = FaultController::default();
    let mut m = TestMachine::new();
    engine.reload(&m, campaign()).unwrap();
    let loaded = engine.store().len() as u64;

    for (sel, kind_sel, addr_raw, value_raw) in ops {
        let kind = match kind_sel % 3 {
            0 => AccessKind::Read,
            1 => AccessKind::Write,
            _ => AccessKind::Execute,
        };
        // Fold addresses onto the campaign's cells often enough that
        // the injection paths actually run.
        let mut addr = addr_raw & 0x3FF;
        let mut value = value_raw;

        match sel % 6 {
            0 => engine.on_access(&mut m, InjectionPoint::MemoryAddress, &mut addr, &mut value, kind),
            1 => engine.on_access(&mut m, InjectionPoint::MemoryContent, &mut addr, &mut value, kind),
            2 => {
                let mut reg = addr_raw % 16;
                engine.on_access(&mut m, InjectionPoint::RegisterAddress, &mut reg, &mut value, kind);
            }
            3 => {
                let mut reg = addr_raw % 16;
                engine.on_access(&mut m, InjectionPoint::RegisterContent, &mut reg, &mut value, kind);
            }
            4 => engine.on_access(&mut m, InjectionPoint::InstructionDecode, &mut addr, &mut value, kind),
            _ => {
                m.set_pc(addr);
                engine.on_time_tick(&mut m);
                m.advance(500_000);
            }
        }
    }

    // Once-per-id counting bounds the totals by the campaign size, no
    // matter what the stream did.
    let c = engine.counters();
    assert!(c.total <= loaded);
    let buckets = c.ram_transient
        + c.ram_permanent
        + c.cpu_transient
        + c.cpu_permanent
        + c.register_transient
        + c.register_permanent;
    assert_eq!(c.total, buckets);
    assert!(engine.report().contains("injected faults"));
});
