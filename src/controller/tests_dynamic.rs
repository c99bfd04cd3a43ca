use super::*;
use crate::config::CellWidth;
use crate::faults::FaultParams;
use crate::history::CellOp;
use crate::host::TestMachine;

fn engine(width: CellWidth) -> FaultController {
    let mut c = FaultController::new(EngineConfig {
        cell_width: width,
        ..EngineConfig::default()
    });
    c.history.reset(1, width);
    c
}

fn read_at(addr: u64) -> CellAccess {
    CellAccess {
        on_register: false,
        addr,
        kind: AccessKind::Read,
        id: 1,
    }
}

fn masked(mask: u64) -> FaultParams {
    FaultParams {
        mask,
        ..FaultParams::default()
    }
}

#[test]
fn bits_written_upward_get_pulled_back_down() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();

    // the watched write raised bits 0-3 and rewrote zeros above
    c.history
        .record_write(CellBank::Memory, 1, 0xFF, 0x00, 0x0F);
    m.store_word(0x40, 0x0F, 1);

    let mut value = 0x0Fu64;
    c.inject_dynamic_read_disturb(
        &mut m,
        read_at(0x40),
        &mut value,
        CellOp::ZeroToOne,
        masked(0xFF),
    );

    assert_eq!(value, 0x00);
    assert_eq!(m.word_at(0x40, 1), 0x00);
}

#[test]
fn bits_ending_at_zero_disturb_upwards() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();

    c.history
        .record_write(CellBank::Memory, 1, 0b0011, 0xFF, 0x00);
    m.store_word(0x40, 0x00, 1);

    let mut value = 0x00u64;
    c.inject_dynamic_read_disturb(
        &mut m,
        read_at(0x40),
        &mut value,
        CellOp::OneToZero,
        masked(0xFF),
    );

    // only the two recorded 1->0 bits fire; unseen bits pass through
    assert_eq!(value, 0b0011);
    assert_eq!(m.word_at(0x40, 1), 0b0011);
}

#[test]
fn the_selector_must_match_the_recorded_op() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();

    c.history
        .record_write(CellBank::Memory, 1, 0xFF, 0x00, 0x0F);
    m.store_word(0x40, 0x0F, 1);

    let mut value = 0x0Fu64;
    c.inject_dynamic_read_disturb(
        &mut m,
        read_at(0x40),
        &mut value,
        CellOp::OneToOne,
        masked(0xFF),
    );

    assert_eq!(value, 0x0F);
    assert_eq!(m.word_at(0x40, 1), 0x0F);
}

#[test]
fn an_unwritten_cell_never_fires() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0x0F, 1);

    let mut value = 0x0Fu64;
    c.inject_dynamic_read_disturb(
        &mut m,
        read_at(0x40),
        &mut value,
        CellOp::ZeroToOne,
        masked(0xFF),
    );

    assert_eq!(value, 0x0F);
    assert_eq!(m.word_at(0x40, 1), 0x0F);
}

#[test]
fn incorrect_read_variant_leaves_the_cell() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();

    c.history
        .record_write(CellBank::Memory, 1, 0xFF, 0x00, 0x0F);
    m.store_word(0x40, 0x0F, 1);

    let mut value = 0x0Fu64;
    c.inject_dynamic_incorrect_read(
        &mut m,
        read_at(0x40),
        &mut value,
        CellOp::ZeroToOne,
        masked(0xFF),
    );

    assert_eq!(value, 0x00);
    assert_eq!(m.word_at(0x40, 1), 0x0F);
}

#[test]
fn deceptive_variant_keeps_the_returned_word() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();

    c.history
        .record_write(CellBank::Memory, 1, 0xFF, 0x00, 0x0F);
    m.store_word(0x40, 0x0F, 1);

    let mut value = 0x0Fu64;
    c.inject_dynamic_deceptive_read(
        &mut m,
        read_at(0x40),
        &mut value,
        CellOp::ZeroToOne,
        masked(0xFF),
    );

    assert_eq!(value, 0x0F);
    assert_eq!(m.word_at(0x40, 1), 0x00);
}

#[test]
fn writes_are_not_read_events() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();

    c.history
        .record_write(CellBank::Memory, 1, 0xFF, 0x00, 0x0F);
    m.store_word(0x40, 0x0F, 1);

    let mut value = 0x0Fu64;
    let acc = CellAccess {
        kind: AccessKind::Write,
        ..read_at(0x40)
    };
    c.inject_dynamic_read_disturb(&mut m, acc, &mut value, CellOp::ZeroToOne, masked(0xFF));

    assert_eq!(value, 0x0F);
    assert_eq!(m.word_at(0x40, 1), 0x0F);
}

#[test]
fn register_and_memory_histories_are_separate() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();

    c.history
        .record_write(CellBank::Memory, 1, 0xFF, 0x00, 0x0F);
    m.regs[2] = 0x0F;

    let mut value = 0x0Fu64;
    let acc = CellAccess {
        on_register: true,
        addr: 2,
        kind: AccessKind::Read,
        id: 1,
    };
    c.inject_dynamic_read_disturb(&mut m, acc, &mut value, CellOp::ZeroToOne, masked(0xFF));

    // the memory-bank record does not back register faults
    assert_eq!(value, 0x0F);
    assert_eq!(m.regs[2], 0x0F);
}

#[test]
fn the_mask_limits_the_damage() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();

    c.history
        .record_write(CellBank::Memory, 1, 0xFF, 0x00, 0x0F);
    m.store_word(0x40, 0x0F, 1);

    let mut value = 0x0Fu64;
    c.inject_dynamic_read_disturb(
        &mut m,
        read_at(0x40),
        &mut value,
        CellOp::ZeroToOne,
        masked(0b0001),
    );

    assert_eq!(value, 0x0E);
    assert_eq!(m.word_at(0x40, 1), 0x0E);
}
