use super::*;
use crate::config::CellWidth;
use crate::faults::FaultParams;
use crate::host::TestMachine;

fn engine(width: CellWidth) -> FaultController {
    FaultController::new(EngineConfig {
        cell_width: width,
        ..EngineConfig::default()
    })
}

fn access(kind: AccessKind, addr: u64) -> CellAccess {
    CellAccess {
        on_register: false,
        addr,
        kind,
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
fn transition_refuses_downward_writes() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0b1111_0000, 1);

    // the write tries to drop the high nibble and raise bits 2-3
    let mut value = 0b0000_1100u64;
    c.inject_transition(
        &mut m,
        access(AccessKind::Write, 0x40),
        &mut value,
        Level::Zero,
        masked(0xF0),
    );

    // masked ones refuse to fall; unmasked bits take the write
    assert_eq!(value, 0b1111_1100);
}

#[test]
fn transition_refuses_upward_writes() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0b0000_0011, 1);

    let mut value = 0b0011_0011u64;
    c.inject_transition(
        &mut m,
        access(AccessKind::Write, 0x40),
        &mut value,
        Level::One,
        masked(0b0011_0000),
    );

    assert_eq!(value, 0b0000_0011);
}

#[test]
fn read_disturb_flips_cell_and_result() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0x12, 1);

    let mut value = 0x12u64;
    c.inject_read_disturb(
        &mut m,
        access(AccessKind::Read, 0x40),
        &mut value,
        Level::Zero,
        masked(0x0F),
    );

    // every masked bit ends high, in the cell and in the result
    assert_eq!(value, 0x1F);
    assert_eq!(m.word_at(0x40, 1), 0x1F);
}

#[test]
fn read_disturb_polarity_one_clears() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0xFF, 1);

    let mut value = 0xFFu64;
    c.inject_read_disturb(
        &mut m,
        access(AccessKind::Read, 0x40),
        &mut value,
        Level::One,
        masked(0x0F),
    );

    assert_eq!(value, 0xF0);
    assert_eq!(m.word_at(0x40, 1), 0xF0);
}

#[test]
fn incorrect_read_lies_without_touching_the_cell() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0xFF, 1);

    let mut value = 0xFFu64;
    c.inject_incorrect_read(
        &mut m,
        access(AccessKind::Read, 0x40),
        &mut value,
        Level::One,
        masked(0x0F),
    );

    assert_eq!(value, 0xF0);
    assert_eq!(m.word_at(0x40, 1), 0xFF);
}

#[test]
fn deceptive_read_returns_truth_then_flips() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0x00, 1);

    let mut value = 0x00u64;
    c.inject_deceptive_read_disturb(
        &mut m,
        access(AccessKind::Read, 0x40),
        &mut value,
        Level::Zero,
        masked(0xFF),
    );

    assert_eq!(value, 0x00);
    assert_eq!(m.word_at(0x40, 1), 0xFF);
}

#[test]
fn write_disturb_zero_raises_steady_zeros() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0b1100, 1);

    let mut value = 0b0110u64;
    c.inject_write_disturb(
        &mut m,
        access(AccessKind::Write, 0x40),
        &mut value,
        Level::Zero,
        masked(0x0F),
    );

    // bit 0 stayed at zero through the write, so it flips up; the
    // falling bit 3 is a transition and passes through
    assert_eq!(value, 0b0111);
}

#[test]
fn write_disturb_one_drops_steady_ones() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0b1100, 1);

    let mut value = 0b1010u64;
    c.inject_write_disturb(
        &mut m,
        access(AccessKind::Write, 0x40),
        &mut value,
        Level::One,
        masked(0x0F),
    );

    assert_eq!(value, 0b0010);
}

#[test]
fn engines_ignore_the_wrong_access_kind() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.store_word(0x40, 0xAA, 1);

    let mut value = 0x55u64;
    c.inject_transition(
        &mut m,
        access(AccessKind::Read, 0x40),
        &mut value,
        Level::Zero,
        masked(0xFF),
    );
    c.inject_read_disturb(
        &mut m,
        access(AccessKind::Write, 0x40),
        &mut value,
        Level::Zero,
        masked(0xFF),
    );
    c.inject_deceptive_read_disturb(
        &mut m,
        access(AccessKind::Write, 0x40),
        &mut value,
        Level::Zero,
        masked(0xFF),
    );

    assert_eq!(value, 0x55);
    assert_eq!(m.word_at(0x40, 1), 0xAA);
}

#[test]
fn register_cells_take_the_same_faults() {
    let mut c = engine(CellWidth::Bits8);
    let mut m = TestMachine::new();
    m.regs[3] = 0x1AB;

    let mut value = 0xABu64;
    let acc = CellAccess {
        on_register: true,
        addr: 3,
        kind: AccessKind::Read,
        id: 1,
    };
    c.inject_deceptive_read_disturb(&mut m, acc, &mut value, Level::One, masked(0xFF));

    assert_eq!(value, 0xAB);
    // the cell is cleared, but only within the configured width
    assert_eq!(m.regs[3], 0x100);
}
