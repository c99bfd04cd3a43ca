//! Campaign vocabulary: fault modes, components, targets and triggers.
//!
//! Every name here is the literal spelling campaign files use. Parsing
//! is closed: a spelling outside the tables below is flagged when the
//! campaign loads, never discovered at injection time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::CellOp;

/// One bit level, as written in mode suffixes ("TF0", "CFST01", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Zero,
    One,
}

impl Level {
    pub fn as_bool(self) -> bool {
        matches!(self, Level::One)
    }

    fn digit(self) -> char {
        match self {
            Level::Zero => '0',
            Level::One => '1',
        }
    }

    fn from_digit(c: char) -> Option<Level> {
        match c {
            '0' => Some(Level::Zero),
            '1' => Some(Level::One),
            _ => None,
        }
    }
}

/// Hardware unit a fault lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "CPU")]
    Cpu,
    #[serde(rename = "RAM")]
    Ram,
    #[serde(rename = "REGISTER")]
    Register,
}

/// Structure inside the component the fault attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    #[serde(rename = "MEMORY CELL")]
    MemoryCell,
    #[serde(rename = "REGISTER CELL")]
    RegisterCell,
    #[serde(rename = "R/W LOGIC")]
    RwLogic,
    #[serde(rename = "ADDRESS DECODER")]
    AddressDecoder,
    #[serde(rename = "INSTRUCTION DECODER")]
    InstructionDecoder,
    #[serde(rename = "INSTRUCTION EXECUTION")]
    InstructionExecution,
    #[serde(rename = "CONDITION FLAGS")]
    ConditionFlags,
}

/// What event makes a fault eligible to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// A read, write or fetch touching the fault's address.
    #[serde(rename = "ACCESS")]
    Access,
    /// Periodic checkpoints, gated by the fault's time window.
    #[serde(rename = "TIME")]
    Time,
    /// The program counter reaching the fault's address.
    #[serde(rename = "PC")]
    Pc,
}

/// How long a fault stays active once its trigger holds.
///
/// Older campaign files spell the intermittent kind `INTERMITTEND`;
/// both spellings load, the canonical one is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Persistence {
    #[serde(rename = "PERMANENT")]
    Permanent,
    #[serde(rename = "TRANSIENT")]
    Transient,
    #[serde(rename = "INTERMITTENT", alias = "INTERMITTEND")]
    Intermittent,
}

/// CPU condition flag attacked by a `CONDITION FLAGS` fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFlag {
    Negative,
    Zero,
    Carry,
    Overflow,
    Saturation,
}

impl StatusFlag {
    /// Bit position in the status word.
    pub fn bit(self) -> u32 {
        match self {
            StatusFlag::Negative => 31,
            StatusFlag::Zero => 30,
            StatusFlag::Carry => 29,
            StatusFlag::Overflow => 28,
            StatusFlag::Saturation => 27,
        }
    }

    pub fn word_mask(self) -> u64 {
        1u64 << self.bit()
    }

    fn as_str(self) -> &'static str {
        match self {
            StatusFlag::Negative => "NF",
            StatusFlag::Zero => "ZF",
            StatusFlag::Carry => "CF",
            StatusFlag::Overflow => "VF",
            StatusFlag::Saturation => "QF",
        }
    }
}

/// Shape code of a disturb coupling fault (`CFDS`).
///
/// The four suffix characters read `<before><W|R><after><attacked>`:
/// the aggressor cell went from `before` to `after` under a write (or
/// was read while holding the level, `R` spellings), and victim bits
/// currently at `attacked` get flipped. Read spellings only exist for
/// level-holding shapes; a read cannot move the aggressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisturbCode {
    pub before: Level,
    pub after: Level,
    pub attacked: Level,
    pub on_read: bool,
}

impl DisturbCode {
    /// True when the aggressor must end where it started (the shapes
    /// that fire on reads as well as writes).
    pub fn holds_level(self) -> bool {
        self.before == self.after
    }
}

/// The closed set of fault modes a campaign may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FaultMode {
    /// `BIT-FLIP`: invert every bit selected by the mask.
    BitFlip,
    /// `NEW VALUE`: replace the whole cell with the mask word.
    NewValue,
    /// `SF`: pin masked bits to the levels given by `set_bit`.
    StuckAt,
    /// `TF0`/`TF1`: the cell refuses the corresponding write transition.
    Transition(Level),
    /// `RDF0`/`RDF1`: a read flips the cell and returns the flipped word.
    ReadDisturb(Level),
    /// `WDF0`/`WDF1`: a write lands disturbed.
    WriteDisturb(Level),
    /// `IRF0`/`IRF1`: the cell keeps its word but the read returns garbage.
    IncorrectRead(Level),
    /// `DRDF0`/`DRDF1`: the read returns the right word but flips the cell.
    DeceptiveReadDisturb(Level),
    /// `RDF00`..`RDF11`: read disturb keyed to the last recorded write op.
    DynamicReadDisturb(CellOp),
    /// `IRF00`..`IRF11`: incorrect read keyed to the last recorded write op.
    DynamicIncorrectRead(CellOp),
    /// `DRDF00`..`DRDF11`: deceptive read disturb keyed to the history.
    DynamicDeceptiveReadDisturb(CellOp),
    /// `CFST00`..`CFST11`: state coupling between aggressor and victim.
    CouplingState(Level, Level),
    /// `CFDS....`: a disturb shape, see [`DisturbCode`].
    CouplingDisturb(DisturbCode),
    /// `CFTR00`..`CFTR11`: victim write transitions fail while the
    /// aggressor holds a level.
    CouplingTransition(Level, Level),
    /// `CFWD00`..`CFWD11`: non-transition victim writes get disturbed.
    CouplingWriteDisturb(Level, Level),
    /// `CFRD00`..`CFRD11`: victim reads disturb the cell and the result.
    CouplingReadDisturb(Level, Level),
    /// `CFIR00`..`CFIR11`: victim reads return garbage, cell intact.
    CouplingIncorrectRead(Level, Level),
    /// `CFDR00`..`CFDR11`: victim reads corrupt the cell, result intact.
    CouplingDeceptiveRead(Level, Level),
    /// `NF`/`ZF`/`CF`/`VF`/`QF`: force a CPU condition flag.
    StatusFlag(StatusFlag),
}

impl FaultMode {
    /// Modes that pair an aggressor cell with a victim cell.
    pub fn is_coupling(&self) -> bool {
        matches!(
            self,
            FaultMode::CouplingState(..)
                | FaultMode::CouplingDisturb(..)
                | FaultMode::CouplingTransition(..)
                | FaultMode::CouplingWriteDisturb(..)
                | FaultMode::CouplingReadDisturb(..)
                | FaultMode::CouplingIncorrectRead(..)
                | FaultMode::CouplingDeceptiveRead(..)
        )
    }

    /// Modes whose firing decision consults the per-bit write history.
    pub fn needs_history(&self) -> bool {
        matches!(
            self,
            FaultMode::DynamicReadDisturb(..)
                | FaultMode::DynamicIncorrectRead(..)
                | FaultMode::DynamicDeceptiveReadDisturb(..)
        )
    }

    /// Modes an address-decoder fault may use.
    pub fn corrupts_addresses(&self) -> bool {
        matches!(
            self,
            FaultMode::BitFlip | FaultMode::NewValue | FaultMode::StuckAt
        )
    }
}

fn two_levels(suffix: &str) -> Option<(Level, Level)> {
    let mut chars = suffix.chars();
    let a = Level::from_digit(chars.next()?)?;
    let b = Level::from_digit(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }
    Some((a, b))
}

fn history_op(suffix: &str) -> Option<CellOp> {
    let (from, to) = two_levels(suffix)?;
    Some(CellOp::from_levels(from.as_bool(), to.as_bool()))
}

#[derive(Debug, Clone, Error)]
#[error("unknown fault mode `{0}`")]
pub struct ModeParseError(pub String);

impl FromStr for FaultMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ModeParseError(s.to_string());

        let mode = match s {
            "BIT-FLIP" => FaultMode::BitFlip,
            "NEW VALUE" => FaultMode::NewValue,
            "SF" => FaultMode::StuckAt,
            "NF" => FaultMode::StatusFlag(StatusFlag::Negative),
            "ZF" => FaultMode::StatusFlag(StatusFlag::Zero),
            "CF" => FaultMode::StatusFlag(StatusFlag::Carry),
            "VF" => FaultMode::StatusFlag(StatusFlag::Overflow),
            "QF" => FaultMode::StatusFlag(StatusFlag::Saturation),
            _ => {
                if let Some(rest) = s.strip_prefix("CFDS") {
                    let chars: Vec<char> = rest.chars().collect();
                    if chars.len() != 4 {
                        return Err(unknown());
                    }
                    let before = Level::from_digit(chars[0]).ok_or_else(unknown)?;
                    let on_read = match chars[1] {
                        'W' => false,
                        'R' => true,
                        _ => return Err(unknown()),
                    };
                    let after = Level::from_digit(chars[2]).ok_or_else(unknown)?;
                    let attacked = Level::from_digit(chars[3]).ok_or_else(unknown)?;
                    if on_read && before != after {
                        return Err(unknown());
                    }
                    FaultMode::CouplingDisturb(DisturbCode {
                        before,
                        after,
                        attacked,
                        on_read,
                    })
                } else if let Some(rest) = s.strip_prefix("CFST") {
                    let (a, b) = two_levels(rest).ok_or_else(unknown)?;
                    FaultMode::CouplingState(a, b)
                } else if let Some(rest) = s.strip_prefix("CFTR") {
                    let (a, b) = two_levels(rest).ok_or_else(unknown)?;
                    FaultMode::CouplingTransition(a, b)
                } else if let Some(rest) = s.strip_prefix("CFWD") {
                    let (a, b) = two_levels(rest).ok_or_else(unknown)?;
                    FaultMode::CouplingWriteDisturb(a, b)
                } else if let Some(rest) = s.strip_prefix("CFRD") {
                    let (a, b) = two_levels(rest).ok_or_else(unknown)?;
                    FaultMode::CouplingReadDisturb(a, b)
                } else if let Some(rest) = s.strip_prefix("CFIR") {
                    let (a, b) = two_levels(rest).ok_or_else(unknown)?;
                    FaultMode::CouplingIncorrectRead(a, b)
                } else if let Some(rest) = s.strip_prefix("CFDR") {
                    let (a, b) = two_levels(rest).ok_or_else(unknown)?;
                    FaultMode::CouplingDeceptiveRead(a, b)
                } else if let Some(rest) = s.strip_prefix("DRDF") {
                    match rest.len() {
                        1 => FaultMode::DeceptiveReadDisturb(
                            Level::from_digit(rest.chars().next().unwrap())
                                .ok_or_else(unknown)?,
                        ),
                        2 => FaultMode::DynamicDeceptiveReadDisturb(
                            history_op(rest).ok_or_else(unknown)?,
                        ),
                        _ => return Err(unknown()),
                    }
                } else if let Some(rest) = s.strip_prefix("RDF") {
                    match rest.len() {
                        1 => FaultMode::ReadDisturb(
                            Level::from_digit(rest.chars().next().unwrap())
                                .ok_or_else(unknown)?,
                        ),
                        2 => FaultMode::DynamicReadDisturb(
                            history_op(rest).ok_or_else(unknown)?,
                        ),
                        _ => return Err(unknown()),
                    }
                } else if let Some(rest) = s.strip_prefix("IRF") {
                    match rest.len() {
                        1 => FaultMode::IncorrectRead(
                            Level::from_digit(rest.chars().next().unwrap())
                                .ok_or_else(unknown)?,
                        ),
                        2 => FaultMode::DynamicIncorrectRead(
                            history_op(rest).ok_or_else(unknown)?,
                        ),
                        _ => return Err(unknown()),
                    }
                } else if let Some(rest) = s.strip_prefix("WDF") {
                    match rest.len() {
                        1 => FaultMode::WriteDisturb(
                            Level::from_digit(rest.chars().next().unwrap())
                                .ok_or_else(unknown)?,
                        ),
                        _ => return Err(unknown()),
                    }
                } else if let Some(rest) = s.strip_prefix("TF") {
                    match rest.len() {
                        1 => FaultMode::Transition(
                            Level::from_digit(rest.chars().next().unwrap())
                                .ok_or_else(unknown)?,
                        ),
                        _ => return Err(unknown()),
                    }
                } else {
                    return Err(unknown());
                }
            }
        };
        Ok(mode)
    }
}

impl fmt::Display for FaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultMode::BitFlip => write!(f, "BIT-FLIP"),
            FaultMode::NewValue => write!(f, "NEW VALUE"),
            FaultMode::StuckAt => write!(f, "SF"),
            FaultMode::Transition(l) => write!(f, "TF{}", l.digit()),
            FaultMode::ReadDisturb(l) => write!(f, "RDF{}", l.digit()),
            FaultMode::WriteDisturb(l) => write!(f, "WDF{}", l.digit()),
            FaultMode::IncorrectRead(l) => write!(f, "IRF{}", l.digit()),
            FaultMode::DeceptiveReadDisturb(l) => write!(f, "DRDF{}", l.digit()),
            FaultMode::DynamicReadDisturb(op) => write!(f, "RDF{}", op.digits()),
            FaultMode::DynamicIncorrectRead(op) => write!(f, "IRF{}", op.digits()),
            FaultMode::DynamicDeceptiveReadDisturb(op) => write!(f, "DRDF{}", op.digits()),
            FaultMode::CouplingState(a, b) => write!(f, "CFST{}{}", a.digit(), b.digit()),
            FaultMode::CouplingDisturb(code) => write!(
                f,
                "CFDS{}{}{}{}",
                code.before.digit(),
                if code.on_read { 'R' } else { 'W' },
                code.after.digit(),
                code.attacked.digit()
            ),
            FaultMode::CouplingTransition(a, b) => write!(f, "CFTR{}{}", a.digit(), b.digit()),
            FaultMode::CouplingWriteDisturb(a, b) => write!(f, "CFWD{}{}", a.digit(), b.digit()),
            FaultMode::CouplingReadDisturb(a, b) => write!(f, "CFRD{}{}", a.digit(), b.digit()),
            FaultMode::CouplingIncorrectRead(a, b) => write!(f, "CFIR{}{}", a.digit(), b.digit()),
            FaultMode::CouplingDeceptiveRead(a, b) => write!(f, "CFDR{}{}", a.digit(), b.digit()),
            FaultMode::StatusFlag(flag) => write!(f, "{}", flag.as_str()),
        }
    }
}

impl TryFrom<String> for FaultMode {
    type Error = ModeParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Field deserializer for campaign files: an unknown mode spelling is
/// dropped instead of aborting the whole file. The fault loads without
/// a mode, the validator flags it, and it never fires.
pub fn lenient_mode<'de, D>(de: D) -> Result<Option<FaultMode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let spelling = Option::<String>::deserialize(de)?;
    Ok(spelling.and_then(|s| match s.parse() {
        Ok(mode) => Some(mode),
        Err(err) => {
            log::warn!("{err}; the fault loads without a mode");
            None
        }
    }))
}

impl From<FaultMode> for String {
    fn from(mode: FaultMode) -> String {
        mode.to_string()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Cpu => write!(f, "CPU"),
            Component::Ram => write!(f, "RAM"),
            Component::Register => write!(f, "REGISTER"),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Access => write!(f, "ACCESS"),
            Trigger::Time => write!(f, "TIME"),
            Trigger::Pc => write!(f, "PC"),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Target::MemoryCell => "MEMORY CELL",
            Target::RegisterCell => "REGISTER CELL",
            Target::RwLogic => "R/W LOGIC",
            Target::AddressDecoder => "ADDRESS DECODER",
            Target::InstructionDecoder => "INSTRUCTION DECODER",
            Target::InstructionExecution => "INSTRUCTION EXECUTION",
            Target::ConditionFlags => "CONDITION FLAGS",
        };
        write!(f, "{name}")
    }
}
