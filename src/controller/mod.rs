//! The fault controller and its dispatch points.
//!
//! A host integration forwards every guest event it can observe to one
//! controller. Access events carry the address and the in-flight value
//! by mutable reference, so a fired fault can corrupt what the guest
//! sees without the host knowing which fault did it. Periodic events
//! drive the time- and program-counter-triggered faults.
//!
//! | point                 | event                                | faults dispatched                          |
//! |-----------------------|--------------------------------------|--------------------------------------------|
//! | `MemoryAddress`       | address phase of a RAM access        | `RAM` / `ADDRESS DECODER`                  |
//! | `MemoryContent`       | data phase of a RAM access           | `RAM` / `MEMORY CELL`, `R/W LOGIC`         |
//! | `RegisterAddress`     | register file index decode           | `REGISTER` / `ADDRESS DECODER`             |
//! | `RegisterContent`     | register file read or write          | `REGISTER` / `REGISTER CELL`               |
//! | `InstructionDecode`   | a fetched word entering decode       | `CPU` / `INSTRUCTION DECODER`, `EXECUTION` |
//! | [`on_time_tick`]      | periodic checkpoint                  | every `TIME`- and `PC`-triggered fault     |
//!
//! [`on_time_tick`]: FaultController::on_time_tick

pub mod coupling;
pub mod dynamic;
pub mod single;

use std::mem;
use std::path::Path;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::faults::{
    validate, CampaignError, Component, FaultMode, FaultSpec, FaultStore, Level, Target, Trigger,
    ValidationIssue,
};
use crate::history::{CellBank, OpHistory};
use crate::host::{Clock, Machine};
use crate::inject::{self, lockup::Lockup, lockup::EXECUTION_ARM_MARKER, lockup::NOP_MOV_R8_R8};
use crate::profiler::{AccessProfiler, ExperimentLog, REGISTER_FILE_TOP};
use crate::stats::{FaultClass, InjectionCounters};
use crate::trigger::{self, Decision, Firing};

use coupling::CouplingFaultOps;
use dynamic::DynamicFaultOps;
use single::CellFaultOps;

/// Which guest event a call to [`FaultController::on_access`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPoint {
    MemoryAddress,
    MemoryContent,
    RegisterAddress,
    RegisterContent,
    InstructionDecode,
}

/// Direction of the reported access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
}

/// One matched access, as the mode engines see it.
#[derive(Debug, Clone, Copy)]
pub struct CellAccess {
    pub on_register: bool,
    pub addr: u64,
    pub kind: AccessKind,
    pub id: u32,
}

/// Why a campaign failed to load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read campaign file: {0}")]
    Io(#[from] std::io::Error),
    #[error("campaign file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Rejected(#[from] CampaignError),
}

/// The injection engine.
///
/// Owns the loaded campaign, the per-bit write history the dynamic
/// modes consult, the activation counters and the instruction trap
/// state. Everything but the trace sinks round-trips through
/// [`read_state`](Self::read_state) for snapshotting.
#[derive(Debug, Serialize, Deserialize)]
pub struct FaultController {
    config: EngineConfig,
    store: FaultStore,
    history: OpHistory,
    counters: InjectionCounters,
    lockup: Lockup,
    #[serde(skip)]
    profiler: AccessProfiler,
    #[serde(skip)]
    experiment: ExperimentLog,
    /// Clock reading at the last campaign load; windows count from here.
    origin_ns: u64,
    /// Address of an engine-internal access in progress. Events the
    /// host delivers for it are dropped instead of re-dispatched.
    busy_address: Option<u64>,
}

impl FaultController {
    pub fn new(config: EngineConfig) -> Self {
        let width = config.cell_width;
        Self {
            config,
            store: FaultStore::default(),
            history: OpHistory::new(width),
            counters: InjectionCounters::new(),
            lockup: Lockup::new(),
            profiler: AccessProfiler::disabled(),
            experiment: ExperimentLog::disabled(),
            origin_ns: 0,
            busy_address: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &FaultStore {
        &self.store
    }

    pub fn counters(&self) -> &InjectionCounters {
        &self.counters
    }

    pub fn history(&self) -> &OpHistory {
        &self.history
    }

    pub fn set_profiler(&mut self, profiler: AccessProfiler) {
        self.profiler = profiler;
    }

    pub fn set_experiment_log(&mut self, log: ExperimentLog) {
        self.experiment = log;
    }

    /// Install a new campaign, replacing the current one.
    ///
    /// The campaign is validated as a whole first. Validation issues
    /// do not block the load: the flagged faults install along with
    /// the rest and stay inert at dispatch, and the issues come back
    /// as warnings. Only a fault id past the supported cap rejects
    /// the load, leaving the previous campaign installed. On success
    /// every counter, history row and trap is cleared and the window
    /// origin moves to `clock`'s current reading.
    pub fn reload<C: Clock>(
        &mut self,
        clock: &C,
        faults: Vec<FaultSpec>,
    ) -> Result<Vec<ValidationIssue>, CampaignError> {
        let mut store = FaultStore::new(faults);
        store.renormalize(self.config.legacy_interval_ms_scale);

        let issues = validate::validate(&store, &self.config);
        let (fatal, warnings): (Vec<_>, Vec<_>) =
            issues.into_iter().partition(|issue| issue.is_fatal());
        if !fatal.is_empty() {
            for issue in &fatal {
                error!("{issue}");
            }
            return Err(CampaignError { issues: fatal });
        }
        for issue in &warnings {
            warn!("{issue}");
        }

        let max_id = store.max_id();
        self.store = store;
        self.counters.reset(max_id);
        self.history.reset(max_id, self.config.cell_width);
        self.lockup.reset();
        self.busy_address = None;
        self.origin_ns = clock.now_ns();

        info!(
            "campaign loaded: {} faults, {} warnings",
            self.store.len(),
            warnings.len()
        );
        self.experiment.note(&format!(
            "campaign loaded: {} faults, {} warnings",
            self.store.len(),
            warnings.len()
        ));
        Ok(warnings)
    }

    pub fn reload_json<C: Clock>(
        &mut self,
        clock: &C,
        text: &str,
    ) -> Result<Vec<ValidationIssue>, LoadError> {
        let faults: Vec<FaultSpec> = serde_json::from_str(text)?;
        Ok(self.reload(clock, faults)?)
    }

    pub fn reload_file<C: Clock>(
        &mut self,
        clock: &C,
        path: &Path,
    ) -> Result<Vec<ValidationIssue>, LoadError> {
        let text = std::fs::read_to_string(path)?;
        self.reload_json(clock, &text)
    }

    /// The activation totals, formatted for the end-of-run report.
    pub fn report(&self) -> String {
        self.counters.to_string()
    }

    /// Zero the report totals mid-run. The once-per-id gate stays
    /// closed for ids that already fired; only a campaign load reopens
    /// it.
    pub fn clear_counters(&mut self) {
        self.counters.clear_totals();
    }

    pub fn flush(&mut self) {
        self.profiler.flush();
        self.experiment.flush();
    }

    /// One guest access. `addr` and `value` may come back mutated; the
    /// host must carry the mutated versions forward.
    pub fn on_access<M: Machine>(
        &mut self,
        m: &mut M,
        point: InjectionPoint,
        addr: &mut u64,
        value: &mut u64,
        kind: AccessKind,
    ) {
        if self.should_profile(*addr) {
            match kind {
                AccessKind::Read => self.profiler.record_read(*addr),
                AccessKind::Write => self.profiler.record_write(*addr, *value),
                AccessKind::Execute => self.profiler.record_exec(*addr),
            }
        }
        if self.busy_address == Some(*addr) {
            return;
        }
        if self.store.is_empty() {
            return;
        }

        let now_ns = m.now_ns().saturating_sub(self.origin_ns);
        match point {
            InjectionPoint::MemoryAddress => self.dispatch_address(now_ns, addr, false),
            InjectionPoint::RegisterAddress => self.dispatch_address(now_ns, addr, true),
            InjectionPoint::MemoryContent => {
                self.dispatch_content(m, now_ns, *addr, value, kind, false)
            }
            InjectionPoint::RegisterContent => {
                self.dispatch_content(m, now_ns, *addr, value, kind, true)
            }
            InjectionPoint::InstructionDecode => self.dispatch_decode(now_ns, *addr, value),
        }
    }

    /// One periodic checkpoint. Drives every fault that does not
    /// trigger on accesses, gating each by its window or by the
    /// current program counter.
    pub fn on_time_tick<M: Machine>(&mut self, m: &mut M) {
        if self.store.is_empty() {
            return;
        }

        // stale translations would route the coming cell writes around
        // the host's access hooks
        for idx in 0..self.store.len() {
            let params = self.store.faults()[idx].params;
            if let Some(a) = params.address {
                m.invalidate_translation(a);
            }
            if let Some(a) = params.cf_address {
                m.invalidate_translation(a);
            }
        }

        let now_ns = m.now_ns().saturating_sub(self.origin_ns);
        let pc = m.program_counter();
        let width = self.config.cell_width;

        for idx in 0..self.store.len() {
            let fault = &self.store.faults()[idx];
            let (Some(component), Some(target), Some(mode)) =
                (fault.component, fault.target, fault.mode)
            else {
                continue;
            };
            if !matches!(fault.trigger, Some(Trigger::Time) | Some(Trigger::Pc)) {
                continue;
            }
            let params = fault.params;
            let id = fault.id;

            if !self.gate(idx, now_ns, pc) {
                continue;
            }

            match (component, target) {
                (Component::Cpu, Target::ConditionFlags) => {
                    if let FaultMode::StatusFlag(flag) = mode {
                        let level = match params.set_bit {
                            0 => Level::Zero,
                            1 => Level::One,
                            _ => continue,
                        };
                        inject::apply_status_flag(m, flag, level);
                    } else {
                        warn!("fault {id}: CONDITION FLAGS fault without a flag mode");
                    }
                }
                (Component::Cpu, Target::InstructionDecoder | Target::InstructionExecution) => {
                    if params.address.is_none() && params.instruction.is_none() {
                        warn!("fault {id}: instruction fault with neither address nor trap word");
                        continue;
                    }
                    let trap = params.instruction.unwrap_or(0xFFFF_FFFF) as u32;
                    self.lockup.trip(m, trap);
                }
                (Component::Ram, Target::MemoryCell | Target::RwLogic)
                | (Component::Register, Target::RegisterCell) => {
                    let Some(victim) = params.instruction else {
                        continue;
                    };
                    let on_register = component == Component::Register;
                    let old = self.guarded_read(m, on_register, victim);
                    if let Some(new) = inject::mutate_word(mode, &params, old, width) {
                        self.guarded_write(m, on_register, victim, new);
                    }
                }
                _ => {}
            }
        }
    }

    /// Address-decoder faults: corrupt the address itself before the
    /// host resolves it. Address words are full machine words, so the
    /// cell width does not clamp them.
    fn dispatch_address(&mut self, now_ns: u64, addr: &mut u64, on_register: bool) {
        let component = if on_register {
            Component::Register
        } else {
            Component::Ram
        };

        for idx in 0..self.store.len() {
            let fault = &self.store.faults()[idx];
            if fault.component != Some(component)
                || fault.target != Some(Target::AddressDecoder)
                || fault.trigger != Some(Trigger::Access)
            {
                continue;
            }
            let Some(mode) = fault.mode else { continue };
            let params = fault.params;
            if params.address != Some(*addr) {
                continue;
            }

            if !self.gate(idx, now_ns, 0) {
                continue;
            }

            *addr = match mode {
                FaultMode::BitFlip => *addr ^ params.mask,
                FaultMode::NewValue => params.mask,
                FaultMode::StuckAt => (*addr & !params.mask) | (params.set_bit & params.mask),
                _ => *addr,
            };
        }
    }

    /// Cell faults riding a data access, including every coupling and
    /// dynamic mode.
    fn dispatch_content<M: Machine>(
        &mut self,
        m: &mut M,
        now_ns: u64,
        addr: u64,
        value: &mut u64,
        kind: AccessKind,
        on_register: bool,
    ) {
        let component = if on_register {
            Component::Register
        } else {
            Component::Ram
        };
        let width = self.config.cell_width;

        for idx in 0..self.store.len() {
            let fault = &self.store.faults()[idx];
            if fault.component != Some(component) || fault.trigger != Some(Trigger::Access) {
                continue;
            }
            let on_cell_target = if on_register {
                fault.target == Some(Target::RegisterCell)
            } else {
                matches!(
                    fault.target,
                    Some(Target::MemoryCell) | Some(Target::RwLogic)
                )
            };
            if !on_cell_target {
                continue;
            }
            let Some(mode) = fault.mode else { continue };
            let params = fault.params;
            let id = fault.id;

            let direct_hit = params.address == Some(addr);
            let partner_hit = params.cf_address == Some(addr);
            if !direct_hit && !partner_hit {
                continue;
            }

            if mode.is_coupling() {
                if params.cf_address.is_none() {
                    warn!("fault {id}: coupling mode without a partner cell; skipped");
                    continue;
                }
                // every family but state coupling fires from one side
                if partner_hit
                    && !direct_hit
                    && !matches!(mode, FaultMode::CouplingState(..))
                {
                    continue;
                }
            } else if !direct_hit {
                warn!("fault {id}: partner address matched a non-coupling mode; skipped");
                continue;
            }

            if !on_register {
                m.invalidate_translation(addr);
            }

            // dynamic modes key off the history of every watched write,
            // including writes seen while the fault's window is closed
            if kind == AccessKind::Write {
                let bank = if on_register {
                    CellBank::Register
                } else {
                    CellBank::Memory
                };
                let before = self.guarded_read(m, on_register, addr);
                self.history.record_write(bank, id, width.mask(), before, *value);
            }

            let (fires, count_as) = self.decide(idx, now_ns, 0);
            if !fires {
                continue;
            }
            // state coupling counts only when it moves a victim bit;
            // every other mode counts on the trigger firing
            if !matches!(mode, FaultMode::CouplingState(..)) {
                if let Some(firing) = count_as {
                    self.count_activation(idx, firing);
                }
            }

            let acc = CellAccess {
                on_register,
                addr,
                kind,
                id,
            };
            match mode {
                FaultMode::BitFlip | FaultMode::NewValue | FaultMode::StuckAt => {
                    if let Some(new) = inject::mutate_word(mode, &params, *value, width) {
                        *value = new;
                    }
                }
                FaultMode::Transition(level) => {
                    self.inject_transition(m, acc, value, level, params)
                }
                FaultMode::ReadDisturb(level) => {
                    self.inject_read_disturb(m, acc, value, level, params)
                }
                FaultMode::WriteDisturb(level) => {
                    self.inject_write_disturb(m, acc, value, level, params)
                }
                FaultMode::IncorrectRead(level) => {
                    self.inject_incorrect_read(m, acc, value, level, params)
                }
                FaultMode::DeceptiveReadDisturb(level) => {
                    self.inject_deceptive_read_disturb(m, acc, value, level, params)
                }
                FaultMode::DynamicReadDisturb(op) => {
                    self.inject_dynamic_read_disturb(m, acc, value, op, params)
                }
                FaultMode::DynamicIncorrectRead(op) => {
                    self.inject_dynamic_incorrect_read(m, acc, value, op, params)
                }
                FaultMode::DynamicDeceptiveReadDisturb(op) => {
                    self.inject_dynamic_deceptive_read(m, acc, value, op, params)
                }
                FaultMode::CouplingState(a, b) => {
                    if self.inject_state_coupling(m, acc, value, (a, b), params, partner_hit) {
                        if let Some(firing) = count_as {
                            self.count_activation(idx, firing);
                        }
                    }
                }
                FaultMode::CouplingDisturb(code) => {
                    self.inject_disturb_coupling(m, acc, value, code, params)
                }
                FaultMode::CouplingTransition(a, b) => {
                    self.inject_transition_coupling(m, acc, value, (a, b), params)
                }
                FaultMode::CouplingWriteDisturb(a, b) => {
                    self.inject_write_disturb_coupling(m, acc, value, (a, b), params)
                }
                FaultMode::CouplingReadDisturb(a, b) => self.inject_read_coupling(
                    m,
                    acc,
                    value,
                    (a, b),
                    params,
                    coupling::ReadTail::DisturbBoth,
                ),
                FaultMode::CouplingIncorrectRead(a, b) => self.inject_read_coupling(
                    m,
                    acc,
                    value,
                    (a, b),
                    params,
                    coupling::ReadTail::ReturnOnly,
                ),
                FaultMode::CouplingDeceptiveRead(a, b) => self.inject_read_coupling(
                    m,
                    acc,
                    value,
                    (a, b),
                    params,
                    coupling::ReadTail::CellOnly,
                ),
                // flag faults only fire from the periodic path
                FaultMode::StatusFlag(_) => {}
            }
        }
    }

    /// Instruction faults riding a fetch.
    fn dispatch_decode(&mut self, now_ns: u64, addr: u64, value: &mut u64) {
        for idx in 0..self.store.len() {
            let fault = &self.store.faults()[idx];
            if fault.component != Some(Component::Cpu) || fault.trigger != Some(Trigger::Access) {
                continue;
            }
            let target = match fault.target {
                Some(t @ (Target::InstructionDecoder | Target::InstructionExecution)) => t,
                _ => continue,
            };
            let Some(mode) = fault.mode else { continue };
            let params = fault.params;
            if params.address != Some(addr) {
                continue;
            }

            if !self.gate(idx, now_ns, 0) {
                continue;
            }

            match target {
                Target::InstructionDecoder => {
                    if mode == FaultMode::NewValue {
                        if let Some(replacement) = params.instruction {
                            *value = replacement;
                        }
                    }
                }
                Target::InstructionExecution => {
                    // armed by the campaign-side sentinel, never by the
                    // fetched word itself
                    if params.instruction == Some(EXECUTION_ARM_MARKER) {
                        *value = u64::from(NOP_MOV_R8_R8);
                    }
                }
                _ => {}
            }
        }
    }

    /// Evaluate one fault's trigger at this instant, maintain its
    /// active flag and count the firing.
    fn gate(&mut self, idx: usize, now_ns: u64, pc: u64) -> bool {
        let (fires, count_as) = self.decide(idx, now_ns, pc);
        if let Some(firing) = count_as {
            self.count_activation(idx, firing);
        }
        fires
    }

    /// The trigger half of [`gate`](Self::gate): evaluate and keep the
    /// active flag current, but leave the counters alone. Returns
    /// whether the fault fires and, when countable, the firing kind.
    fn decide(&mut self, idx: usize, now_ns: u64, pc: u64) -> (bool, Option<Firing>) {
        let Some(fault) = self.store.get_mut(idx) else {
            return (false, None);
        };
        let Some(trigger) = fault.trigger else {
            return (false, None);
        };

        match trigger::evaluate(
            trigger,
            fault.persistence,
            &fault.window,
            now_ns,
            pc,
            fault.params.address,
        ) {
            Decision::Fire(firing) => {
                fault.is_active = true;
                (true, Some(firing))
            }
            Decision::Idle => {
                fault.is_active = false;
                (false, None)
            }
            Decision::Undefined => (fault.is_active, None),
        }
    }

    fn count_activation(&mut self, idx: usize, firing: Firing) {
        let Some(fault) = self.store.get(idx) else {
            return;
        };
        let Some(component) = fault.component else {
            return;
        };
        let id = fault.id;
        let class = FaultClass::classify(component, firing == Firing::Permanent);
        let first = !self.counters.was_counted(id);
        self.counters.record(id, class);
        if first {
            self.experiment.note(&format!("fault {id} fired"));
        }
    }

    fn should_profile(&self, addr: u64) -> bool {
        if addr <= REGISTER_FILE_TOP {
            self.config.profile_registers
        } else {
            self.config.profile_memory
        }
    }

    /// Cell read issued by the engine itself. The busy marker keeps a
    /// host that mirrors its own accesses back into [`on_access`] from
    /// re-dispatching it.
    fn guarded_read<M: Machine>(&mut self, m: &M, on_register: bool, addr: u64) -> u64 {
        self.busy_address = Some(addr);
        let word = inject::read_cell(m, on_register, addr, self.config.cell_width);
        self.busy_address = None;
        word
    }

    fn guarded_write<M: Machine>(&mut self, m: &mut M, on_register: bool, addr: u64, value: u64) {
        self.busy_address = Some(addr);
        inject::write_cell(m, on_register, addr, value, self.config.cell_width);
        self.busy_address = None;
    }

    /// Snapshot everything but the trace sinks.
    pub fn read_state(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap()
    }

    /// Restore a [`read_state`](Self::read_state) snapshot. Malformed
    /// payloads leave the controller untouched; the trace sinks stay.
    pub fn write_state(&mut self, state: serde_json::Value) {
        if let Ok(mut restored) = serde_json::from_value::<FaultController>(state) {
            restored
                .store
                .renormalize(restored.config.legacy_interval_ms_scale);
            restored.profiler = mem::take(&mut self.profiler);
            restored.experiment = mem::take(&mut self.experiment);
            *self = restored;
        }
    }
}

impl Default for FaultController {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests_dynamic;
#[cfg(test)]
mod tests_single;
