//! Access profiling and the experiment log.
//!
//! Campaign analysis needs two text artifacts next to the injection
//! results: a flat trace of every guest access the engine saw, split
//! into register and memory traffic, and a run log tying observations
//! to one experiment. Both are plain line formats so they stay easy to
//! grep and diff between runs.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::Utc;

/// Highest cell index routed to the register trace; everything above
/// is memory traffic.
pub const REGISTER_FILE_TOP: u64 = 15;

/// Line-oriented access trace, split by address range.
///
/// One line per access: `0x00001000 w 0xff` for writes, `0x00001000 r`
/// for reads, `0x00001000 e` for instruction fetches. Sink errors are
/// swallowed; a torn trace is still worth more than a dead run.
#[derive(Default)]
pub struct AccessProfiler {
    register_sink: Option<Box<dyn Write + Send>>,
    memory_sink: Option<Box<dyn Write + Send>>,
}

impl AccessProfiler {
    /// A profiler that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_sinks(
        register_sink: Option<Box<dyn Write + Send>>,
        memory_sink: Option<Box<dyn Write + Send>>,
    ) -> Self {
        Self {
            register_sink,
            memory_sink,
        }
    }

    /// Trace into `register_accesses.log` and `memory_accesses.log`
    /// under `dir`.
    pub fn to_files(dir: &Path) -> io::Result<Self> {
        let register = BufWriter::new(File::create(dir.join("register_accesses.log"))?);
        let memory = BufWriter::new(File::create(dir.join("memory_accesses.log"))?);
        Ok(Self::with_sinks(
            Some(Box::new(register)),
            Some(Box::new(memory)),
        ))
    }

    pub fn record_read(&mut self, addr: u64) {
        if let Some(sink) = self.sink_for(addr) {
            let _ = writeln!(sink, "{addr:#010x} r");
        }
    }

    pub fn record_write(&mut self, addr: u64, value: u64) {
        if let Some(sink) = self.sink_for(addr) {
            let _ = writeln!(sink, "{addr:#010x} w {value:#x}");
        }
    }

    pub fn record_exec(&mut self, addr: u64) {
        if let Some(sink) = self.sink_for(addr) {
            let _ = writeln!(sink, "{addr:#010x} e");
        }
    }

    pub fn flush(&mut self) {
        if let Some(sink) = self.register_sink.as_mut() {
            let _ = sink.flush();
        }
        if let Some(sink) = self.memory_sink.as_mut() {
            let _ = sink.flush();
        }
    }

    fn sink_for(&mut self, addr: u64) -> Option<&mut (dyn Write + Send + 'static)> {
        if addr <= REGISTER_FILE_TOP {
            self.register_sink.as_deref_mut()
        } else {
            self.memory_sink.as_deref_mut()
        }
    }
}

impl fmt::Debug for AccessProfiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessProfiler")
            .field("register_sink", &self.register_sink.is_some())
            .field("memory_sink", &self.memory_sink.is_some())
            .finish()
    }
}

/// Run log for one injection experiment.
///
/// Opens with a header line carrying a random experiment token and the
/// wall-clock start, then takes one timestamped line per event. The
/// token lets results from machines with skewed clocks be matched up.
#[derive(Default)]
pub struct ExperimentLog {
    sink: Option<Box<dyn Write + Send>>,
    token: u128,
}

impl ExperimentLog {
    /// A log that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(mut sink: Box<dyn Write + Send>) -> Self {
        let token: u128 = rand::random();
        let _ = writeln!(
            sink,
            "experiment {token:032x} started {}",
            Utc::now().to_rfc3339()
        );
        Self {
            sink: Some(sink),
            token,
        }
    }

    pub fn to_file(path: &Path) -> io::Result<Self> {
        let sink = BufWriter::new(File::create(path)?);
        Ok(Self::new(Box::new(sink)))
    }

    /// This run's random token; zero when the log is disabled.
    pub fn token(&self) -> u128 {
        self.token
    }

    pub fn note(&mut self, line: &str) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = writeln!(sink, "{} {line}", Utc::now().to_rfc3339());
        }
    }

    pub fn flush(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = sink.flush();
        }
    }
}

impl fmt::Debug for ExperimentLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentLog")
            .field("sink", &self.sink.is_some())
            .field("token", &self.token)
            .finish()
    }
}
