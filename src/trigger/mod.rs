//! Trigger timing.
//!
//! Campaign time fields are strings like `"100MS"`, `"50US"` or a bare
//! `"2500"` (nanoseconds). They are parsed and normalized once at load;
//! the per-access gate then works on plain nanosecond windows measured
//! from the moment the campaign was loaded.

use serde::{Deserialize, Serialize};

use crate::faults::{Persistence, Trigger};

pub const SCALE_NS: u64 = 1;
pub const SCALE_US: u64 = 1_000;
pub const SCALE_MS: u64 = 1_000_000;

/// Unit suffix of a campaign time field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeScale {
    Ns,
    Us,
    Ms,
}

impl TimeScale {
    pub fn factor(self) -> u64 {
        match self {
            TimeScale::Ns => SCALE_NS,
            TimeScale::Us => SCALE_US,
            TimeScale::Ms => SCALE_MS,
        }
    }
}

/// Split a time field into its leading integer and unit suffix.
///
/// The integer is read like `atoi`: leading digits only, anything else
/// ends the number. A missing or unrecognized suffix yields `None` and
/// the value is taken as nanoseconds.
pub fn parse_time_field(s: &str) -> (u64, Option<TimeScale>) {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value = digits.parse().unwrap_or(0);

    let scale = if s.ends_with("MS") {
        Some(TimeScale::Ms)
    } else if s.ends_with("US") {
        Some(TimeScale::Us)
    } else if s.ends_with("NS") {
        Some(TimeScale::Ns)
    } else {
        None
    };
    (value, scale)
}

fn scaled(field: Option<&str>) -> u64 {
    let (value, scale) = parse_time_field(field.unwrap_or(""));
    // absurd values saturate into a window that never opens
    value.saturating_mul(scale.map_or(SCALE_NS, TimeScale::factor))
}

/// A fault's normalized firing window, in nanoseconds since load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerWindow {
    pub start_ns: u64,
    pub stop_ns: u64,
    pub interval_ns: u64,
}

impl TriggerWindow {
    /// True while `now` lies strictly inside the window.
    pub fn is_open(&self, now_ns: u64) -> bool {
        now_ns > self.start_ns && now_ns < self.stop_ns
    }

    /// A window that can never open.
    pub fn is_degenerate(&self) -> bool {
        self.stop_ns <= self.start_ns.saturating_add(1)
    }
}

/// Normalize the three campaign time fields into one window.
///
/// Each field is scaled by its own unit suffix. With
/// `legacy_interval_ms` set the historic rules apply instead: the
/// timer's suffix scales both start and stop, and the interval is
/// scaled as milliseconds whenever the timer carries any recognized
/// suffix, no matter what the interval itself says.
pub fn normalize(
    timer: Option<&str>,
    duration: Option<&str>,
    interval: Option<&str>,
    legacy_interval_ms: bool,
) -> TriggerWindow {
    if !legacy_interval_ms {
        return TriggerWindow {
            start_ns: scaled(timer),
            stop_ns: scaled(duration),
            interval_ns: scaled(interval),
        };
    }

    let (start, timer_scale) = parse_time_field(timer.unwrap_or(""));
    let (stop, _) = parse_time_field(duration.unwrap_or(""));
    let (step, _) = parse_time_field(interval.unwrap_or(""));

    match timer_scale {
        Some(scale) => TriggerWindow {
            start_ns: start.saturating_mul(scale.factor()),
            stop_ns: stop.saturating_mul(scale.factor()),
            interval_ns: step.saturating_mul(SCALE_MS),
        },
        None => TriggerWindow {
            start_ns: start,
            stop_ns: stop,
            interval_ns: step,
        },
    }
}

/// How a firing is classified in the injection counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firing {
    /// Fired through a window or a program-counter match.
    Windowed,
    /// Fired because the fault is permanent.
    Permanent,
}

/// Gate outcome for one fault on one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Fire(Firing),
    /// Conditions not met; the fault goes inactive.
    Idle,
    /// No usable persistence; leave the fault's activity untouched.
    Undefined,
}

/// Decide whether a fault fires at this instant.
///
/// Program-counter triggering wins over the persistence class; access-
/// and time-triggered faults fire by their persistence alone.
pub fn evaluate(
    trigger: Trigger,
    persistence: Option<Persistence>,
    window: &TriggerWindow,
    now_ns: u64,
    pc: u64,
    fault_address: Option<u64>,
) -> Decision {
    if trigger == Trigger::Pc {
        return if fault_address == Some(pc) {
            Decision::Fire(Firing::Windowed)
        } else {
            Decision::Idle
        };
    }

    match persistence {
        Some(Persistence::Permanent) => Decision::Fire(Firing::Permanent),
        Some(Persistence::Transient) => {
            if window.is_open(now_ns) {
                Decision::Fire(Firing::Windowed)
            } else {
                Decision::Idle
            }
        }
        Some(Persistence::Intermittent) => {
            if window.is_open(now_ns)
                && window.interval_ns != 0
                && (now_ns / window.interval_ns) % 2 == 0
            {
                Decision::Fire(Firing::Windowed)
            } else {
                Decision::Idle
            }
        }
        None => Decision::Undefined,
    }
}


#[cfg(test)]
mod tests_property;
