//! Faultline - An embeddable memory/CPU fault injector for emulators
//!
//! This library provides the fault campaign model and the injection engine.

pub mod config;
pub mod controller;
pub mod faults;
pub mod history;
pub mod host;
pub mod inject;
pub mod profiler;
pub mod stats;
pub mod trigger;

pub use config::EngineConfig;
pub use controller::{AccessKind, FaultController, InjectionPoint, LoadError};
pub use faults::FaultSpec;
