//! Host integration traits.
//!
//! The engine never owns the simulated hardware. The embedding emulator
//! exposes its CPU, its memory and its virtual clock through these traits
//! and calls [`FaultController::on_access`](crate::FaultController::on_access)
//! from its access hooks.

pub mod testkit;

pub use testkit::TestMachine;

/// CPU-side state the engine can observe and corrupt.
///
/// Register indices 0..=15 address the general-purpose file; the status
/// word is its own accessor because several fault targets (condition
/// flags, register cells past the file) reach it.
pub trait CpuState {
    fn register(&self, index: u32) -> u64;
    fn set_register(&mut self, index: u32, value: u64);

    fn status_flags(&self) -> u64;

    /// Write `value` into the status word, touching only the bits in `mask`.
    fn set_status_flags(&mut self, value: u64, mask: u64);

    fn program_counter(&self) -> u64;
}

/// Memory-side state the engine can observe and corrupt.
pub trait MemoryState {
    /// Copy `buf.len()` bytes starting at `addr` into `buf`.
    fn read(&self, addr: u64, buf: &mut [u8]);

    /// Store `buf` starting at `addr`.
    fn write(&mut self, addr: u64, buf: &[u8]);

    /// Drop any cached translation covering `addr` so the next access
    /// takes the slow path through the access hooks again.
    fn invalidate_translation(&mut self, _addr: u64) {}
}

/// Virtual time source for windowed triggers.
pub trait Clock {
    fn now_ns(&self) -> u64;
}

/// Everything the controller needs from the host, in one bound.
pub trait Machine: CpuState + MemoryState + Clock {}

impl<T: CpuState + MemoryState + Clock> Machine for T {}
