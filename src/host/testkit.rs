//! A minimal in-process machine for tests and benchmarks.

use super::{Clock, CpuState, MemoryState};

/// Sixteen general-purpose registers, a status word, a flat RAM and a
/// hand-cranked clock. Register 15 doubles as the program counter.
#[derive(Debug, Clone)]
pub struct TestMachine {
    pub regs: [u64; 16],
    pub status: u64,
    pub ram: Vec<u8>,
    pub clock_ns: u64,
    /// Addresses handed to `invalidate_translation`, in call order.
    pub flushed: Vec<u64>,
}

impl TestMachine {
    pub fn new() -> Self {
        Self::with_ram(0x1_0000)
    }

    pub fn with_ram(bytes: usize) -> Self {
        Self {
            regs: [0; 16],
            status: 0,
            ram: vec![0; bytes],
            clock_ns: 0,
            flushed: Vec::new(),
        }
    }

    pub fn advance(&mut self, ns: u64) {
        self.clock_ns += ns;
    }

    pub fn set_pc(&mut self, pc: u64) {
        self.regs[15] = pc;
    }

    /// Little-endian word of `bytes` length at `addr`, for assertions.
    pub fn word_at(&self, addr: u64, bytes: usize) -> u64 {
        let mut buf = [0u8; 8];
        self.read(addr, &mut buf[..bytes]);
        u64::from_le_bytes(buf)
    }

    pub fn store_word(&mut self, addr: u64, value: u64, bytes: usize) {
        let buf = value.to_le_bytes();
        self.write(addr, &buf[..bytes]);
    }
}

impl Default for TestMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuState for TestMachine {
    fn register(&self, index: u32) -> u64 {
        self.regs[index as usize & 0xF]
    }

    fn set_register(&mut self, index: u32, value: u64) {
        self.regs[index as usize & 0xF] = value;
    }

    fn status_flags(&self) -> u64 {
        self.status
    }

    fn set_status_flags(&mut self, value: u64, mask: u64) {
        self.status = (self.status & !mask) | (value & mask);
    }

    fn program_counter(&self) -> u64 {
        self.regs[15]
    }
}

impl MemoryState for TestMachine {
    fn read(&self, addr: u64, buf: &mut [u8]) {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = (addr as usize)
                .checked_add(i)
                .and_then(|at| self.ram.get(at))
                .copied()
                .unwrap_or(0);
        }
    }

    fn write(&mut self, addr: u64, buf: &[u8]) {
        for (i, byte) in buf.iter().enumerate() {
            let slot = (addr as usize)
                .checked_add(i)
                .and_then(|at| self.ram.get_mut(at));
            if let Some(slot) = slot {
                *slot = *byte;
            }
        }
    }

    fn invalidate_translation(&mut self, addr: u64) {
        self.flushed.push(addr);
    }
}

impl Clock for TestMachine {
    fn now_ns(&self) -> u64 {
        self.clock_ns
    }
}
