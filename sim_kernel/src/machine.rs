//! Simulated execution engine and context transfer
//!
//! [`SimMachine`] owns the user register file, physical memory and the
//! single installed translation table. [`SimContextSwitch`] records every
//! transfer instead of swapping real stacks; in the simulation the
//! transfer "returns" immediately, as if the incoming thread had later
//! switched back.

use core_types::{ThreadId, TranslationEntry};
use hal::{ContextSwitch, MachineHal, NUM_TOTAL_REGS};

/// Simulated user-mode machine
#[derive(Debug, Clone)]
pub struct SimMachine {
    registers: [i32; NUM_TOTAL_REGS],
    main_memory: Vec<u8>,
    page_table: Option<Vec<TranslationEntry>>,
    /// Number of times control was handed to user code
    runs: u64,
}

impl SimMachine {
    /// Creates a machine with `num_frames * page_size` bytes of zeroed memory
    pub fn new(num_frames: usize, page_size: usize) -> Self {
        Self {
            registers: [0; NUM_TOTAL_REGS],
            main_memory: vec![0; num_frames * page_size],
            page_table: None,
            runs: 0,
        }
    }

    /// Returns how many times `run` has been called
    pub fn run_count(&self) -> u64 {
        self.runs
    }

    /// Removes the installed translation table
    pub fn remove_page_table(&mut self) -> Option<Vec<TranslationEntry>> {
        self.page_table.take()
    }

    /// Mutable access to the installed table (the MMU setting use/dirty bits)
    pub fn installed_page_table_mut(&mut self) -> Option<&mut [TranslationEntry]> {
        self.page_table.as_deref_mut()
    }
}

impl MachineHal for SimMachine {
    fn read_register(&self, index: usize) -> i32 {
        self.registers[index]
    }

    fn write_register(&mut self, index: usize, value: i32) {
        self.registers[index] = value;
    }

    fn main_memory(&self) -> &[u8] {
        &self.main_memory
    }

    fn main_memory_mut(&mut self) -> &mut [u8] {
        &mut self.main_memory
    }

    fn install_page_table(&mut self, table: Vec<TranslationEntry>) {
        self.page_table = Some(table);
    }

    fn installed_page_table(&self) -> Option<&[TranslationEntry]> {
        self.page_table.as_deref()
    }

    fn run(&mut self) {
        self.runs += 1;
    }
}

/// A recorded context transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub from: ThreadId,
    pub to: ThreadId,
}

/// Context switch that records transfers
#[derive(Debug, Clone, Default)]
pub struct SimContextSwitch {
    transfers: Vec<Transfer>,
}

impl SimContextSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every transfer performed so far, oldest first
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }
}

impl ContextSwitch for SimContextSwitch {
    fn switch(&mut self, from: ThreadId, to: ThreadId) {
        self.transfers.push(Transfer { from, to });
    }
}
