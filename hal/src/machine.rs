//! Execution engine abstraction
//!
//! The user-mode machine: a register file, a physically indexed byte
//! array, and a single slot for the currently installed translation table.

use core_types::TranslationEntry;

/// Number of registers in the user register file
pub const NUM_TOTAL_REGS: usize = 40;

/// Named registers of the register file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// General purpose register `n` (0..32)
    General(usize),
    /// User stack pointer
    Stack,
    /// Current program counter
    Pc,
    /// Next program counter (delayed branch model)
    NextPc,
}

impl Register {
    /// Index of this register in the register file
    pub fn index(self) -> usize {
        match self {
            Register::General(n) => n,
            Register::Stack => 29,
            Register::Pc => 34,
            Register::NextPc => 35,
        }
    }
}

/// User-mode machine operations
pub trait MachineHal {
    /// Reads a register by index
    fn read_register(&self, index: usize) -> i32;

    /// Writes a register by index
    fn write_register(&mut self, index: usize, value: i32);

    /// Physical memory
    fn main_memory(&self) -> &[u8];

    /// Physical memory, mutable
    fn main_memory_mut(&mut self) -> &mut [u8];

    /// Installs a translation table, replacing whatever was installed
    fn install_page_table(&mut self, table: Vec<TranslationEntry>);

    /// Returns the currently installed translation table, if any
    fn installed_page_table(&self) -> Option<&[TranslationEntry]>;

    /// Transfers control to user code
    ///
    /// A real engine never returns from this; user programs leave through
    /// the exit system call.
    fn run(&mut self);
}
