//! Interrupt handling abstraction

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interrupt enable level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntLevel {
    /// Interrupts are masked
    Off,
    /// Interrupts are delivered
    On,
}

impl fmt::Display for IntLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntLevel::Off => write!(f, "IntOff"),
            IntLevel::On => write!(f, "IntOn"),
        }
    }
}

/// What the processor is doing when an interrupt arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineStatus {
    /// Nothing runnable; waiting for the next interrupt
    Idle,
    /// Running kernel code
    System,
    /// Running a user program
    User,
}

/// Interrupt controller trait
///
/// On a uniprocessor, masking interrupts is the only form of mutual
/// exclusion the scheduler relies on. `set_level` returns the previous
/// level so callers can nest disable/restore pairs.
pub trait InterruptHal {
    /// Returns the current interrupt level
    fn level(&self) -> IntLevel;

    /// Sets the interrupt level, returning the previous one
    fn set_level(&mut self, level: IntLevel) -> IntLevel;

    /// Returns what the processor was doing when the current interrupt fired
    fn machine_status(&self) -> MachineStatus;

    /// Sets the processor status
    fn set_machine_status(&mut self, status: MachineStatus);

    /// Requests a context switch once the current interrupt handler returns
    ///
    /// Only meaningful while an interrupt handler is running.
    fn yield_on_return(&mut self);

    /// Returns true if any interrupt other than the timer is still scheduled
    fn any_future_interrupts(&self) -> bool;
}
