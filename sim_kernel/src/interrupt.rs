//! # Simulated Interrupt Controller
//!
//! Deterministic stand-in for the interrupt hardware. Interrupts are only
//! ever "delivered" when the kernel explicitly fires the timer, so the
//! controller just tracks the enable level, the processor status, and the
//! yield-on-return request raised from inside a handler.

use hal::{IntLevel, InterruptHal, MachineStatus};

/// Simulated interrupt controller
#[derive(Debug, Clone)]
pub struct SimInterrupt {
    level: IntLevel,
    status: MachineStatus,
    in_handler: bool,
    yield_requested: bool,
    /// Non-timer interrupts still scheduled (disk, console, ...)
    pending_device_interrupts: usize,
}

impl SimInterrupt {
    /// Creates a controller with interrupts enabled, running kernel code
    pub fn new() -> Self {
        Self {
            level: IntLevel::On,
            status: MachineStatus::System,
            in_handler: false,
            yield_requested: false,
            pending_device_interrupts: 0,
        }
    }

    /// Marks the start of an interrupt handler
    pub fn enter_handler(&mut self) {
        self.in_handler = true;
    }

    /// Marks the end of an interrupt handler
    pub fn exit_handler(&mut self) {
        self.in_handler = false;
    }

    /// Consumes a pending yield-on-return request
    pub fn take_yield_request(&mut self) -> bool {
        std::mem::take(&mut self.yield_requested)
    }

    /// Returns true if a handler asked for a yield that has not been taken
    pub fn yield_requested(&self) -> bool {
        self.yield_requested
    }

    /// Sets how many non-timer interrupts are still outstanding
    pub fn set_pending_device_interrupts(&mut self, count: usize) {
        self.pending_device_interrupts = count;
    }
}

impl Default for SimInterrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptHal for SimInterrupt {
    fn level(&self) -> IntLevel {
        self.level
    }

    fn set_level(&mut self, level: IntLevel) -> IntLevel {
        std::mem::replace(&mut self.level, level)
    }

    fn machine_status(&self) -> MachineStatus {
        self.status
    }

    fn set_machine_status(&mut self, status: MachineStatus) {
        self.status = status;
    }

    fn yield_on_return(&mut self) {
        assert!(self.in_handler, "yield_on_return outside an interrupt handler");
        self.yield_requested = true;
    }

    fn any_future_interrupts(&self) -> bool {
        self.pending_device_interrupts > 0
    }
}
