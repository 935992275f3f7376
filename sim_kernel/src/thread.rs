//! Execution contexts
//!
//! An [`ExecutionContext`] is everything the scheduler and the alarm need
//! to know about one thread: its status, its scheduling keys, the user
//! registers saved while it is switched out, and the address space it
//! runs in (if it is a user program).

use crate::address_space::AddrSpace;
use core_types::ThreadId;
use hal::{MachineHal, NUM_TOTAL_REGS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every live context, keyed by id
pub type ThreadTable = HashMap<ThreadId, ExecutionContext>;

/// Thread status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadStatus {
    /// Forked but never enqueued
    JustCreated,
    /// On the ready queue
    Ready,
    /// Owns the processor
    Running,
    /// Waiting (sleeping, or on a synchronization object)
    Blocked,
    /// Done; reclaimed after the next context switch
    Finished,
}

/// A schedulable thread of control
#[derive(Debug)]
pub struct ExecutionContext {
    id: ThreadId,
    name: String,
    status: ThreadStatus,
    /// Static priority; larger runs first under the Priority policy
    pub priority: i32,
    /// Predicted CPU burst in ticks; smaller runs first under SJF
    pub predicted_burst: u64,
    /// Tick at which the context last got the processor
    pub last_start_tick: u64,
    user_registers: [i32; NUM_TOTAL_REGS],
    /// Address space for user programs
    pub space: Option<AddrSpace>,
}

impl ExecutionContext {
    /// Creates a context with the given scheduling keys
    pub fn new(name: impl Into<String>, priority: i32, predicted_burst: u64) -> Self {
        Self {
            id: ThreadId::new(),
            name: name.into(),
            status: ThreadStatus::JustCreated,
            priority,
            predicted_burst,
            last_start_tick: 0,
            user_registers: [0; NUM_TOTAL_REGS],
            space: None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ThreadStatus) {
        self.status = status;
    }

    /// Folds the ticks run since the last dispatch into the burst estimate
    ///
    /// The estimate is cumulative: it grows by the length of every burst
    /// and is never decayed.
    pub fn record_burst(&mut self, now: u64) -> u64 {
        self.predicted_burst = now.saturating_sub(self.last_start_tick) + self.predicted_burst;
        self.predicted_burst
    }

    /// Copies the machine's user registers into this context
    pub fn save_user_state(&mut self, machine: &dyn MachineHal) {
        for (index, slot) in self.user_registers.iter_mut().enumerate() {
            *slot = machine.read_register(index);
        }
    }

    /// Writes this context's saved user registers back to the machine
    pub fn restore_user_state(&self, machine: &mut dyn MachineHal) {
        for (index, value) in self.user_registers.iter().enumerate() {
            machine.write_register(index, *value);
        }
    }
}
