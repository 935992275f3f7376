//! Ready-queue scheduler
//!
//! This module decides which thread runs next on a single processor.
//!
//! ## Philosophy
//!
//! - **One injection point**: The policy picks an ordering strategy once,
//!   at construction. Nothing else about the scheduler varies by policy.
//! - **Determinism first**: Same inputs produce the same schedule. Ties are
//!   always broken by insertion order.
//! - **Interrupts off**: Every entry point takes a [`CriticalSection`].
//!
//! ## Design
//!
//! - **FCFS**: Stable FIFO; the comparator calls every pair equal.
//! - **Priority**: Larger static priority first.
//! - **SJF**: Smaller predicted burst first.
//!
//! The ready queue is kept sorted on insertion using the scheduling keys
//! the context had at that moment. Changing the policy later only changes
//! what [`Scheduler::policy`] reports (which the alarm reads to decide on
//! time-slicing); queued entries are never re-sorted.
//!
//! The switch itself lives on the kernel, which owns the current-thread
//! pointer. The scheduler keeps the one-slot pending-destruction record
//! the switch uses: a finishing thread is still running on its own stack
//! when it gives up the processor, so it is only reclaimed once a
//! different thread is confirmed running.

use crate::critical::CriticalSection;
use crate::thread::{ExecutionContext, ThreadStatus};
use core_types::ThreadId;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// CPU scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchedulerPolicy {
    /// First come, first served
    #[default]
    #[serde(rename = "FCFS")]
    Fcfs,
    /// Shortest (predicted) job first
    #[serde(rename = "SJF")]
    Sjf,
    /// Static priority, with timer-driven time-slicing
    Priority,
}

impl SchedulerPolicy {
    /// The ordering strategy this policy installs in a new ready queue
    pub fn ordering(self) -> OrderingFn {
        match self {
            SchedulerPolicy::Fcfs => fcfs_order,
            SchedulerPolicy::Sjf => sjf_order,
            SchedulerPolicy::Priority => priority_order,
        }
    }

    /// Returns true if the alarm should preempt the running thread
    pub fn is_time_sliced(self) -> bool {
        self == SchedulerPolicy::Priority
    }
}

impl fmt::Display for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerPolicy::Fcfs => write!(f, "FCFS"),
            SchedulerPolicy::Sjf => write!(f, "SJF"),
            SchedulerPolicy::Priority => write!(f, "Priority"),
        }
    }
}

/// Error parsing a policy name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scheduling policy: {0}")]
pub struct ParsePolicyError(pub String);

impl FromStr for SchedulerPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fcfs" => Ok(SchedulerPolicy::Fcfs),
            "sjf" => Ok(SchedulerPolicy::Sjf),
            "priority" => Ok(SchedulerPolicy::Priority),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// A queued thread together with the keys it was sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEntry {
    pub thread_id: ThreadId,
    pub priority: i32,
    pub predicted_burst: u64,
}

/// Ordering strategy; `Less` means the first entry runs earlier
pub type OrderingFn = fn(&ReadyEntry, &ReadyEntry) -> Ordering;

fn fcfs_order(_: &ReadyEntry, _: &ReadyEntry) -> Ordering {
    Ordering::Equal
}

fn priority_order(a: &ReadyEntry, b: &ReadyEntry) -> Ordering {
    b.priority.cmp(&a.priority)
}

fn sjf_order(a: &ReadyEntry, b: &ReadyEntry) -> Ordering {
    a.predicted_burst.cmp(&b.predicted_burst)
}

/// Scheduling event for audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// Thread placed on the ready queue
    Readied { thread_id: ThreadId },
    /// Thread removed from the front of the ready queue
    Selected { thread_id: ThreadId },
    /// Finishing thread recorded for deferred destruction
    MarkedForDestruction { thread_id: ThreadId },
    /// Finished thread handed back for reclamation
    Reclaimed { thread_id: ThreadId },
}

/// Sorted ready queue
///
/// Insertion walks from the front and stops before the first entry the
/// new one orders strictly ahead of, so equal keys keep arrival order.
#[derive(Debug)]
struct ReadyQueue {
    queue: VecDeque<ReadyEntry>,
    ordering: OrderingFn,
}

impl ReadyQueue {
    fn new(ordering: OrderingFn) -> Self {
        Self {
            queue: VecDeque::new(),
            ordering,
        }
    }

    fn insert(&mut self, entry: ReadyEntry) {
        let position = self
            .queue
            .iter()
            .position(|existing| (self.ordering)(&entry, existing) == Ordering::Less)
            .unwrap_or(self.queue.len());
        self.queue.insert(position, entry);
    }

    fn contains(&self, thread_id: ThreadId) -> bool {
        self.queue.iter().any(|e| e.thread_id == thread_id)
    }

    fn remove_front(&mut self) -> Option<ReadyEntry> {
        self.queue.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Uniprocessor scheduler
pub struct Scheduler {
    policy: SchedulerPolicy,
    ready: ReadyQueue,
    to_be_destroyed: Option<ThreadId>,
    /// Audit log for scheduling events (test-only)
    audit_log: Vec<ScheduleEvent>,
}

impl Scheduler {
    /// Creates a scheduler whose ready queue orders by `policy`
    pub fn new(policy: SchedulerPolicy) -> Self {
        debug!("ready queue ordered by {}", policy);
        Self {
            policy,
            ready: ReadyQueue::new(policy.ordering()),
            to_be_destroyed: None,
            audit_log: Vec::new(),
        }
    }

    /// Marks a thread ready and puts it on the ready queue
    pub fn ready_to_run(&mut self, _cs: &CriticalSection, thread: &mut ExecutionContext) {
        debug!("putting {} on ready list", thread.name());
        debug_assert!(
            !self.ready.contains(thread.id()),
            "{} is already on the ready list",
            thread.name()
        );

        thread.set_status(ThreadStatus::Ready);
        self.ready.insert(ReadyEntry {
            thread_id: thread.id(),
            priority: thread.priority,
            predicted_burst: thread.predicted_burst,
        });
        self.audit_log.push(ScheduleEvent::Readied {
            thread_id: thread.id(),
        });
    }

    /// Removes and returns the thread at the front of the ready queue
    ///
    /// Returns `None` if nothing is ready. The thread's status is left
    /// alone; the switch marks it running.
    pub fn find_next_to_run(&mut self, _cs: &CriticalSection) -> Option<ThreadId> {
        let entry = self.ready.remove_front()?;
        self.audit_log.push(ScheduleEvent::Selected {
            thread_id: entry.thread_id,
        });
        Some(entry.thread_id)
    }

    /// Records the outgoing thread for destruction after the switch
    ///
    /// # Panics
    ///
    /// Panics if another thread is already pending destruction. Only one
    /// can be pending: it is reclaimed right after the transfer that
    /// marked it.
    pub fn mark_for_destruction(&mut self, _cs: &CriticalSection, thread_id: ThreadId) {
        assert!(
            self.to_be_destroyed.is_none(),
            "second thread marked for destruction before the first was reclaimed"
        );
        self.to_be_destroyed = Some(thread_id);
        self.audit_log
            .push(ScheduleEvent::MarkedForDestruction { thread_id });
    }

    /// Hands back the pending thread once a different one is running
    ///
    /// Returns `None` if nothing is pending, or if the pending thread is
    /// still the one on the processor.
    pub fn check_to_be_destroyed(
        &mut self,
        _cs: &CriticalSection,
        running: ThreadId,
    ) -> Option<ThreadId> {
        match self.to_be_destroyed {
            Some(thread_id) if thread_id != running => {
                self.to_be_destroyed = None;
                self.audit_log.push(ScheduleEvent::Reclaimed { thread_id });
                Some(thread_id)
            }
            _ => None,
        }
    }

    /// Returns the thread waiting to be reclaimed, if any
    pub fn pending_destruction(&self) -> Option<ThreadId> {
        self.to_be_destroyed
    }

    /// Returns the active policy
    pub fn policy(&self) -> SchedulerPolicy {
        self.policy
    }

    /// Changes the reported policy
    ///
    /// The ready queue keeps the ordering it was built with.
    pub fn set_policy(&mut self, policy: SchedulerPolicy) {
        self.policy = policy;
    }

    /// Returns the number of threads on the ready queue
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Returns true if `thread_id` is waiting on the ready queue
    pub fn is_queued(&self, thread_id: ThreadId) -> bool {
        self.ready.contains(thread_id)
    }

    /// Returns true if there are ready threads
    pub fn has_ready_threads(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Returns the ready queue front to back
    pub fn ready_threads(&self) -> Vec<ThreadId> {
        self.ready.queue.iter().map(|e| e.thread_id).collect()
    }

    /// Returns a reference to the audit log
    ///
    /// Used in tests to verify scheduling behavior.
    pub fn audit_log(&self) -> &[ScheduleEvent] {
        &self.audit_log
    }

    /// Clears the audit log
    pub fn clear_audit_log(&mut self) {
        self.audit_log.clear();
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ready list contents ({}):", self.policy)?;
        for entry in &self.ready.queue {
            writeln!(
                f,
                "  {} priority={} burst={}",
                entry.thread_id, entry.priority, entry.predicted_burst
            )?;
        }
        Ok(())
    }
}
