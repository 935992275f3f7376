//! Sleep registry and timer callback
//!
//! The registry holds the global tick clock and every pending timed
//! sleep. The alarm is the handler the timer device invokes once per
//! interrupt: it advances the clock, wakes whatever is due, and then either
//! shuts the timer down (nothing left to wait for) or, under the Priority
//! policy, asks for the interrupted thread to yield on return.
//!
//! A sleep cannot be cancelled. Wake latency is at most one timer period
//! past the nominal wake tick, since expiry is only noticed on a tick.

use crate::critical::CriticalSection;
use crate::scheduler::Scheduler;
use crate::thread::ThreadTable;
use core_types::ThreadId;
use hal::{InterruptHal, MachineStatus, TimerDevice};
use log::{debug, info, warn};

/// A pending timed sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepEntry {
    pub wake_tick: u64,
    pub thread_id: ThreadId,
}

/// Global clock plus the threads waiting on it
#[derive(Debug, Default)]
pub struct SleepRegistry {
    now: u64,
    entries: Vec<SleepEntry>,
}

impl SleepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks elapsed since boot
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Registers `thread_id` to wake `duration` ticks from now
    ///
    /// Returns the wake tick. The caller is responsible for blocking the
    /// thread and switching away.
    pub fn request(&mut self, _cs: &CriticalSection, duration: u64, thread_id: ThreadId) -> u64 {
        let wake_tick = self.now.saturating_add(duration);
        self.entries.push(SleepEntry {
            wake_tick,
            thread_id,
        });
        wake_tick
    }

    /// Advances the clock by one and readies every thread that is due
    ///
    /// Due threads are readied in registration order. Returns true if any
    /// thread woke.
    pub fn tick(
        &mut self,
        cs: &CriticalSection,
        scheduler: &mut Scheduler,
        threads: &mut ThreadTable,
    ) -> bool {
        self.now += 1;
        let now = self.now;

        let (due, waiting): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.wake_tick <= now);
        self.entries = waiting;

        for entry in &due {
            match threads.get_mut(&entry.thread_id) {
                Some(thread) => {
                    debug!("tick {}: waking {}", now, thread.name());
                    scheduler.ready_to_run(cs, thread);
                }
                None => warn!("tick {}: sleeper {} no longer exists", now, entry.thread_id),
            }
        }

        !due.is_empty()
    }

    /// Returns the number of sleeping threads
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending sleeps in registration order
    pub fn entries(&self) -> &[SleepEntry] {
        &self.entries
    }
}

/// What one timer callback did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmOutcome {
    /// At least one sleeper was readied
    pub woke: bool,
    /// A yield-on-return was requested
    pub preempt_requested: bool,
    /// The timer was turned off because nothing is left to wait for
    pub timer_disabled: bool,
}

/// Timer interrupt handler
#[derive(Debug, Default)]
pub struct Alarm {
    registry: SleepRegistry,
}

impl Alarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SleepRegistry {
        &self.registry
    }

    /// Current tick
    pub fn now(&self) -> u64 {
        self.registry.now()
    }

    /// Registers a sleep of `duration` ticks for `thread_id`
    pub fn wait_until(&mut self, cs: &CriticalSection, duration: u64, thread_id: ThreadId) -> u64 {
        self.registry.request(cs, duration, thread_id)
    }

    /// Runs once per timer interrupt, with interrupts off
    pub fn callback(
        &mut self,
        cs: &CriticalSection,
        interrupt: &mut dyn InterruptHal,
        timer: &mut dyn TimerDevice,
        scheduler: &mut Scheduler,
        threads: &mut ThreadTable,
    ) -> AlarmOutcome {
        let woke = self.registry.tick(cs, scheduler, threads);
        let mut outcome = AlarmOutcome {
            woke,
            ..AlarmOutcome::default()
        };

        let idle = interrupt.machine_status() == MachineStatus::Idle;
        if !woke && self.registry.is_empty() && idle {
            if !interrupt.any_future_interrupts() {
                info!("tick {}: nothing pending, disabling timer", self.registry.now());
                timer.disable();
                outcome.timer_disabled = true;
            }
        } else if scheduler.policy().is_time_sliced() {
            interrupt.yield_on_return();
            outcome.preempt_requested = true;
        }

        outcome
    }
}
