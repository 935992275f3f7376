//! # Simulated Kernel
//!
//! A cooperative uniprocessor kernel that runs in-process.
//!
//! ## Purpose
//!
//! The simulated kernel makes thread scheduling and user address-space
//! construction testable without hardware:
//! - Runs under `cargo test`
//! - Deterministic (the timer only moves when the kernel fires it)
//! - Inspectable (ready queue, sleep registry, frame table, backing store)
//!
//! ## Philosophy
//!
//! **Interrupts off is the only lock.**
//!
//! There is one processor. Every change to the ready queue or the sleep
//! registry happens with interrupts disabled, proven by a
//! [`CriticalSection`] token; nothing else can run until the level is
//! restored. The public entry points on [`SimulatedKernel`] disable
//! interrupts themselves and put the previous level back on return.
//!
//! ## Context switches
//!
//! [`SimulatedKernel::run`] hands the processor to another thread. The
//! simulated transfer returns at once, with the incoming thread current. A
//! thread that finishes is still "on its own stack" when it switches away,
//! so it is only reclaimed once a different thread is confirmed running.

pub mod address_space;
pub mod alarm;
pub mod config;
pub mod critical;
pub mod error;
pub mod file_system;
pub mod frame_table;
pub mod interrupt;
pub mod machine;
pub mod noff;
pub mod scheduler;
pub mod test_utils;
pub mod thread;
pub mod timer;

pub use address_space::{AddrSpace, AddrSpaceError, LoadContext, LoadSummary, PageGeometry};
pub use alarm::{Alarm, AlarmOutcome, SleepRegistry};
pub use config::{ConfigError, KernelConfig};
pub use critical::CriticalSection;
pub use error::KernelError;
pub use scheduler::{Scheduler, SchedulerPolicy};
pub use thread::{ExecutionContext, ThreadStatus, ThreadTable};

use core_types::ThreadId;
use file_system::SimFileSystem;
use frame_table::{FrameTable, OwnerIdAllocator, SwapMap};
use hal::{ContextSwitch, IntLevel, InterruptHal, MachineStatus, RamDisk, TimerDevice};
use interrupt::SimInterrupt;
use log::{debug, info};
use machine::{SimContextSwitch, SimMachine, Transfer};
use timer::SimTimerDevice;

/// Timer interrupts the idle loop will take before giving up
const MAX_IDLE_TICKS: u64 = 100_000;

/// Simulated kernel state
///
/// This owns every piece of global kernel state: the clock, the frame
/// table, the owner-id counter, and the simulated devices. Components
/// borrow what they need for the duration of one call.
pub struct SimulatedKernel {
    config: KernelConfig,
    interrupt: SimInterrupt,
    timer: SimTimerDevice,
    machine: SimMachine,
    switcher: SimContextSwitch,
    /// Overflow pages, one sector per page
    backing_store: RamDisk,
    frames: FrameTable,
    swap: SwapMap,
    owners: OwnerIdAllocator,
    file_system: SimFileSystem,
    scheduler: Scheduler,
    alarm: Alarm,
    threads: ThreadTable,
    /// Thread that owns the processor
    current: ThreadId,
    halted: bool,
}

impl SimulatedKernel {
    /// Boots a kernel with a single running thread named "main"
    pub fn new(config: KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;

        let mut main = ExecutionContext::new("main", 0, 0);
        main.set_status(ThreadStatus::Running);
        let current = main.id();
        let mut threads = ThreadTable::new();
        threads.insert(current, main);

        let timer = match config.timer_seed {
            Some(seed) => SimTimerDevice::randomized(config.timer_period, seed),
            None => SimTimerDevice::new(config.timer_period),
        };

        info!(
            "booting: policy {}, {} frames of {} bytes, {} swap sectors",
            config.policy, config.num_frames, config.page_size, config.swap_sectors
        );

        Ok(Self {
            interrupt: SimInterrupt::new(),
            timer,
            machine: SimMachine::new(config.num_frames, config.page_size),
            switcher: SimContextSwitch::new(),
            backing_store: RamDisk::with_block_size(config.swap_sectors, config.page_size),
            frames: FrameTable::new(config.num_frames),
            swap: SwapMap::new(config.swap_sectors),
            owners: OwnerIdAllocator::new(),
            file_system: SimFileSystem::new(),
            scheduler: Scheduler::new(config.policy),
            alarm: Alarm::new(),
            threads,
            current,
            halted: false,
            config,
        })
    }

    /// Disables interrupts; returns the previous level
    fn disable_interrupts(&mut self) -> IntLevel {
        self.interrupt.set_level(IntLevel::Off)
    }

    fn restore_interrupts(&mut self, level: IntLevel) {
        self.interrupt.set_level(level);
    }

    fn thread_mut(&mut self, id: ThreadId) -> Result<&mut ExecutionContext, KernelError> {
        self.threads.get_mut(&id).ok_or(KernelError::UnknownThread(id))
    }

    /// Creates a thread and puts it on the ready queue
    pub fn fork(&mut self, name: impl Into<String>, priority: i32, predicted_burst: u64) -> ThreadId {
        let thread = ExecutionContext::new(name, priority, predicted_burst);
        let id = thread.id();
        debug!("forking {} ({})", thread.name(), id);
        self.threads.insert(id, thread);

        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        if let Some(thread) = self.threads.get_mut(&id) {
            self.scheduler.ready_to_run(&cs, thread);
        }
        self.restore_interrupts(old);
        id
    }

    /// Marks an existing thread ready and queues it
    ///
    /// The running thread and threads already queued are refused.
    pub fn ready_to_run(&mut self, id: ThreadId) -> Result<(), KernelError> {
        if id == self.current {
            return Err(KernelError::AlreadyRunning(id));
        }
        if self.scheduler.is_queued(id) {
            return Err(KernelError::AlreadyReady(id));
        }
        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        let result = match self.threads.get_mut(&id) {
            Some(thread) => {
                self.scheduler.ready_to_run(&cs, thread);
                Ok(())
            }
            None => Err(KernelError::UnknownThread(id)),
        };
        self.restore_interrupts(old);
        result
    }

    /// Removes the next thread to run from the ready queue
    pub fn find_next_to_run(&mut self) -> Option<ThreadId> {
        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        let next = self.scheduler.find_next_to_run(&cs);
        self.restore_interrupts(old);
        next
    }

    /// Hands the processor from the current thread to `next`
    ///
    /// If `finishing`, the outgoing thread is reclaimed once a different
    /// thread is running.
    ///
    /// # Panics
    ///
    /// Panics if interrupts are enabled after the transfer, or if a second
    /// thread is marked for destruction before the first was reclaimed.
    pub fn run(
        &mut self,
        cs: &CriticalSection,
        next: ThreadId,
        finishing: bool,
    ) -> Result<(), KernelError> {
        if !self.threads.contains_key(&next) {
            return Err(KernelError::UnknownThread(next));
        }
        let old = self.current;

        if finishing {
            self.scheduler.mark_for_destruction(cs, old);
        }

        if let Some(outgoing) = self.threads.get_mut(&old) {
            if let Some(space) = outgoing.space.as_mut() {
                space.save_state(&self.machine);
                outgoing.save_user_state(&self.machine);
            }
        }

        let now = self.alarm.now();
        let incoming = self.thread_mut(next)?;
        incoming.set_status(ThreadStatus::Running);
        incoming.last_start_tick = now;

        debug!("switching from {} to {}", old, next);
        self.switcher.switch(old, next);
        self.current = next;

        // Back from the transfer: still uninterruptible
        let cs = CriticalSection::assert_held(&self.interrupt);
        self.reclaim_finished(&cs);

        if let Some(resumed) = self.threads.get(&self.current) {
            if let Some(space) = resumed.space.as_ref() {
                resumed.restore_user_state(&mut self.machine);
                space.restore_state(&mut self.machine);
            }
        }
        Ok(())
    }

    /// Destroys the thread pending destruction, if another one is running
    fn reclaim_finished(&mut self, cs: &CriticalSection) {
        let Some(dead) = self.scheduler.check_to_be_destroyed(cs, self.current) else {
            return;
        };
        if let Some(mut thread) = self.threads.remove(&dead) {
            if let Some(mut space) = thread.space.take() {
                let (frames, slots) = space.release(&mut self.frames, &mut self.swap);
                debug!(
                    "{}: returned {} frames and {} slots",
                    space.owner(),
                    frames,
                    slots
                );
            }
            debug!("reclaimed {}", thread.name());
        }
    }

    /// Gives up the processor if another thread is ready
    pub fn yield_now(&mut self) -> Result<(), KernelError> {
        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        let result = self.yield_locked(&cs);
        self.restore_interrupts(old);
        result
    }

    fn yield_locked(&mut self, cs: &CriticalSection) -> Result<(), KernelError> {
        let Some(next) = self.scheduler.find_next_to_run(cs) else {
            return Ok(());
        };
        let current = self.current;
        let thread = self
            .threads
            .get_mut(&current)
            .ok_or(KernelError::UnknownThread(current))?;
        debug!("yielding {}", thread.name());
        self.scheduler.ready_to_run(cs, thread);
        self.run(cs, next, false)
    }

    /// Suspends the current thread for `duration` ticks
    ///
    /// The burst estimate is updated before suspending. The call returns
    /// once some other thread has been switched in; the sleeper comes back
    /// through the ready queue after a timer tick reaches its wake tick.
    pub fn sleep(&mut self, duration: u64) -> Result<(), KernelError> {
        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        let result = self.sleep_locked(&cs, duration);
        self.restore_interrupts(old);
        result
    }

    fn sleep_locked(&mut self, cs: &CriticalSection, duration: u64) -> Result<(), KernelError> {
        let now = self.alarm.now();
        let current = self.current;
        let thread = self.thread_mut(current)?;
        let burst = thread.record_burst(now);
        debug!("{} sleeping {} ticks, burst estimate {}", thread.name(), duration, burst);

        self.alarm.wait_until(cs, duration, current);
        self.suspend_current(cs, false)
    }

    /// Ends the current thread
    ///
    /// It is reclaimed after the next context switch. Returns
    /// [`KernelError::Halted`] if nothing else can ever run.
    pub fn finish(&mut self) -> Result<(), KernelError> {
        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        debug!("finishing {}", self.current);
        let result = self.suspend_current(&cs, true);
        self.restore_interrupts(old);
        result
    }

    /// Blocks the current thread and switches to the next ready one
    ///
    /// Idles on the timer until something becomes ready.
    fn suspend_current(&mut self, cs: &CriticalSection, finishing: bool) -> Result<(), KernelError> {
        let current = self.current;
        let status = if finishing {
            ThreadStatus::Finished
        } else {
            ThreadStatus::Blocked
        };
        self.thread_mut(current)?.set_status(status);

        let mut idled = 0;
        let next = loop {
            if let Some(next) = self.scheduler.find_next_to_run(cs) {
                break next;
            }
            if idled == MAX_IDLE_TICKS {
                return Err(KernelError::IdleLimit { ticks: idled });
            }
            self.idle_locked(cs)?;
            idled += 1;
        };
        self.run(cs, next, finishing)
    }

    /// Lets time pass with nothing to run
    ///
    /// Fires the next timer interrupt in idle mode. Returns
    /// [`KernelError::Halted`] if the timer has been shut down.
    pub fn idle(&mut self) -> Result<(), KernelError> {
        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        let result = self.idle_locked(&cs);
        self.restore_interrupts(old);
        result
    }

    fn idle_locked(&mut self, cs: &CriticalSection) -> Result<(), KernelError> {
        if !self.timer.is_enabled() {
            info!("machine halting at tick {}", self.alarm.now());
            self.halted = true;
            return Err(KernelError::Halted);
        }

        let status = self.interrupt.machine_status();
        self.interrupt.set_machine_status(MachineStatus::Idle);
        self.fire_timer(cs);
        self.interrupt.set_machine_status(status);

        // No thread to preempt while idle
        self.interrupt.take_yield_request();
        Ok(())
    }

    fn fire_timer(&mut self, cs: &CriticalSection) -> AlarmOutcome {
        let gap = self.timer.period();
        self.timer.advance_ticks(gap);

        self.interrupt.enter_handler();
        let outcome = self.alarm.callback(
            cs,
            &mut self.interrupt,
            &mut self.timer,
            &mut self.scheduler,
            &mut self.threads,
        );
        self.interrupt.exit_handler();
        outcome
    }

    /// Delivers one timer interrupt to the running thread
    ///
    /// Returns `None` if the timer is disabled. If the alarm asked for a
    /// yield, the current thread yields before this returns.
    pub fn timer_interrupt(&mut self) -> Result<Option<AlarmOutcome>, KernelError> {
        if !self.timer.is_enabled() {
            return Ok(None);
        }

        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        let outcome = self.fire_timer(&cs);
        self.restore_interrupts(old);

        if self.interrupt.take_yield_request() {
            self.yield_now()?;
        }
        Ok(Some(outcome))
    }

    /// Replaces the current thread's program with `image` and starts it
    ///
    /// If loading fails the thread is left with no program, and the old
    /// program's translation table is no longer installed.
    pub fn exec(&mut self, image: &str) -> Result<LoadSummary, KernelError> {
        let old = self.disable_interrupts();
        let cs = CriticalSection::assert_held(&self.interrupt);
        let result = self.exec_locked(&cs, image);
        self.restore_interrupts(old);
        result
    }

    fn exec_locked(
        &mut self,
        _cs: &CriticalSection,
        image: &str,
    ) -> Result<LoadSummary, KernelError> {
        let current = self.current;
        let previous = self.thread_mut(current)?.space.take();
        let replaced = previous.is_some();
        if let Some(mut space) = previous {
            space.release(&mut self.frames, &mut self.swap);
        }

        let mut space = AddrSpace::new(&mut self.owners);
        let mut ctx = LoadContext {
            images: &self.file_system,
            frames: &mut self.frames,
            swap: &mut self.swap,
            backing_store: &mut self.backing_store,
            machine: &mut self.machine,
            geometry: self.config.geometry(),
        };
        match space.execute(image, &mut ctx) {
            Ok(summary) => {
                self.thread_mut(current)?.space = Some(space);
                Ok(summary)
            }
            Err(err) => {
                if replaced {
                    self.machine.remove_page_table();
                }
                Err(err.into())
            }
        }
    }

    /// Returns the configured policy
    pub fn policy(&self) -> SchedulerPolicy {
        self.scheduler.policy()
    }

    /// Changes the policy the alarm consults; the ready queue keeps its order
    pub fn set_policy(&mut self, policy: SchedulerPolicy) {
        self.scheduler.set_policy(policy);
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Returns the thread that owns the processor
    pub fn current_thread(&self) -> ThreadId {
        self.current
    }

    pub fn thread(&self, id: ThreadId) -> Option<&ExecutionContext> {
        self.threads.get(&id)
    }

    /// Returns the number of live (not yet reclaimed) threads
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Ticks elapsed since boot
    pub fn now(&self) -> u64 {
        self.alarm.now()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn alarm(&self) -> &Alarm {
        &self.alarm
    }

    pub fn interrupt(&self) -> &SimInterrupt {
        &self.interrupt
    }

    pub fn interrupt_mut(&mut self) -> &mut SimInterrupt {
        &mut self.interrupt
    }

    pub fn timer(&self) -> &SimTimerDevice {
        &self.timer
    }

    pub fn machine(&self) -> &SimMachine {
        &self.machine
    }

    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    /// Mutable frame table, to model memory already taken when a test starts
    pub fn frames_mut(&mut self) -> &mut FrameTable {
        &mut self.frames
    }

    pub fn swap(&self) -> &SwapMap {
        &self.swap
    }

    pub fn backing_store(&self) -> &RamDisk {
        &self.backing_store
    }

    pub fn file_system_mut(&mut self) -> &mut SimFileSystem {
        &mut self.file_system
    }

    /// Every context transfer so far, oldest first
    pub fn transfers(&self) -> &[Transfer] {
        self.switcher.transfers()
    }
}
