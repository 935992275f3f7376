//! # Simulated Timer Device
//!
//! Deterministic periodic timer for testing.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! The timer only advances when the kernel fires it. In fixed mode every
//! interrupt is exactly `period` machine ticks after the previous one. In
//! randomized mode the gap is drawn from a seeded generator over
//! `1..=2 * period`, so a run is still reproducible from its seed.

use hal::TimerDevice;

/// Simulated timer device with controllable time progression
///
/// # Examples
///
/// ```
/// use sim_kernel::timer::SimTimerDevice;
/// use hal::TimerDevice;
///
/// let mut timer = SimTimerDevice::new(100);
/// assert!(timer.is_enabled());
///
/// let gap = timer.period();
/// timer.advance_ticks(gap);
/// assert_eq!(timer.current_ticks(), 100);
/// ```
#[derive(Debug, Clone)]
pub struct SimTimerDevice {
    /// Machine ticks since boot
    ticks: u64,
    /// Nominal gap between interrupts
    period: u64,
    enabled: bool,
    /// xorshift state; `None` for a fixed period
    random_state: Option<u64>,
}

impl SimTimerDevice {
    /// Creates an enabled timer with a fixed period, starting at tick 0
    pub fn new(period: u64) -> Self {
        Self {
            ticks: 0,
            period,
            enabled: true,
            random_state: None,
        }
    }

    /// Creates an enabled timer whose gaps are drawn from `seed`
    pub fn randomized(period: u64, seed: u64) -> Self {
        Self {
            // xorshift never leaves the all-zero state
            random_state: Some(seed | 1),
            ..Self::new(period)
        }
    }

    /// Advances the timer by the specified number of ticks
    ///
    /// # Panics
    ///
    /// Panics if advancing would overflow u64.
    pub fn advance_ticks(&mut self, delta: u64) {
        self.ticks = self.ticks.checked_add(delta).expect("Timer tick overflow");
    }

    /// Returns the current tick count
    pub fn current_ticks(&self) -> u64 {
        self.ticks
    }

    fn next_random(state: &mut u64) -> u64 {
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        x
    }
}

impl TimerDevice for SimTimerDevice {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn period(&mut self) -> u64 {
        match self.random_state.as_mut() {
            Some(state) => 1 + Self::next_random(state) % self.period.saturating_mul(2).max(1),
            None => self.period,
        }
    }
}
