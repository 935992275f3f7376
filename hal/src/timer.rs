//! # Timer Device
//!
//! Hardware abstraction for the periodic timer interrupt.
//!
//! ## Philosophy
//!
//! **Time is a service, not a global variable.**
//!
//! The timer only decides *when* the next interrupt fires. Counting ticks,
//! waking sleepers and time-slicing all belong to the kernel's alarm.
//!
//! ## Design Principles
//!
//! 1. **Periodic**: Once enabled, fires every `period()` machine ticks
//! 2. **Switchable**: The alarm turns it off when the system goes idle
//! 3. **Frequency-agnostic**: No assumptions about wall-clock rate

/// Periodic timer device trait
///
/// # Implementation Notes
///
/// - A disabled timer never fires
/// - The period may vary between interrupts (randomized timers)
///
/// # Examples
///
/// ```
/// use hal::TimerDevice;
///
/// fn shut_down_if_quiet<T: TimerDevice>(timer: &mut T, quiet: bool) {
///     if quiet && timer.is_enabled() {
///         timer.disable();
///     }
/// }
/// ```
pub trait TimerDevice {
    /// Starts delivering interrupts
    fn enable(&mut self);

    /// Stops delivering interrupts
    fn disable(&mut self);

    /// Returns true while interrupts are being delivered
    fn is_enabled(&self) -> bool;

    /// Machine ticks until the next interrupt
    fn period(&mut self) -> u64;
}
