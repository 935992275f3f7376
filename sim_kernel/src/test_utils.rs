//! Test utilities for scheduling and loading scenarios
//!
//! Helpers shared by the unit tests and the integration tests under
//! `tests/`. Nothing here is used by the kernel itself.

use crate::alarm::AlarmOutcome;
use crate::noff::NoffImageBuilder;
use crate::{KernelConfig, KernelError, SchedulerPolicy, SimulatedKernel};
use core_types::ThreadId;

/// Boots a kernel with the default configuration and `policy`
pub fn boot(policy: SchedulerPolicy) -> Result<SimulatedKernel, KernelError> {
    SimulatedKernel::new(KernelConfig::new(policy))
}

/// Bytes whose value depends on their offset, so misplaced pages show up
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Builds an image with `len` bytes of patterned code and nothing else
pub fn code_image(len: usize) -> Vec<u8> {
    NoffImageBuilder::new().code(patterned_bytes(len)).build()
}

/// Marks every currently free frame as used by someone else
pub fn occupy_all_frames(kernel: &mut SimulatedKernel) {
    let frames = kernel.frames_mut();
    for index in 0..frames.len() {
        frames.reserve(index);
    }
}

/// Leaves exactly `free` frames unused, reserving the lowest ones
pub fn leave_free_frames(kernel: &mut SimulatedKernel, free: usize) {
    let frames = kernel.frames_mut();
    let keep_from = frames.len().saturating_sub(free);
    for index in 0..keep_from {
        frames.reserve(index);
    }
}

/// Empties the ready queue, front to back
pub fn drain_ready(kernel: &mut SimulatedKernel) -> Vec<ThreadId> {
    std::iter::from_fn(|| kernel.find_next_to_run()).collect()
}

/// Delivers `count` timer interrupts to the running thread
pub fn run_ticks(
    kernel: &mut SimulatedKernel,
    count: usize,
) -> Result<Vec<AlarmOutcome>, KernelError> {
    let mut outcomes = Vec::with_capacity(count);
    for _ in 0..count {
        match kernel.timer_interrupt()? {
            Some(outcome) => outcomes.push(outcome),
            None => break,
        }
    }
    Ok(outcomes)
}
