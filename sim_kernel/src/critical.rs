//! Interrupt-disabled critical sections
//!
//! On a single processor, masking interrupts is enough to keep the ready
//! queue and the sleep registry consistent: nothing else can run until the
//! level is restored. A [`CriticalSection`] is the proof that the caller
//! checked the level before touching that state. Every scheduling entry
//! point takes one by reference.
//!
//! This only works on a uniprocessor. A second core would keep running
//! with its own interrupts enabled, so none of this extends to SMP.
//!
//! Scheduling code must never take a blocking lock while holding a
//! critical section: waiting on a busy lock calls back into the
//! scheduler, which is already mid-update.

use hal::{IntLevel, InterruptHal};
use std::marker::PhantomData;

/// Witness that interrupts were disabled when it was created
///
/// Not `Send`, not `Clone`: a token is created at the top of a scheduling
/// path and lives no longer than that path.
#[derive(Debug)]
pub struct CriticalSection {
    _not_send: PhantomData<*const ()>,
}

impl CriticalSection {
    /// Checks the interrupt level and returns a token
    ///
    /// # Panics
    ///
    /// Panics if interrupts are enabled. Entering scheduling code with
    /// interrupts on is a programming error that cannot be recovered from.
    pub fn assert_held(gate: &dyn InterruptHal) -> Self {
        assert_eq!(
            gate.level(),
            IntLevel::Off,
            "scheduling state touched with interrupts enabled"
        );
        Self {
            _not_send: PhantomData,
        }
    }
}
