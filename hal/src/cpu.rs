//! CPU abstraction

use core_types::ThreadId;

/// Machine-level context transfer
///
/// Saves the outgoing thread's kernel registers and stack pointer, then
/// loads the incoming thread's. The call returns when some later transfer
/// resumes the processor on the kernel side. Always invoked with
/// interrupts disabled.
pub trait ContextSwitch {
    /// Transfers the processor from `from` to `to`
    fn switch(&mut self, from: ThreadId, to: ThreadId);
}
