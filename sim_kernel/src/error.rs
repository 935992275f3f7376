//! Kernel-level errors

use crate::address_space::AddrSpaceError;
use crate::config::ConfigError;
use core_types::ThreadId;
use thiserror::Error;

/// Errors from kernel process management
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("no such thread: {0}")]
    UnknownThread(ThreadId),

    #[error("{0} is already on the ready list")]
    AlreadyReady(ThreadId),

    #[error("{0} is running and cannot be queued")]
    AlreadyRunning(ThreadId),

    /// Nothing is runnable and no interrupt can ever make something runnable
    #[error("machine halted: no runnable threads and no pending interrupts")]
    Halted,

    /// Idled this many ticks without any thread becoming ready
    #[error("idled {ticks} ticks without a thread becoming ready")]
    IdleLimit { ticks: u64 },

    #[error(transparent)]
    AddrSpace(#[from] AddrSpaceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
