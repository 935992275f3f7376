//! # Hardware Abstraction Layer (HAL)
//!
//! This crate defines the collaborator traits the kernel consumes.
//!
//! ## Philosophy
//!
//! **The kernel never touches a device directly.**
//!
//! Interrupt control, the timer, the execution engine, context transfer,
//! executable images and the backing store are all reached through the traits below. The
//! simulated kernel ships deterministic implementations of each so that
//! every scheduling and paging decision can be tested under `cargo test`.
//!
//! ## Design Principles
//!
//! 1. **Trait-based**: All hardware operations go through traits
//! 2. **Uniprocessor**: No trait here assumes more than one core
//! 3. **Testable**: Every trait can be simulated in-process

pub mod block_device;
pub mod cpu;
pub mod image;
pub mod interrupts;
pub mod machine;
pub mod timer;

pub use block_device::{BlockDevice, BlockError, BLOCK_SIZE};
#[cfg(feature = "alloc")]
pub use block_device::RamDisk;
pub use cpu::ContextSwitch;
pub use image::{ImageSource, OpenFile};
pub use interrupts::{IntLevel, InterruptHal, MachineStatus};
pub use machine::{MachineHal, Register, NUM_TOTAL_REGS};
pub use timer::TimerDevice;
