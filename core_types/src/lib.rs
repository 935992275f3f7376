//! # Core Types
//!
//! This crate defines the fundamental types shared by the kernel and its
//! hardware collaborators.
//!
//! ## Key Types
//!
//! - [`ThreadId`]: Unique identifier for an execution context
//! - [`OwnerId`]: Monotonic identifier stamped on every page an address space owns
//! - [`TranslationEntry`]: One virtual page of a translation table
//! - [`PageLocation`]: Where a virtual page currently lives (frame or swap slot)

pub mod ids;
pub mod memory;

pub use ids::{OwnerId, ThreadId};
pub use memory::{PageFlags, PageLocation, TranslationEntry};
