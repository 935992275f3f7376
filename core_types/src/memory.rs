//! # Translation Types
//!
//! Per-page translation state shared between the address-space builder and
//! the simulated machine.
//!
//! ## Key Types
//!
//! - [`PageLocation`]: A virtual page is either resident in exactly one
//!   physical frame or swapped to exactly one backing-store slot. The enum
//!   makes "both" and "neither" unrepresentable.
//! - [`PageFlags`]: Use / dirty / read-only bits.
//! - [`TranslationEntry`]: One row of a translation table.

use crate::ids::OwnerId;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Status bits kept on every translation entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PageFlags: u8 {
        /// Set by the machine on every access
        const USE       = 1 << 0;
        /// Set by the machine on every write
        const DIRTY     = 1 << 1;
        /// Writes raise a read-only exception
        const READ_ONLY = 1 << 2;
    }
}

/// Where a virtual page's bytes currently live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageLocation {
    /// Bound to a physical frame of main memory
    Resident { frame: usize },
    /// Written to a backing-store slot, not addressable until brought in
    Swapped { slot: usize },
}

impl fmt::Display for PageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageLocation::Resident { frame } => write!(f, "frame {}", frame),
            PageLocation::Swapped { slot } => write!(f, "slot {}", slot),
        }
    }
}

/// One virtual page of an address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    /// Virtual page number inside the owning address space
    pub virtual_page: usize,
    /// Frame or swap slot holding the page
    pub location: PageLocation,
    /// Address space that owns this page
    pub owner: OwnerId,
    /// Use / dirty / read-only bits
    pub flags: PageFlags,
}

impl TranslationEntry {
    /// Creates a resident entry with clear status bits
    pub fn resident(virtual_page: usize, frame: usize, owner: OwnerId) -> Self {
        Self {
            virtual_page,
            location: PageLocation::Resident { frame },
            owner,
            flags: PageFlags::empty(),
        }
    }

    /// Creates a swapped-out entry with clear status bits
    pub fn swapped(virtual_page: usize, slot: usize, owner: OwnerId) -> Self {
        Self {
            virtual_page,
            location: PageLocation::Swapped { slot },
            owner,
            flags: PageFlags::empty(),
        }
    }

    /// Returns true if the page is bound to a frame
    pub fn is_resident(&self) -> bool {
        matches!(self.location, PageLocation::Resident { .. })
    }

    /// Returns the frame index if the page is resident
    pub fn frame(&self) -> Option<usize> {
        match self.location {
            PageLocation::Resident { frame } => Some(frame),
            PageLocation::Swapped { .. } => None,
        }
    }

    /// Returns the backing-store slot if the page is swapped out
    pub fn slot(&self) -> Option<usize> {
        match self.location {
            PageLocation::Swapped { slot } => Some(slot),
            PageLocation::Resident { .. } => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(PageFlags::DIRTY)
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(PageFlags::READ_ONLY)
    }
}
