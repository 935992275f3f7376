//! Physical frame and backing-store bookkeeping
//!
//! Both tables are owned by the kernel and lent to the address-space
//! builder while it loads an image and to the reclaim path when a finished
//! thread gives its pages back. Allocation is always lowest-index-first,
//! which keeps placement reproducible.

use core_types::OwnerId;
use log::debug;

/// Per-frame record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub used: bool,
    pub owner: Option<OwnerId>,
    /// Virtual page mapped into this frame
    pub virtual_page: Option<usize>,
}

/// Usage of every physical frame
#[derive(Debug, Clone)]
pub struct FrameTable {
    frames: Vec<FrameInfo>,
}

impl FrameTable {
    /// Creates a table of `num_frames` free frames
    pub fn new(num_frames: usize) -> Self {
        Self {
            frames: vec![FrameInfo::default(); num_frames],
        }
    }

    /// Claims the lowest free frame for `(owner, virtual_page)`
    ///
    /// Returns `None` if every frame is in use.
    pub fn claim_free(&mut self, owner: OwnerId, virtual_page: usize) -> Option<usize> {
        let index = self.frames.iter().position(|f| !f.used)?;
        self.frames[index] = FrameInfo {
            used: true,
            owner: Some(owner),
            virtual_page: Some(virtual_page),
        };
        Some(index)
    }

    /// Marks a specific frame as used without a mapping
    ///
    /// Stands in for memory taken by something outside the address-space
    /// builder.
    pub fn reserve(&mut self, index: usize) {
        if let Some(frame) = self.frames.get_mut(index) {
            frame.used = true;
        }
    }

    /// Frees every frame held by `owner`; returns how many were freed
    pub fn release_owner(&mut self, owner: OwnerId) -> usize {
        let mut freed = 0;
        for frame in self.frames.iter_mut().filter(|f| f.owner == Some(owner)) {
            *frame = FrameInfo::default();
            freed += 1;
        }
        if freed > 0 {
            debug!("{}: released {} frames", owner, freed);
        }
        freed
    }

    pub fn get(&self, index: usize) -> Option<&FrameInfo> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn used_count(&self) -> usize {
        self.frames.iter().filter(|f| f.used).count()
    }

    pub fn free_count(&self) -> usize {
        self.len() - self.used_count()
    }
}

/// Usage of every backing-store slot
#[derive(Debug, Clone)]
pub struct SwapMap {
    used: Vec<bool>,
}

impl SwapMap {
    pub fn new(num_slots: usize) -> Self {
        Self {
            used: vec![false; num_slots],
        }
    }

    /// Claims the lowest free slot
    pub fn claim(&mut self) -> Option<usize> {
        let index = self.used.iter().position(|used| !used)?;
        self.used[index] = true;
        Some(index)
    }

    /// Frees a slot; returns false if it was not in use
    pub fn release(&mut self, slot: usize) -> bool {
        match self.used.get_mut(slot) {
            Some(used) if *used => {
                *used = false;
                true
            }
            _ => false,
        }
    }

    pub fn is_used(&self, slot: usize) -> bool {
        self.used.get(slot).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn used_count(&self) -> usize {
        self.used.iter().filter(|used| **used).count()
    }
}

/// Hands out owner ids in increasing order, starting at 1
#[derive(Debug, Clone)]
pub struct OwnerIdAllocator {
    next: u32,
}

impl OwnerIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> OwnerId {
        let id = OwnerId::new(self.next);
        self.next = self.next.checked_add(1).expect("owner id space exhausted");
        id
    }
}

impl Default for OwnerIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
