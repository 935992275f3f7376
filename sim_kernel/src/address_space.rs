//! User address spaces
//!
//! An [`AddrSpace`] is the translation table of one user program plus the
//! bookkeeping needed to tear it down. Building one reads a NOFF image and
//! places every page: into the lowest free physical frame while any are
//! left, and into the lowest free backing-store slot after that. A page
//! already resident is never evicted to make room.
//!
//! Only one address space is installed on the machine at a time. The
//! context switch saves the outgoing space's table and installs the
//! incoming one.

use crate::frame_table::{FrameTable, OwnerIdAllocator, SwapMap};
use crate::noff::{NoffHeader, NOFF_HEADER_SIZE};
use core_types::{OwnerId, TranslationEntry};
use hal::{
    BlockDevice, BlockError, ImageSource, MachineHal, OpenFile, Register, NUM_TOTAL_REGS,
};
use log::{debug, info, warn};
use thiserror::Error;

/// Bytes kept free between the initial stack pointer and the top of the
/// address space
const STACK_SAFETY_MARGIN: usize = 16;

/// Address-space construction errors
#[derive(Debug, Error)]
pub enum AddrSpaceError {
    #[error("unable to open executable {name}")]
    ImageNotFound { name: String },

    #[error("executable {name} is too short for a header ({len} bytes)")]
    TruncatedHeader { name: String, len: usize },

    #[error("initialized data at {addr:#x}+{size} lies outside physical memory ({memory} bytes)")]
    InitDataOutOfRange {
        addr: usize,
        size: usize,
        memory: usize,
    },

    #[error("a {size} byte address space leaves no room for the stack margin of {margin}")]
    SpaceTooSmall { size: usize, margin: usize },

    #[error("a {size} byte address space does not fit a stack pointer register")]
    SpaceTooLarge { size: usize },

    #[error("backing store write failed: {0}")]
    BackingStore(#[from] BlockError),
}

/// Initial stack pointer for a space of `size` bytes
fn stack_top(size: usize) -> Result<i32, AddrSpaceError> {
    let top = size
        .checked_sub(STACK_SAFETY_MARGIN)
        .ok_or(AddrSpaceError::SpaceTooSmall {
            size,
            margin: STACK_SAFETY_MARGIN,
        })?;
    i32::try_from(top).map_err(|_| AddrSpaceError::SpaceTooLarge { size })
}

/// Page and stack sizes used when laying out a space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    pub page_size: usize,
    pub user_stack_size: usize,
}

/// Kernel state lent to the builder for one load
pub struct LoadContext<'a> {
    pub images: &'a dyn ImageSource,
    pub frames: &'a mut FrameTable,
    pub swap: &'a mut SwapMap,
    pub backing_store: &'a mut dyn BlockDevice,
    pub machine: &'a mut dyn MachineHal,
    pub geometry: PageGeometry,
}

/// Where the pages of a loaded image ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub num_pages: usize,
    pub resident: usize,
    pub swapped: usize,
}

/// Translation state of one user program
#[derive(Debug)]
pub struct AddrSpace {
    owner: OwnerId,
    page_table: Vec<TranslationEntry>,
    page_size: usize,
    loaded: bool,
}

impl AddrSpace {
    /// Creates an empty space with the next owner id
    pub fn new(owners: &mut OwnerIdAllocator) -> Self {
        Self {
            owner: owners.allocate(),
            page_table: Vec::new(),
            page_size: 0,
            loaded: false,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn num_pages(&self) -> usize {
        self.page_table.len()
    }

    pub fn page_table(&self) -> &[TranslationEntry] {
        &self.page_table
    }

    /// Returns true once the space has been handed to the machine
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Reads `image` and places each of its pages
    ///
    /// # Panics
    ///
    /// Panics if the image's magic number is corrupt, or if the backing
    /// store has no free slot for a page that did not fit in memory.
    pub fn load(
        &mut self,
        image: &str,
        ctx: &mut LoadContext<'_>,
    ) -> Result<LoadSummary, AddrSpaceError> {
        let images = ctx.images;
        let mut file = images
            .open(image)
            .ok_or_else(|| AddrSpaceError::ImageNotFound {
                name: image.to_string(),
            })?;

        let mut raw = [0u8; NOFF_HEADER_SIZE];
        let len = file.read_at(&mut raw, 0);
        if len < NOFF_HEADER_SIZE {
            return Err(AddrSpaceError::TruncatedHeader {
                name: image.to_string(),
                len,
            });
        }
        let header = NoffHeader::parse(&raw);

        let page_size = ctx.geometry.page_size;
        let size = header.image_size() + ctx.geometry.user_stack_size;
        let num_pages = size.div_ceil(page_size);
        stack_top(num_pages * page_size)?;

        let data_addr = header.init_data.virtual_addr as usize;
        let data_size = header.init_data.size as usize;
        let memory = ctx.machine.main_memory().len();
        if data_size > 0 && data_addr + data_size > memory {
            return Err(AddrSpaceError::InitDataOutOfRange {
                addr: data_addr,
                size: data_size,
                memory,
            });
        }

        debug!(
            "{}: initializing address space, {} pages, size {}",
            self.owner, num_pages, size
        );

        self.page_table = Vec::with_capacity(num_pages);
        self.page_size = page_size;

        let mut summary = LoadSummary {
            num_pages,
            ..LoadSummary::default()
        };
        let mut page = vec![0u8; page_size];
        let code_offset = header.code.in_file_addr as usize;

        for vpn in 0..num_pages {
            page.fill(0);
            file.read_at(&mut page, code_offset + vpn * page_size);

            match ctx.frames.claim_free(self.owner, vpn) {
                Some(frame) => {
                    let start = frame * page_size;
                    ctx.machine.main_memory_mut()[start..start + page_size]
                        .copy_from_slice(&page);
                    self.page_table
                        .push(TranslationEntry::resident(vpn, frame, self.owner));
                    summary.resident += 1;
                }
                None => {
                    let slot = ctx
                        .swap
                        .claim()
                        .unwrap_or_else(|| panic!("backing store exhausted loading {}", image));
                    // Recorded before the write so release() returns the slot on failure
                    self.page_table
                        .push(TranslationEntry::swapped(vpn, slot, self.owner));
                    if let Err(err) = ctx.backing_store.write_block(slot as u64, &page) {
                        self.release(ctx.frames, ctx.swap);
                        return Err(err.into());
                    }
                    summary.swapped += 1;
                }
            }
        }

        if data_size > 0 {
            self.copy_init_data(&header, &mut *file, ctx);
        }

        info!(
            "{}: loaded {} ({} pages, {} resident, {} swapped)",
            self.owner, image, summary.num_pages, summary.resident, summary.swapped
        );
        Ok(summary)
    }

    /// Copies initialized data straight into physical memory
    ///
    /// The destination is the data segment's virtual address used as a
    /// physical one, which only lines up when the space owns the leading
    /// frames.
    fn copy_init_data(
        &self,
        header: &NoffHeader,
        file: &mut dyn OpenFile,
        ctx: &mut LoadContext<'_>,
    ) {
        let page_size = ctx.geometry.page_size;
        let addr = header.init_data.virtual_addr as usize;
        let size = header.init_data.size as usize;

        let first = addr / page_size;
        let last = (addr + size - 1) / page_size;
        let foreign = (first..=last)
            .filter(|&frame| {
                ctx.frames.get(frame).and_then(|info| info.owner) != Some(self.owner)
            })
            .count();
        if foreign > 0 {
            warn!(
                "{}: initialized data at {:#x}+{} lands in {} frames this space does not own",
                self.owner, addr, size, foreign
            );
        }

        let mut data = vec![0u8; size];
        file.read_at(&mut data, header.init_data.in_file_addr as usize);
        ctx.machine.main_memory_mut()[addr..addr + size].copy_from_slice(&data);
    }

    /// Loads `image`, sets up user registers, and starts it
    ///
    /// Under a real machine this only returns if loading fails. The
    /// simulated machine returns right after recording the run.
    pub fn execute(
        &mut self,
        image: &str,
        ctx: &mut LoadContext<'_>,
    ) -> Result<LoadSummary, AddrSpaceError> {
        let summary = self.load(image, ctx)?;

        if let Err(err) = self.init_registers(ctx.machine) {
            self.release(ctx.frames, ctx.swap);
            return Err(err);
        }
        self.restore_state(ctx.machine);
        self.loaded = true;

        ctx.machine.run();
        Ok(summary)
    }

    /// Zeroes the register file and points it at the program entry
    pub fn init_registers(&self, machine: &mut dyn MachineHal) -> Result<(), AddrSpaceError> {
        let stack_top = stack_top(self.num_pages() * self.page_size)?;

        for index in 0..NUM_TOTAL_REGS {
            machine.write_register(index, 0);
        }

        machine.write_register(Register::Pc.index(), 0);
        machine.write_register(Register::NextPc.index(), 4);

        machine.write_register(Register::Stack.index(), stack_top);
        debug!("{}: initializing stack pointer: {}", self.owner, stack_top);
        Ok(())
    }

    /// Copies the machine's installed table back into this space
    ///
    /// Does nothing until the space has been started.
    pub fn save_state(&mut self, machine: &dyn MachineHal) {
        if !self.loaded {
            return;
        }
        if let Some(table) = machine.installed_page_table() {
            self.page_table = table.to_vec();
        }
    }

    /// Installs this space's table on the machine
    pub fn restore_state(&self, machine: &mut dyn MachineHal) {
        machine.install_page_table(self.page_table.clone());
    }

    /// Hands every frame and slot back; returns `(frames, slots)` freed
    pub fn release(&mut self, frames: &mut FrameTable, swap: &mut SwapMap) -> (usize, usize) {
        let freed_frames = frames.release_owner(self.owner);
        let freed_slots = self
            .page_table
            .iter()
            .filter_map(|entry| entry.slot())
            .filter(|&slot| swap.release(slot))
            .count();

        self.page_table.clear();
        self.loaded = false;
        (freed_frames, freed_slots)
    }

    /// Maps a virtual address to a physical one, if its page is resident
    pub fn translate(&self, vaddr: usize) -> Option<usize> {
        if self.page_size == 0 {
            return None;
        }
        let entry = self.page_table.get(vaddr / self.page_size)?;
        entry
            .frame()
            .map(|frame| frame * self.page_size + vaddr % self.page_size)
    }
}
