//! # Buffer State Module
//!
//! Arena allocation of geometry memory.
//!
//! ## Architecture
//!
//! The [`ArenaBufferManager`] owns a list of large backing blocks obtained from
//! the [`GraphicsDevice`]. Each block belongs to one (usage, visibility) class
//! and hands out sub-regions by bumping a cursor. A request that does not fit
//! any block of its class allocates a new block of the default block size, or
//! of the request size if that is larger.
//!
//! Regions never move and are never reclaimed individually: a chunk's geometry
//! region keeps its base offset for the manager's lifetime, which is what
//! keeps face slot indices valid across edits. Dropping the manager frees every
//! block it owns.
//!
//! ## Performance Considerations
//!
//! * One device allocation serves many chunks
//! * Allocation is a linear scan over blocks, and the block count stays small
//! * Per-block analytics track allocated and used memory

use std::cell::{Ref, RefMut};
use std::fmt;

use log::{debug, info};

use crate::engine_state::device::{
    BufferHandle, BufferUsage, DeviceAllocation, DeviceContext, DeviceError, GraphicsDevice,
    MemoryVisibility,
};

/// Default size of a backing block.
pub const DEFAULT_BLOCK_SIZE: u64 = 1 << 24;

/// Analytics data for a backing block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferAnalytics {
    /// Total memory allocated for the block in bytes
    pub allocated_memory: u64,
    /// Bytes handed out as regions, alignment padding included
    pub used_memory: u64,
    /// Number of regions carved out of the block
    pub regions: u64,
}

/// A sub-range of a backing block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    /// Backing buffer
    pub buffer: BufferHandle,
    /// Byte offset of the region inside the buffer
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
    /// Whether [`ArenaBufferManager::view`] can reach the region
    pub host_visible: bool,
}

/// Errors raised while carving regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// A zero sized region was requested
    ZeroSize,
    /// The device could not provide a backing block
    Exhausted {
        /// Bytes requested
        requested: u64,
        /// Device failure
        source: DeviceError,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaError::ZeroSize => write!(f, "zero sized region requested"),
            ArenaError::Exhausted { requested, source } => {
                write!(f, "no backing block for a {requested} byte region: {source}")
            }
        }
    }
}

impl std::error::Error for ArenaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArenaError::ZeroSize => None,
            ArenaError::Exhausted { source, .. } => Some(source),
        }
    }
}

struct BackingBlock {
    allocation: DeviceAllocation,
    usage: BufferUsage,
    visibility: MemoryVisibility,
    analytics: BufferAnalytics,
}

impl BackingBlock {
    fn aligned_cursor(&self) -> u64 {
        round_to(self.analytics.used_memory, self.allocation.alignment)
    }

    fn fits(&self, size: u64) -> bool {
        self.aligned_cursor()
            .checked_add(size)
            .is_some_and(|end| end <= self.allocation.size)
    }
}

/// Rounds `value` up to a multiple of `alignment`.
pub fn round_to(value: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    value.div_ceil(alignment) * alignment
}

/// Bump allocator over device blocks, split by usage and visibility.
pub struct ArenaBufferManager<D: GraphicsDevice> {
    device: DeviceContext<D>,
    blocks: Vec<BackingBlock>,
    default_block_size: u64,
}

impl<D: GraphicsDevice> ArenaBufferManager<D> {
    /// Creates an empty manager.
    ///
    /// # Arguments
    ///
    /// * `device` - The device blocks are allocated from
    /// * `default_block_size` - Size of new backing blocks
    pub fn new(device: DeviceContext<D>, default_block_size: u64) -> Self {
        Self {
            device,
            blocks: Vec::new(),
            default_block_size: default_block_size.max(1),
        }
    }

    /// Carves a region.
    ///
    /// Scans the blocks of the requested class for one whose aligned cursor
    /// leaves room for `size` bytes, otherwise allocates a new block of
    /// `block_size` (the manager default when `None`) or `size`, whichever is
    /// larger.
    ///
    /// # Errors
    ///
    /// [`ArenaError::Exhausted`] when the device cannot provide a new block.
    /// There is no fallback.
    pub fn create(
        &mut self,
        usage: BufferUsage,
        visibility: MemoryVisibility,
        size: u64,
        block_size: Option<u64>,
    ) -> Result<Region, ArenaError> {
        if size == 0 {
            return Err(ArenaError::ZeroSize);
        }

        let position = self
            .blocks
            .iter()
            .position(|block| block.usage == usage && block.visibility == visibility && block.fits(size));

        let index = match position {
            Some(index) => index,
            None => {
                let block_size = block_size.unwrap_or(self.default_block_size).max(size);
                let allocation = self
                    .device
                    .get_mut()
                    .allocate(usage, visibility, block_size)
                    .map_err(|source| ArenaError::Exhausted {
                        requested: size,
                        source,
                    })?;
                debug!(
                    "new {:?}/{:?} backing block of {} bytes",
                    usage, visibility, allocation.size
                );
                self.blocks.push(BackingBlock {
                    allocation,
                    usage,
                    visibility,
                    analytics: BufferAnalytics {
                        allocated_memory: allocation.size,
                        ..BufferAnalytics::default()
                    },
                });
                self.blocks.len() - 1
            }
        };

        let block = &mut self.blocks[index];
        let offset = block.aligned_cursor();
        block.analytics.used_memory = offset + size;
        block.analytics.regions += 1;

        Ok(Region {
            buffer: block.allocation.handle,
            offset,
            size,
            host_visible: visibility == MemoryVisibility::HostVisible,
        })
    }

    /// Host view of a region. `None` for device-local regions.
    ///
    /// The view borrows the device; drop it before touching the device again.
    pub fn view(&self, region: &Region) -> Option<RefMut<'_, [u8]>> {
        if !region.host_visible {
            return None;
        }
        RefMut::filter_map(self.device.get_mut(), |device| {
            device.map(region.buffer, region.offset, region.size)
        })
        .ok()
    }

    /// Read-only host view of a region. `None` for device-local regions.
    ///
    /// Reading does not schedule the region for upload.
    pub fn read(&self, region: &Region) -> Option<Ref<'_, [u8]>> {
        if !region.host_visible {
            return None;
        }
        Ref::filter_map(self.device.get(), |device| {
            device.read_mapped(region.buffer, region.offset, region.size)
        })
        .ok()
    }

    /// The device this manager allocates from.
    pub fn device(&self) -> &DeviceContext<D> {
        &self.device
    }

    /// Number of backing blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes allocated from the device.
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| block.analytics.allocated_memory)
            .sum()
    }

    /// Bytes handed out as regions.
    pub fn get_total_used_memory(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| block.analytics.used_memory)
            .sum()
    }

    /// Per-block analytics in allocation order.
    pub fn analytics(&self) -> Vec<BufferAnalytics> {
        self.blocks.iter().map(|block| block.analytics).collect()
    }

    /// Logs memory usage.
    pub fn log_usage(&self) {
        info!(
            "arena: {} blocks, {} of {} bytes used",
            self.blocks.len(),
            self.get_total_used_memory(),
            self.get_total_allocated_memory()
        );
    }
}

impl<D: GraphicsDevice> Drop for ArenaBufferManager<D> {
    fn drop(&mut self) {
        if let Some(mut device) = self.device.try_get_mut() {
            for block in self.blocks.drain(..) {
                device.free(block.allocation.handle);
            }
        }
    }
}
