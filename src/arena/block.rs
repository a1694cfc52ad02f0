//! One fixed-size byte buffer and its free segments.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::config::{ArenaConfig, ConfigError};
use crate::segment::{Segment, SegmentManager};

/// A zero-initialized buffer allocated once and released on drop.
///
/// Offsets handed to [`Block::pointer_at`] are relative to [`Block::base`];
/// the free segments in [`Block::manager`] use the same offsets.
pub(crate) struct Block {
    base: NonNull<u8>,
    layout: Layout,
    usable: usize,
    pub(crate) manager: SegmentManager,
}

// SAFETY: the buffer is exclusively owned by the block. The raw pointer is
// only dereferenced by callers that hold the arena lock or own a registered
// allocation inside it.
unsafe impl Send for Block {}

impl Block {
    /// Allocate one block for `config`, entirely free.
    ///
    /// # Errors
    ///
    /// [`ConfigError::BlockTooLarge`] if the block size cannot form a layout.
    pub(crate) fn new(config: &ArenaConfig) -> Result<Self, ConfigError> {
        let layout: Layout = Layout::from_size_align(config.block_size, config.granularity)
            .map_err(|_| ConfigError::BlockTooLarge {
                block_size: config.block_size,
            })?;

        // SAFETY: validated configs have a non-zero block size.
        let raw: *mut u8 = unsafe { alloc::alloc_zeroed(layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };

        let usable: usize = config.usable_block_size();
        let mut manager = SegmentManager::new();
        manager.add_segment(Segment::new(0, usable));

        Ok(Self {
            base,
            layout,
            usable,
            manager,
        })
    }

    /// Address of the first byte.
    #[must_use]
    #[inline(always)]
    pub(crate) const fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Bytes that segments may cover.
    #[must_use]
    #[inline(always)]
    pub(crate) const fn usable(&self) -> usize {
        self.usable
    }

    /// Pointer `offset` bytes into the block.
    ///
    /// `offset` must not exceed [`Block::usable`].
    #[must_use]
    #[inline(always)]
    pub(crate) fn pointer_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.usable, "offset {offset} past block end");

        // SAFETY: offset is within (or one past) the allocation.
        unsafe { self.base.add(offset) }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: base came from alloc_zeroed with this exact layout.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("base", &self.base)
            .field("usable", &self.usable)
            .field("free_segments", &self.manager.len())
            .finish()
    }
}
