//! Filepath: src/arena/state.rs
//!
//! The lock-protected core of an arena.
//!
//! [`ArenaState`] holds the blocks and the pointer registry and implements
//! best-fit allocation, partial frees and coalescing with plain `&mut self`
//! methods. [`Arena`](super::Arena) wraps it in a `parking_lot::Mutex`; the
//! model-checking tests wrap it in `shuttle` and `loom` mutexes instead.
//!
//! # Granules
//!
//! Every reserved range starts and ends on a multiple of the configured
//! granularity. A request for `bytes` reserves `bytes` rounded up. A partial
//! free of `b` bytes returns only the whole granules it uncovers; the at most
//! `granularity - 1` bytes of slack stay reserved with the tail until the
//! tail itself is freed.

use std::ptr::NonNull;

use super::AllocError;
use super::block::Block;
use super::registry::{PointerRegistry, Registration};
use crate::config::{ArenaConfig, ConfigError};
use crate::segment::Segment;
use crate::tracing_helpers::{debug_log, warn_log};
use crate::tree::InvariantViolation;

// ============================================================================
//  ArenaStats
// ============================================================================

/// Free-space summary of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockStats {
    /// Total free bytes.
    pub free_bytes: usize,
    /// Number of free segments.
    pub free_segments: usize,
    /// Length of the largest free segment.
    pub largest_free: usize,
}

/// Point-in-time snapshot of an arena.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Registered pointers.
    pub live_allocations: usize,
    /// Bytes owned by registered pointers (excluding granule slack).
    pub live_bytes: usize,
    /// Per-block free space, in block order.
    pub blocks: Vec<BlockStats>,
}

impl ArenaStats {
    /// Free bytes across all blocks.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.blocks.iter().map(|b: &BlockStats| b.free_bytes).sum()
    }

    /// Free segments across all blocks.
    #[must_use]
    pub fn free_segments(&self) -> usize {
        self.blocks.iter().map(|b: &BlockStats| b.free_segments).sum()
    }

    /// Largest single allocation (in bytes) that could currently succeed.
    #[must_use]
    pub fn largest_free(&self) -> usize {
        self.blocks
            .iter()
            .map(|b: &BlockStats| b.largest_free)
            .max()
            .unwrap_or(0)
    }
}

// ============================================================================
//  ArenaState
// ============================================================================

/// Blocks plus pointer registry. Not synchronized.
#[derive(Debug)]
pub struct ArenaState {
    config: ArenaConfig,
    blocks: Vec<Block>,
    registry: PointerRegistry,
}

impl ArenaState {
    /// Allocate every block of `config`.
    ///
    /// # Errors
    ///
    /// The validation error of `config`.
    pub fn new(config: ArenaConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let blocks: Vec<Block> = (0..config.block_count)
            .map(|_| Block::new(&config))
            .collect::<Result<_, _>>()?;

        debug_log!(
            blocks = config.block_count,
            block_size = config.block_size,
            granularity = config.granularity,
            "arena created"
        );

        Ok(Self {
            config,
            blocks,
            registry: PointerRegistry::new(),
        })
    }

    /// The config this state was built from.
    #[must_use]
    #[inline(always)]
    pub const fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Reserve `bytes` from the first block that has a fitting segment.
    ///
    /// The returned pointer is aligned to the granularity.
    ///
    /// # Errors
    ///
    /// - [`AllocError::ZeroSized`] if `bytes` is 0
    /// - [`AllocError::CapacityOverflow`] if rounding `bytes` up overflows
    /// - [`AllocError::ArenaExhausted`] if no block has a large enough segment
    pub fn allocate(&mut self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        if bytes == 0 {
            return Err(AllocError::ZeroSized);
        }
        let reserved: usize = bytes
            .checked_next_multiple_of(self.config.granularity)
            .ok_or(AllocError::CapacityOverflow)?;

        for (index, block) in self.blocks.iter_mut().enumerate() {
            let Some(fit) = block.manager.best_fit_segment(reserved) else {
                continue;
            };

            block.manager.delete_segment(&fit);
            if fit.size > reserved {
                block
                    .manager
                    .add_segment(Segment::new(fit.head + reserved, fit.size - reserved));
            }

            let ptr: NonNull<u8> = block.pointer_at(fit.head);
            self.registry.register(
                ptr.addr().get(),
                Registration {
                    block: index,
                    segment: Segment::new(fit.head, reserved),
                    offset: 0,
                    len: bytes,
                },
            );

            debug_log!(block = index, head = fit.head, bytes, reserved, "allocate");
            return Ok(ptr);
        }

        warn_log!(bytes, reserved, "arena exhausted");
        Err(AllocError::ArenaExhausted { requested: bytes })
    }

    /// Release the first `bytes` bytes owned by `ptr`, or all of them when
    /// `bytes` is 0 or equals what is still owned.
    ///
    /// Returns `None` once nothing is left, otherwise the pointer to the
    /// remaining tail (`ptr + bytes`), which is what must be passed to the
    /// next call.
    ///
    /// # Errors
    ///
    /// - [`AllocError::InvalidFree`] if `ptr` is not a live pointer
    /// - [`AllocError::OverFree`] if `bytes` exceeds what `ptr` owns
    ///
    /// The state is unchanged on error.
    pub fn deallocate(
        &mut self,
        ptr: NonNull<u8>,
        bytes: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let address: usize = ptr.addr().get();

        let Some(registration) = self.registry.get(address) else {
            warn_log!(address, bytes, "free of unregistered pointer");
            return Err(AllocError::InvalidFree { address });
        };
        if bytes > registration.len {
            warn_log!(address, bytes, available = registration.len, "over-free");
            return Err(AllocError::OverFree {
                address,
                requested: bytes,
                available: registration.len,
            });
        }

        self.registry.remove(address);
        let block: &mut Block = &mut self.blocks[registration.block];

        if bytes == 0 || bytes == registration.len {
            debug_log!(address, freed = registration.len, "deallocate");
            Self::release(block, registration.segment, true);
            return Ok(None);
        }

        let consumed: usize = registration.offset + bytes;
        let freed: usize = consumed - consumed % self.config.granularity;
        let tail: NonNull<u8> = block.pointer_at(registration.segment.head + consumed);

        self.registry.register(
            tail.addr().get(),
            Registration {
                block: registration.block,
                segment: Segment::new(
                    registration.segment.head + freed,
                    registration.segment.size - freed,
                ),
                offset: consumed - freed,
                len: registration.len - bytes,
            },
        );

        debug_log!(address, bytes, granules = freed, "partial free");
        if freed > 0 {
            Self::release(block, Segment::new(registration.segment.head, freed), false);
        }
        Ok(Some(tail))
    }

    /// Return `segment` to `block`, merging touching free neighbors.
    ///
    /// The right neighbor is only considered when `merge_right` is set; after
    /// a partial free the live tail sits there.
    fn release(block: &mut Block, segment: Segment, merge_right: bool) {
        let mut merged: Segment = segment;

        let left: Option<Segment> = block
            .manager
            .left_adjacent(&merged)
            .filter(|left: &Segment| left.touches(&merged));
        if let Some(left) = left {
            block.manager.delete_segment(&left);
            merged = left.merge(&merged);
        }

        let right: Option<Segment> = if merge_right {
            block
                .manager
                .right_adjacent(&merged)
                .filter(|right: &Segment| merged.touches(right))
        } else {
            None
        };
        if let Some(right) = right {
            block.manager.delete_segment(&right);
            merged = merged.merge(&right);
        }

        if merged != segment {
            debug_log!(?segment, ?merged, "coalesced");
        }
        block.manager.add_segment(merged);
    }

    /// Largest free segment of any block, in bytes.
    #[must_use]
    pub fn max_free_bytes(&self) -> usize {
        self.blocks
            .iter()
            .map(|block: &Block| block.manager.max_size_segment())
            .max()
            .unwrap_or(0)
    }

    /// Number of live pointers.
    #[must_use]
    #[inline(always)]
    pub fn live_allocations(&self) -> usize {
        self.registry.len()
    }

    /// Snapshot of the registry and every block's free space.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live_allocations: self.registry.len(),
            live_bytes: self.registry.live_bytes(),
            blocks: self
                .blocks
                .iter()
                .map(|block: &Block| BlockStats {
                    free_bytes: block.manager.free_bytes(),
                    free_segments: block.manager.len(),
                    largest_free: block.manager.max_size_segment(),
                })
                .collect(),
        }
    }

    /// Check every block's segment trees and that reserved plus free bytes
    /// cover each block exactly.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for (index, block) in self.blocks.iter().enumerate() {
            block.manager.validate()?;

            let past_end: Option<Segment> = block
                .manager
                .iter()
                .last()
                .filter(|last: &Segment| last.end() > block.usable());
            if let Some(last) = past_end {
                return Err(InvariantViolation::SegmentOverlap { head: last.head });
            }

            let accounted: usize = self.registry.reserved_in(index) + block.manager.free_bytes();
            if accounted != block.usable() {
                return Err(InvariantViolation::BlockAccounting {
                    block: index,
                    accounted,
                    usable: block.usable(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(block_count: usize, block_size: usize) -> ArenaState {
        ArenaState::new(ArenaConfig::new(block_count, block_size)).unwrap()
    }

    fn offset_of(state: &ArenaState, ptr: NonNull<u8>, block: usize) -> usize {
        ptr.addr().get() - state.blocks[block].base().addr().get()
    }

    #[test]
    fn test_allocate_rounds_to_granules() {
        let mut state = state(1, 1024);

        let a: NonNull<u8> = state.allocate(1).unwrap();
        let b: NonNull<u8> = state.allocate(17).unwrap();
        let c: NonNull<u8> = state.allocate(16).unwrap();

        assert_eq!(offset_of(&state, a, 0), 0);
        assert_eq!(offset_of(&state, b, 0), 16);
        assert_eq!(offset_of(&state, c, 0), 48);
        assert_eq!(state.max_free_bytes(), 1024 - 64);
        state.validate().unwrap();
    }

    #[test]
    fn test_best_fit_reuses_smallest_hole() {
        let mut state = state(1, 4096);

        let a = state.allocate(256).unwrap();
        let _b = state.allocate(16).unwrap();
        let c = state.allocate(64).unwrap();
        let _d = state.allocate(16).unwrap();

        state.deallocate(a, 0).unwrap();
        state.deallocate(c, 0).unwrap();

        // The 64-byte hole fits better than the 256-byte one.
        let e = state.allocate(48).unwrap();
        assert_eq!(e, c);
        state.validate().unwrap();
    }

    #[test]
    fn test_scenario_holes_and_coalescing() {
        let mut state = state(1, 1_000_000);

        let a1 = state.allocate(100).unwrap();
        let a2 = state.allocate(200).unwrap();
        let a3 = state.allocate(200).unwrap();

        assert_eq!(state.deallocate(a2, 0), Ok(None));
        let a4 = state.allocate(500).unwrap();
        assert_eq!(state.deallocate(a3, 0), Ok(None));
        let a5 = state.allocate(400).unwrap();

        // a2 and a3 merged into one hole that a5 then fit into.
        assert_eq!(a5, a2);

        for ptr in [a1, a4, a5] {
            assert_eq!(state.deallocate(ptr, 0), Ok(None));
            state.validate().unwrap();
        }
        assert_eq!(state.max_free_bytes(), 1_000_000);
        assert_eq!(state.stats().free_segments(), 1);
    }

    #[test]
    fn test_exhaustion_then_recovery() {
        let mut state = state(1, 1_000_000);

        let all = state.allocate(1_000_000).unwrap();
        assert_eq!(state.max_free_bytes(), 0);
        assert_eq!(
            state.allocate(16),
            Err(AllocError::ArenaExhausted { requested: 16 })
        );

        state.deallocate(all, 0).unwrap();
        assert!(state.allocate(16).is_ok());
    }

    #[test]
    fn test_spills_into_next_block() {
        let mut state = state(2, 256);

        let a = state.allocate(200).unwrap();
        let b = state.allocate(200).unwrap();

        assert_eq!(offset_of(&state, a, 0), 0);
        assert_eq!(offset_of(&state, b, 1), 0);
        assert_eq!(
            state.allocate(100),
            Err(AllocError::ArenaExhausted { requested: 100 })
        );
    }

    #[test]
    fn test_no_cross_block_merge() {
        let mut state = state(2, 256);
        assert_eq!(
            state.allocate(512),
            Err(AllocError::ArenaExhausted { requested: 512 })
        );
    }

    #[test]
    fn test_partial_free_returns_tail() {
        let mut state = state(1, 1024);
        let ptr = state.allocate(100).unwrap();

        let tail = state.deallocate(ptr, 40).unwrap().unwrap();
        assert_eq!(tail.addr().get(), ptr.addr().get() + 40);

        // 32 bytes came back, 8 bytes of slack stay with the tail.
        let stats = state.stats();
        assert_eq!(stats.live_bytes, 60);
        assert_eq!(stats.free_bytes(), 1024 - 112 + 32);
        state.validate().unwrap();

        assert_eq!(state.deallocate(tail, 0), Ok(None));
        assert_eq!(state.max_free_bytes(), 1024);
        state.validate().unwrap();
    }

    #[test]
    fn test_partial_free_within_one_granule() {
        let mut state = state(1, 1024);
        let ptr = state.allocate(100).unwrap();

        let tail = state.deallocate(ptr, 10).unwrap().unwrap();
        assert_eq!(state.stats().free_bytes(), 1024 - 112);

        let tail = state.deallocate(tail, 30).unwrap().unwrap();
        assert_eq!(state.stats().free_bytes(), 1024 - 112 + 32);
        assert_eq!(state.stats().live_bytes, 60);

        assert_eq!(state.deallocate(tail, 60), Ok(None));
        assert_eq!(state.max_free_bytes(), 1024);
        state.validate().unwrap();
    }

    #[test]
    fn test_partial_free_merges_left_only() {
        let mut state = state(1, 1024);
        let a = state.allocate(64).unwrap();
        let b = state.allocate(64).unwrap();

        state.deallocate(a, 0).unwrap();
        let tail = state.deallocate(b, 32).unwrap().unwrap();

        let segments: Vec<Segment> = state.blocks[0].manager.iter().collect();
        assert_eq!(segments, vec![Segment::new(0, 96), Segment::new(128, 896)]);

        state.deallocate(tail, 0).unwrap();
        assert_eq!(state.max_free_bytes(), 1024);
    }

    #[test]
    fn test_invalid_and_double_free() {
        let mut state = state(1, 1024);
        let ptr = state.allocate(64).unwrap();
        let inside = state.blocks[0].pointer_at(16);

        assert_eq!(
            state.deallocate(inside, 0),
            Err(AllocError::InvalidFree {
                address: inside.addr().get()
            })
        );

        state.deallocate(ptr, 0).unwrap();
        assert_eq!(
            state.deallocate(ptr, 0),
            Err(AllocError::InvalidFree {
                address: ptr.addr().get()
            })
        );
        assert_eq!(state.max_free_bytes(), 1024);
        state.validate().unwrap();
    }

    #[test]
    fn test_over_free_leaves_state_untouched() {
        let mut state = state(1, 1024);
        let ptr = state.allocate(64).unwrap();
        let before = state.stats();

        assert_eq!(
            state.deallocate(ptr, 65),
            Err(AllocError::OverFree {
                address: ptr.addr().get(),
                requested: 65,
                available: 64
            })
        );
        assert_eq!(state.stats(), before);
        assert_eq!(state.deallocate(ptr, 64), Ok(None));
    }

    #[test]
    fn test_zero_and_overflowing_requests() {
        let mut state = state(1, 1024);
        assert_eq!(state.allocate(0), Err(AllocError::ZeroSized));
        assert_eq!(
            state.allocate(usize::MAX),
            Err(AllocError::CapacityOverflow)
        );
        assert_eq!(state.live_allocations(), 0);
    }

    #[test]
    fn test_large_granularity_aligns_pointers() {
        let mut state =
            ArenaState::new(ArenaConfig::new(1, 8192).with_granularity(128)).unwrap();

        let a = state.allocate(1).unwrap();
        let b = state.allocate(129).unwrap();
        let c = state.allocate(3).unwrap();

        for ptr in [a, b, c] {
            assert_eq!(ptr.addr().get() % 128, 0);
        }
        assert_eq!(offset_of(&state, c, 0), 384);
    }
}
