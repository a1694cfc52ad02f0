//! Filepath: src/arena.rs
//!
//! Fixed-arena best-fit allocator.
//!
//! An [`Arena`] owns a fixed set of equally sized blocks, allocated and
//! zeroed once at creation, and a registry of every pointer it has handed
//! out. Free space in each block is tracked by a
//! [`SegmentManager`](crate::segment::SegmentManager).
//!
//! # Allocation
//!
//! Blocks are scanned in order and the first block that has a segment large
//! enough serves the request with its best-fit segment (smallest sufficient
//! length, lowest address on ties). Requests never span blocks.
//!
//! # Deallocation
//!
//! Freeing can release a whole allocation or only its first `n` bytes. A
//! partial free hands back the pointer to the remaining tail, which then
//! owns the rest. Freed space is merged with free neighbors that touch it.
//!
//! # Concurrency
//!
//! All state sits behind one `parking_lot::Mutex`; every call holds it for
//! its full duration, so calls on one arena are totally ordered. [`Arena`] is
//! a cheap handle (`Arc` inside) and every clone and every
//! [`ArenaAllocator`] view shares the same blocks and registry.

use std::fmt as StdFmt;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{ArenaConfig, ConfigError};
use crate::tree::InvariantViolation;

mod block;
mod handle;
mod registry;
mod state;

#[cfg(all(test, loom))]
mod loom_tests;

pub use handle::{ArenaAllocator, ArenaBox};
pub use state::{ArenaState, ArenaStats, BlockStats};

// ============================================================================
//  AllocError
// ============================================================================

/// Errors from allocating or freeing arena memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No single block has a free segment large enough.
    ArenaExhausted {
        /// Requested bytes.
        requested: usize,
    },

    /// The pointer is not a live allocation (never allocated, already
    /// freed, or pointing inside an allocation).
    InvalidFree {
        /// Address passed in.
        address: usize,
    },

    /// More bytes were freed than the pointer owns.
    OverFree {
        /// Address passed in.
        address: usize,
        /// Bytes the caller tried to free.
        requested: usize,
        /// Bytes the pointer owns.
        available: usize,
    },

    /// A request for zero bytes.
    ZeroSized,

    /// Element count times element size does not fit in `usize`.
    CapacityOverflow,

    /// The element type needs stronger alignment than the arena provides.
    UnsupportedAlignment {
        /// Alignment of the element type.
        align: usize,
        /// The arena's granularity.
        granularity: usize,
    },
}

impl StdFmt::Display for AllocError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::ArenaExhausted { requested } => {
                write!(f, "no block can hold {requested} contiguous bytes")
            }

            Self::InvalidFree { address } => {
                write!(f, "{address:#x} is not a live arena allocation")
            }

            Self::OverFree {
                address,
                requested,
                available,
            } => write!(
                f,
                "cannot free {requested} bytes at {address:#x}, it owns {available}"
            ),

            Self::ZeroSized => write!(f, "zero-sized allocation request"),

            Self::CapacityOverflow => write!(f, "allocation size overflows usize"),

            Self::UnsupportedAlignment { align, granularity } => write!(
                f,
                "alignment {align} exceeds arena granularity {granularity}"
            ),
        }
    }
}

impl std::error::Error for AllocError {}

// ============================================================================
//  Arena
// ============================================================================

/// Shared handle to a fixed set of blocks.
///
/// # Example
///
/// ```rust
/// use avl_arena::{Arena, ArenaConfig};
///
/// let arena = Arena::new(ArenaConfig::new(1, 1_000_000)).unwrap();
/// let bytes = arena.allocator::<u8>().unwrap();
///
/// let a = bytes.allocate(100).unwrap();
/// let b = bytes.allocate(200).unwrap();
/// assert_eq!(arena.stats().live_allocations, 2);
///
/// bytes.deallocate(a, 0).unwrap();
/// bytes.deallocate(b, 0).unwrap();
/// assert_eq!(bytes.max_size(), 1_000_000);
/// ```
#[derive(Clone)]
pub struct Arena {
    config: ArenaConfig,
    state: Arc<Mutex<ArenaState>>,
}

impl Arena {
    /// Allocate all blocks described by `config`.
    ///
    /// # Errors
    ///
    /// The validation error of `config`.
    pub fn new(config: ArenaConfig) -> Result<Self, ConfigError> {
        let state: ArenaState = ArenaState::new(config)?;
        Ok(Self {
            config,
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Arena configured from the environment (see [`ArenaConfig::from_env`]).
    ///
    /// # Errors
    ///
    /// Same as [`ArenaConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(ArenaConfig::from_env()?)
    }

    /// The arena's configuration.
    #[must_use]
    #[inline(always)]
    pub const fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// A typed view of this arena.
    ///
    /// # Errors
    ///
    /// [`AllocError::UnsupportedAlignment`] if `T` needs more alignment than
    /// the granularity.
    pub fn allocator<T>(&self) -> Result<ArenaAllocator<T>, AllocError> {
        ArenaAllocator::new(self)
    }

    /// Reserve `bytes` bytes. See [`ArenaState::allocate`].
    ///
    /// # Errors
    ///
    /// Same as [`ArenaState::allocate`].
    pub fn allocate_bytes(&self, bytes: usize) -> Result<NonNull<u8>, AllocError> {
        self.state.lock().allocate(bytes)
    }

    /// Release the first `bytes` bytes at `ptr` (all of them if 0). See
    /// [`ArenaState::deallocate`].
    ///
    /// # Errors
    ///
    /// Same as [`ArenaState::deallocate`].
    pub fn deallocate_bytes(
        &self,
        ptr: NonNull<u8>,
        bytes: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        self.state.lock().deallocate(ptr, bytes)
    }

    /// Largest contiguous free range of any block, in bytes.
    #[must_use]
    pub fn max_free_bytes(&self) -> usize {
        self.state.lock().max_free_bytes()
    }

    /// Snapshot of live allocations and free space.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        self.state.lock().stats()
    }

    /// Check every block's free-space bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        self.state.lock().validate()
    }

    /// Whether both handles refer to the same arena.
    #[must_use]
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl StdFmt::Debug for Arena {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("Arena")
            .field("config", &self.config)
            .field("handles", &Arc::strong_count(&self.state))
            .finish_non_exhaustive()
    }
}
