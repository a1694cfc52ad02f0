//! # `avl-arena`
//!
//! A fixed-arena, best-fit memory allocator built on a duplicate-counting
//! AVL multiset.
//!
//! The crate has three layers, each usable on its own:
//!
//! - [`AvlTree`]: an ordered multiset. Each distinct key is stored once with
//!   its multiplicity; nearest-key searches run in O(log n).
//! - [`SegmentManager`]: the free ranges of one block, kept in two trees at
//!   once (by address and by length) so best fit and neighbor lookup are
//!   both logarithmic.
//! - [`Arena`] / [`ArenaAllocator`]: a fixed set of blocks shared by typed
//!   allocator views, with partial frees and coalescing.
//!
//! ## Example
//!
//! ```rust
//! use avl_arena::{Arena, ArenaConfig};
//!
//! let arena = Arena::new(ArenaConfig::new(1, 1_000_000)).unwrap();
//! let alloc = arena.allocator::<u8>().unwrap();
//!
//! let a1 = alloc.allocate(100).unwrap();
//! let a2 = alloc.allocate(200).unwrap();
//! let a3 = alloc.allocate(200).unwrap();
//! alloc.deallocate(a2, 200).unwrap();
//! let a4 = alloc.allocate(500).unwrap();
//! alloc.deallocate(a3, 200).unwrap();
//! let a5 = alloc.allocate(400).unwrap();
//!
//! for (ptr, n) in [(a1, 100), (a4, 500), (a5, 400)] {
//!     alloc.deallocate(ptr, n).unwrap();
//! }
//! assert_eq!(alloc.max_size(), 1_000_000);
//! ```
//!
//! ## Thread Safety
//!
//! [`Arena`] and [`ArenaAllocator<T>`] are `Send + Sync`. One mutex guards
//! each arena; every call holds it for its whole duration.
//!
//! ## Logging
//!
//! Build with `--features tracing` to route the crate's internal events to
//! the `tracing` crate, and call [`init_tracing`] (or install your own
//! subscriber) to see them.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Accessors are tiny and on the allocation path.
#![allow(clippy::inline_always)]

mod tracing_helpers;

pub mod arena;
pub mod config;
pub mod key;
pub mod segment;
pub mod tree;

// Re-export main types for convenience
pub use arena::{
    AllocError, Arena, ArenaAllocator, ArenaBox, ArenaState, ArenaStats, BlockStats,
};
pub use config::{ArenaConfig, ConfigError};
pub use key::{KeyOrder, Natural, TreeKey};
pub use segment::{ByHead, BySize, Segment, SegmentManager};
pub use tracing_helpers::init_tracing;
pub use tree::{AvlTree, InvariantViolation};
