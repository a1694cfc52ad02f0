//! Filepath: src/segment.rs
//!
//! Free-space segments and their two orderings.
//!
//! A [`Segment`] is a `(head, size)` byte range inside one block. The same
//! value is kept in two [`AvlTree`](crate::tree::AvlTree)s: ordered by
//! address ([`ByHead`]) for coalescing and ordered by length ([`BySize`]) for
//! best-fit search. Each ordering breaks ties on the other field, so distinct
//! segments never collapse into one multiset entry even when they share a
//! head or a length.

use std::cmp::Ordering;
use std::fmt as StdFmt;

use crate::key::KeyOrder;

mod manager;

pub use manager::SegmentManager;

/// A contiguous byte range `[head, head + size)` within one block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Segment {
    /// Offset of the first byte.
    pub head: usize,
    /// Length in bytes.
    pub size: usize,
}

impl Segment {
    /// Create a segment.
    #[must_use]
    #[inline(always)]
    pub const fn new(head: usize, size: usize) -> Self {
        Self { head, size }
    }

    /// One past the last byte.
    #[must_use]
    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.head + self.size
    }

    /// Whether `self` ends exactly where `next` starts.
    #[must_use]
    #[inline(always)]
    pub const fn touches(&self, next: &Self) -> bool {
        self.end() == next.head
    }

    /// Combine with the segment that starts right after this one.
    #[must_use]
    #[inline(always)]
    pub const fn merge(&self, next: &Self) -> Self {
        Self::new(self.head, self.size + next.size)
    }
}

impl StdFmt::Debug for Segment {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        write!(f, "[{:#x}..{:#x})", self.head, self.end())
    }
}

// ============================================================================
//  Orderings
// ============================================================================

/// Orders segments by head offset, then length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ByHead;

/// Orders segments by length, then head offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BySize;

// Distances measure the primary field only. Measuring the tie-breaking field
// too would let a key further away in order come out nearer.

impl KeyOrder<Segment> for ByHead {
    type Distance = usize;

    #[inline(always)]
    fn compare(a: &Segment, b: &Segment) -> Ordering {
        a.head.cmp(&b.head).then(a.size.cmp(&b.size))
    }

    #[inline(always)]
    fn distance(a: &Segment, b: &Segment) -> Self::Distance {
        a.head.abs_diff(b.head)
    }
}

impl KeyOrder<Segment> for BySize {
    type Distance = usize;

    #[inline(always)]
    fn compare(a: &Segment, b: &Segment) -> Ordering {
        a.size.cmp(&b.size).then(a.head.cmp(&b.head))
    }

    #[inline(always)]
    fn distance(a: &Segment, b: &Segment) -> Self::Distance {
        a.size.abs_diff(b.size)
    }
}
