//! `SegmentManager` - free segments of one block, in two synchronized trees.

use super::{ByHead, BySize, Segment};
use crate::tracing_helpers::error_log;
use crate::tree::{AvlTree, InvariantViolation};

/// Tracks the free segments of one block.
///
/// Every segment is stored in both an address-ordered and a size-ordered
/// tree. Best fit queries the size view; coalescing queries the address view.
/// Keeping both makes every operation O(log n) instead of scanning one view to
/// answer the other's questions.
#[derive(Debug, Clone, Default)]
pub struct SegmentManager {
    by_head: AvlTree<Segment, ByHead>,
    by_size: AvlTree<Segment, BySize>,
}

impl SegmentManager {
    /// Create a manager with no free space.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            by_head: AvlTree::new(),
            by_size: AvlTree::new(),
        }
    }

    /// Track `segment` as free.
    ///
    /// The caller guarantees it does not overlap a tracked segment.
    pub fn add_segment(&mut self, segment: Segment) {
        self.by_size.insert(segment);
        self.by_head.insert(segment);
    }

    /// Stop tracking `segment`.
    ///
    /// Returns `false` unless it was present in both trees. A segment present
    /// in only one of them is a bookkeeping bug and trips a debug assertion.
    pub fn delete_segment(&mut self, segment: &Segment) -> bool {
        let in_head: bool = self.by_head.pop(segment);
        let in_size: bool = self.by_size.pop(segment);

        if in_head != in_size {
            error_log!(?segment, in_head, in_size, "segment trees disagree");
            debug_assert_eq!(in_head, in_size, "segment trees disagree on {segment:?}");
        }
        in_head && in_size
    }

    /// Smallest free segment of at least `size` bytes, lowest head on ties.
    #[must_use]
    pub fn best_fit_segment(&self, size: usize) -> Option<Segment> {
        self.by_size
            .find_closest_greater_equal(&Segment::new(usize::MIN, size))
            .copied()
    }

    /// Nearest free segment below `segment` by address.
    #[must_use]
    pub fn left_adjacent(&self, segment: &Segment) -> Option<Segment> {
        self.by_head.find_closest_lesser(segment).copied()
    }

    /// Nearest free segment above `segment` by address.
    #[must_use]
    pub fn right_adjacent(&self, segment: &Segment) -> Option<Segment> {
        self.by_head.find_closest_greater(segment).copied()
    }

    /// Length of the largest free segment, 0 if there is none.
    #[must_use]
    pub fn max_size_segment(&self) -> usize {
        self.by_size.find_max().map_or(0, |segment: &Segment| segment.size)
    }

    /// Number of free segments.
    #[must_use]
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.by_head.len()
    }

    /// Whether there is no free space at all.
    #[must_use]
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.by_head.is_empty()
    }

    /// Total free bytes.
    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.iter().map(|segment: Segment| segment.size).sum()
    }

    /// Free segments in address order.
    pub fn iter(&self) -> impl Iterator<Item = Segment> + '_ {
        self.by_head.iter().map(|(segment, _)| *segment)
    }

    /// Check both trees and that they describe the same disjoint segments.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        self.by_head.validate()?;
        self.by_size.validate()?;

        let diverged = InvariantViolation::SegmentTreesDiverge {
            by_head: self.by_head.len(),
            by_size: self.by_size.len(),
        };
        if self.by_head.len() != self.by_size.len()
            || self.by_head.node_count() != self.by_head.len()
        {
            return Err(diverged);
        }

        let mut previous: Option<Segment> = None;
        for segment in self.iter() {
            if !self.by_size.contains(&segment) {
                return Err(diverged);
            }
            if previous.is_some_and(|prev: Segment| prev.end() > segment.head) {
                return Err(InvariantViolation::SegmentOverlap { head: segment.head });
            }
            previous = Some(segment);
        }
        Ok(())
    }
}
