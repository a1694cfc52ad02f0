//! Filepath: src/key.rs
//!
//! Key capabilities for [`AvlTree`](crate::tree::AvlTree).
//!
//! The tree never compares keys directly. Every comparison and every distance
//! computation goes through a [`KeyOrder`], a zero-sized type chosen as the
//! tree's second type parameter. This lets one value type live in several
//! trees under different orderings (the segment manager keeps the same
//! [`Segment`](crate::segment::Segment) ordered by address in one tree and by
//! length in another).
//!
//! Plain keys implement [`TreeKey`] and use the [`Natural`] ordering, which is
//! the default.

use std::cmp::Ordering;
use std::fmt::Debug;

// ============================================================================
//  TreeKey
// ============================================================================

/// A key with a natural total order, an absolute difference and sentinel bounds.
///
/// Implemented for every primitive integer type. The difference is returned in
/// a separate [`TreeKey::Distance`] type so that `i32::MIN.abs_diff(i32::MAX)`
/// does not overflow.
///
/// # Example
///
/// ```rust
/// use avl_arena::key::TreeKey;
///
/// assert_eq!(TreeKey::abs_diff(&-5_i32, &7), 12_u32);
/// assert_eq!(<u8 as TreeKey>::MAX, u8::MAX);
/// ```
pub trait TreeKey: Clone + Debug {
    /// Result type of [`TreeKey::abs_diff`].
    type Distance: Ord + Copy + Debug;

    /// Smallest representable key.
    const MIN: Self;

    /// Largest representable key.
    const MAX: Self;

    /// Total order between two keys.
    fn compare(&self, other: &Self) -> Ordering;

    /// Absolute difference `|self - other|`.
    fn abs_diff(&self, other: &Self) -> Self::Distance;
}

macro_rules! impl_tree_key {
    ($($key:ty => $distance:ty),* $(,)?) => {
        $(
            impl TreeKey for $key {
                type Distance = $distance;

                const MIN: Self = <$key>::MIN;
                const MAX: Self = <$key>::MAX;

                #[inline(always)]
                fn compare(&self, other: &Self) -> Ordering {
                    Ord::cmp(self, other)
                }

                #[inline(always)]
                fn abs_diff(&self, other: &Self) -> Self::Distance {
                    <$key>::abs_diff(*self, *other)
                }
            }
        )*
    };
}

impl_tree_key! {
    i8 => u8,
    i16 => u16,
    i32 => u32,
    i64 => u64,
    i128 => u128,
    isize => usize,
    u8 => u8,
    u16 => u16,
    u32 => u32,
    u64 => u64,
    u128 => u128,
    usize => usize,
}

// ============================================================================
//  KeyOrder
// ============================================================================

/// An ordering strategy for keys of type `K`.
///
/// Implementors are usually zero-sized marker types. The ordering must be a
/// total order and `distance` must grow with order distance on both sides:
/// for `a <= b <= c` and for `c <= b <= a`, `distance(a, b) <= distance(a, c)`.
/// Keys that are equally far from a probe may still compare unequal.
pub trait KeyOrder<K> {
    /// Result type of [`KeyOrder::distance`].
    type Distance: Ord + Copy + Debug;

    /// Compare two keys.
    fn compare(a: &K, b: &K) -> Ordering;

    /// How far apart two keys are. Used by nearest-key search.
    fn distance(a: &K, b: &K) -> Self::Distance;
}

/// The natural ordering of a [`TreeKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Natural;

impl<K: TreeKey> KeyOrder<K> for Natural {
    type Distance = K::Distance;

    #[inline(always)]
    fn compare(a: &K, b: &K) -> Ordering {
        a.compare(b)
    }

    #[inline(always)]
    fn distance(a: &K, b: &K) -> Self::Distance {
        a.abs_diff(b)
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_diff_does_not_overflow() {
        assert_eq!(TreeKey::abs_diff(&i32::MIN, &i32::MAX), u32::MAX);
        assert_eq!(TreeKey::abs_diff(&i64::MAX, &i64::MIN), u64::MAX);
        assert_eq!(TreeKey::abs_diff(&0_u16, &u16::MAX), u16::MAX);
    }

    #[test]
    fn test_abs_diff_is_symmetric() {
        for (a, b) in [(-100_i32, 90), (5, 5), (i32::MIN, 0)] {
            assert_eq!(TreeKey::abs_diff(&a, &b), TreeKey::abs_diff(&b, &a));
        }
    }

    #[test]
    fn test_sentinels_bound_every_key() {
        for key in [-3_i64, 0, 17, i64::MAX] {
            assert_ne!(key.compare(&<i64 as TreeKey>::MIN), Ordering::Less);
            assert_ne!(key.compare(&<i64 as TreeKey>::MAX), Ordering::Greater);
        }
    }

    #[test]
    fn test_natural_order_matches_ord() {
        assert_eq!(<Natural as KeyOrder<u8>>::compare(&1, &2), Ordering::Less);
        assert_eq!(<Natural as KeyOrder<u8>>::compare(&2, &2), Ordering::Equal);
        assert_eq!(<Natural as KeyOrder<i8>>::distance(&-128, &127), 255);
    }
}
