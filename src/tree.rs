//! Filepath: src/tree.rs
//! `AvlTree` - a duplicate-counting AVL multiset.
//!
//! Each distinct key is stored once together with its multiplicity.
//! [`AvlTree::len`] counts multiplicities, so inserting a key that is already
//! present grows the length but not the node count or the height.
//!
//! The ordering is a type parameter (see [`KeyOrder`]). Plain integer keys use
//! [`Natural`]; the segment manager stores the same segment type under two
//! different orderings.

use std::fmt as StdFmt;
use std::marker::PhantomData;

use crate::key::{KeyOrder, Natural};

mod balance;
mod iter;
mod node;
mod search;

pub use iter::Iter;

use node::{NodeArena, NodeId};

// ============================================================================
//  InvariantViolation
// ============================================================================

/// A broken structural invariant found by a `validate()` call.
///
/// None of these can happen through the public API; seeing one means a bug
/// in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A node's subtree heights differ by more than one.
    Unbalanced {
        /// Left height minus right height.
        balance: i32,
    },

    /// A node's cached height disagrees with its children.
    HeightMismatch {
        /// Height stored in the node.
        stored: u8,
        /// Height computed from the children.
        actual: u8,
    },

    /// In-order traversal produced keys that are not strictly increasing.
    OutOfOrder {
        /// In-order position of the offending key.
        position: usize,
    },

    /// A linked node carries multiplicity zero.
    ZeroMultiplicity,

    /// The cached length disagrees with the sum of multiplicities.
    LengthMismatch {
        /// Cached length.
        recorded: usize,
        /// Sum of multiplicities.
        actual: usize,
    },

    /// The arena's live node count disagrees with the reachable nodes.
    NodeCountMismatch {
        /// Live slots in the node arena.
        recorded: usize,
        /// Nodes reachable from the root.
        actual: usize,
    },

    /// The address-ordered and size-ordered segment trees hold different sets.
    SegmentTreesDiverge {
        /// Segments in the address-ordered tree.
        by_head: usize,
        /// Segments in the size-ordered tree.
        by_size: usize,
    },

    /// Two tracked free segments overlap, or one runs past its block.
    SegmentOverlap {
        /// Head offset of the later segment.
        head: usize,
    },

    /// A block's reserved and free bytes do not add up to its usable size.
    BlockAccounting {
        /// Block index.
        block: usize,
        /// Reserved plus free bytes.
        accounted: usize,
        /// Usable bytes of the block.
        usable: usize,
    },
}

impl StdFmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::Unbalanced { balance } => write!(f, "node balance factor {balance}"),

            Self::HeightMismatch { stored, actual } => {
                write!(f, "cached height {stored}, actual height {actual}")
            }

            Self::OutOfOrder { position } => {
                write!(f, "key at in-order position {position} is out of order")
            }

            Self::ZeroMultiplicity => write!(f, "linked node with multiplicity zero"),

            Self::LengthMismatch { recorded, actual } => {
                write!(f, "recorded length {recorded}, multiplicities sum to {actual}")
            }

            Self::NodeCountMismatch { recorded, actual } => {
                write!(f, "{recorded} live nodes, {actual} reachable")
            }

            Self::SegmentTreesDiverge { by_head, by_size } => write!(
                f,
                "segment trees diverge ({by_head} by head, {by_size} by size)"
            ),

            Self::SegmentOverlap { head } => write!(f, "free segment at {head} overlaps"),

            Self::BlockAccounting {
                block,
                accounted,
                usable,
            } => write!(
                f,
                "block {block} accounts for {accounted} of {usable} usable bytes"
            ),
        }
    }
}

impl std::error::Error for InvariantViolation {}

// ============================================================================
//  AvlTree
// ============================================================================

/// A balanced ordered multiset.
///
/// # Type Parameters
///
/// - `K` - The key type
/// - `O` - The ordering (defaults to [`Natural`], which needs
///   `K: TreeKey`)
///
/// # Example
///
/// ```rust
/// use avl_arena::AvlTree;
///
/// let mut tree: AvlTree<i32> = AvlTree::new();
/// tree.insert(5);
/// tree.insert(5);
/// tree.insert(-3);
///
/// assert_eq!(tree.len(), 3);
/// assert_eq!(tree.count(&5), 2);
/// assert_eq!(tree.find_closest_greater(&-3), Some(&5));
///
/// assert!(tree.pop(&5));
/// assert_eq!(tree.count(&5), 1);
/// ```
pub struct AvlTree<K, O = Natural> {
    nodes: NodeArena<K>,
    root: Option<NodeId>,

    /// Sum of multiplicities.
    len: usize,

    _order: PhantomData<fn() -> O>,
}

impl<K, O: KeyOrder<K>> AvlTree<K, O> {
    /// Create an empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
            root: None,
            len: 0,
            _order: PhantomData,
        }
    }

    /// Create an empty tree with room for `capacity` distinct keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: NodeArena::with_capacity(capacity),
            root: None,
            len: 0,
            _order: PhantomData,
        }
    }

    /// Add one occurrence of `key`.
    ///
    /// Returns the stored key that compares equal to `key`. When the key was
    /// already present that is the original value, not the argument, which
    /// matters for keys that carry data beyond their ordering.
    pub fn insert(&mut self, key: K) -> &K {
        let (root, stored) = self.insert_at(self.root, key);
        self.root = Some(root);
        self.len += 1;

        debug_assert!(self.balance().abs() <= 1);
        &self.nodes.get(stored).key
    }

    /// Remove one occurrence of `key`.
    ///
    /// The node is unlinked once its multiplicity reaches zero. Returns
    /// whether the key was present.
    pub fn pop(&mut self, key: &K) -> bool {
        let (root, found) = self.remove_at(self.root, key);
        self.root = root;
        if found {
            self.len -= 1;
        }

        debug_assert!(self.balance().abs() <= 1);
        found
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
    }

    /// Total multiplicity of all keys.
    #[must_use]
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no keys.
    #[must_use]
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of distinct keys.
    #[must_use]
    #[inline(always)]
    pub const fn node_count(&self) -> usize {
        self.nodes.live()
    }

    /// Height of the root, 0 for an empty tree.
    #[must_use]
    pub fn height(&self) -> usize {
        usize::from(self.height_of(self.root))
    }

    /// Balance factor of the root (left height minus right height).
    ///
    /// Always in `-1..=1`.
    #[must_use]
    pub fn balance(&self) -> i32 {
        self.root.map_or(0, |id: NodeId| self.balance_of(id))
    }

    /// In-order iterator over `(key, multiplicity)`.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K> {
        Iter::new(&self.nodes, self.root)
    }

    /// Check every structural invariant of the tree.
    ///
    /// O(n); meant for tests and debugging.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let (_, reachable) = self.validate_subtree(self.root)?;
        if reachable != self.nodes.live() {
            return Err(InvariantViolation::NodeCountMismatch {
                recorded: self.nodes.live(),
                actual: reachable,
            });
        }

        let mut total: usize = 0;
        let mut previous: Option<&K> = None;
        for (position, (key, count)) in self.iter().enumerate() {
            if count == 0 {
                return Err(InvariantViolation::ZeroMultiplicity);
            }
            if previous.is_some_and(|prev: &K| O::compare(prev, key).is_ge()) {
                return Err(InvariantViolation::OutOfOrder { position });
            }
            previous = Some(key);
            total += count;
        }

        if total != self.len {
            return Err(InvariantViolation::LengthMismatch {
                recorded: self.len,
                actual: total,
            });
        }
        Ok(())
    }

    /// Returns `(height, node count)` of a verified subtree.
    fn validate_subtree(&self, slot: Option<NodeId>) -> Result<(u8, usize), InvariantViolation> {
        let Some(id) = slot else {
            return Ok((0, 0));
        };
        let node = self.nodes.get(id);

        let (left_height, left_nodes) = self.validate_subtree(node.left)?;
        let (right_height, right_nodes) = self.validate_subtree(node.right)?;

        let balance: i32 = i32::from(left_height) - i32::from(right_height);
        if balance.abs() > 1 {
            return Err(InvariantViolation::Unbalanced { balance });
        }

        let actual: u8 = 1 + left_height.max(right_height);
        if node.height != actual {
            return Err(InvariantViolation::HeightMismatch {
                stored: node.height,
                actual,
            });
        }

        Ok((actual, left_nodes + right_nodes + 1))
    }
}

impl<K, O: KeyOrder<K>> Default for AvlTree<K, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, O> Clone for AvlTree<K, O> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
            len: self.len,
            _order: PhantomData,
        }
    }
}

/// Equal when both trees hold the same keys with the same multiplicities,
/// whatever their shape.
impl<K, O: KeyOrder<K>> PartialEq for AvlTree<K, O> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self.node_count() == other.node_count()
            && self
                .iter()
                .zip(other.iter())
                .all(|((a, a_count), (b, b_count))| a_count == b_count && O::compare(a, b).is_eq())
    }
}

impl<K, O: KeyOrder<K>> Eq for AvlTree<K, O> {}

impl<K: StdFmt::Debug, O> StdFmt::Debug for AvlTree<K, O> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_map()
            .entries(Iter::new(&self.nodes, self.root))
            .finish()
    }
}

impl<K, O: KeyOrder<K>> FromIterator<K> for AvlTree<K, O> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut tree: Self = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<K, O: KeyOrder<K>> Extend<K> for AvlTree<K, O> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<'a, K, O: KeyOrder<K>> IntoIterator for &'a AvlTree<K, O> {
    type Item = (&'a K, usize);
    type IntoIter = Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
//  Tests
// ============================================================================
