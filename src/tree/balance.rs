//! Structural mutation: insertion, deletion and AVL rebalancing.
//!
//! Both insert and delete recurse down the search path and rebalance every
//! node on the way back up, so a deletion that needs rotations at several
//! ancestors gets them all.

use std::cmp::Ordering;

use super::AvlTree;
use super::node::NodeId;
use crate::key::KeyOrder;
use crate::tracing_helpers::trace_log;

impl<K, O: KeyOrder<K>> AvlTree<K, O> {
    // ========================================================================
    //  Heights
    // ========================================================================

    #[inline(always)]
    pub(super) fn height_of(&self, node: Option<NodeId>) -> u8 {
        node.map_or(0, |id: NodeId| self.nodes.get(id).height)
    }

    /// Left height minus right height.
    #[inline(always)]
    pub(super) fn balance_of(&self, id: NodeId) -> i32 {
        let node = self.nodes.get(id);
        i32::from(self.height_of(node.left)) - i32::from(self.height_of(node.right))
    }

    #[inline(always)]
    fn update_height(&mut self, id: NodeId) {
        let node = self.nodes.get(id);
        let height: u8 = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.nodes.get_mut(id).height = height;
    }

    // ========================================================================
    //  Rotations
    // ========================================================================

    /// Rotate `id` down to the left. Returns the new subtree root.
    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let Some(pivot) = self.nodes.get(id).right else {
            unreachable!("rotate_left without a right child");
        };
        trace_log!(?id, ?pivot, "rotate_left");

        let inner: Option<NodeId> = self.nodes.get(pivot).left;
        self.nodes.get_mut(id).right = inner;
        self.nodes.get_mut(pivot).left = Some(id);

        // Order matters: the demoted node first, then its new parent.
        self.update_height(id);
        self.update_height(pivot);
        pivot
    }

    /// Rotate `id` down to the right. Returns the new subtree root.
    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let Some(pivot) = self.nodes.get(id).left else {
            unreachable!("rotate_right without a left child");
        };
        trace_log!(?id, ?pivot, "rotate_right");

        let inner: Option<NodeId> = self.nodes.get(pivot).right;
        self.nodes.get_mut(id).left = inner;
        self.nodes.get_mut(pivot).right = Some(id);

        self.update_height(id);
        self.update_height(pivot);
        pivot
    }

    /// Restore the AVL property at `id`, whose children are already balanced.
    fn rebalance(&mut self, id: NodeId) -> NodeId {
        self.update_height(id);
        let balance: i32 = self.balance_of(id);

        let root: NodeId = if balance > 1 {
            let Some(left) = self.nodes.get(id).left else {
                unreachable!("left-heavy node without a left child");
            };
            // Left-right case: straighten the left child first.
            if self.balance_of(left) < 0 {
                let straightened: NodeId = self.rotate_left(left);
                self.nodes.get_mut(id).left = Some(straightened);
            }
            self.rotate_right(id)
        } else if balance < -1 {
            let Some(right) = self.nodes.get(id).right else {
                unreachable!("right-heavy node without a right child");
            };
            // Right-left case.
            if self.balance_of(right) > 0 {
                let straightened: NodeId = self.rotate_right(right);
                self.nodes.get_mut(id).right = Some(straightened);
            }
            self.rotate_left(id)
        } else {
            id
        };

        debug_assert!(
            self.balance_of(root).abs() <= 1,
            "rebalance left balance factor {}",
            self.balance_of(root)
        );
        root
    }

    // ========================================================================
    //  Insert
    // ========================================================================

    /// Insert into the subtree at `slot`.
    ///
    /// Returns `(new subtree root, node now holding key)`.
    pub(super) fn insert_at(&mut self, slot: Option<NodeId>, key: K) -> (NodeId, NodeId) {
        let Some(id) = slot else {
            let fresh: NodeId = self.nodes.alloc(key);
            return (fresh, fresh);
        };

        match O::compare(&key, &self.nodes.get(id).key) {
            Ordering::Equal => {
                self.nodes.get_mut(id).count += 1;
                (id, id)
            }

            Ordering::Less => {
                let (child, stored) = self.insert_at(self.nodes.get(id).left, key);
                self.nodes.get_mut(id).left = Some(child);
                (self.rebalance(id), stored)
            }

            Ordering::Greater => {
                let (child, stored) = self.insert_at(self.nodes.get(id).right, key);
                self.nodes.get_mut(id).right = Some(child);
                (self.rebalance(id), stored)
            }
        }
    }

    // ========================================================================
    //  Remove
    // ========================================================================

    /// Drop one occurrence of `key` from the subtree at `slot`.
    ///
    /// Returns `(new subtree root, whether key was present)`.
    pub(super) fn remove_at(&mut self, slot: Option<NodeId>, key: &K) -> (Option<NodeId>, bool) {
        let Some(id) = slot else {
            return (None, false);
        };

        match O::compare(key, &self.nodes.get(id).key) {
            Ordering::Less => {
                let (child, found) = self.remove_at(self.nodes.get(id).left, key);
                self.nodes.get_mut(id).left = child;
                (Some(self.rebalance(id)), found)
            }

            Ordering::Greater => {
                let (child, found) = self.remove_at(self.nodes.get(id).right, key);
                self.nodes.get_mut(id).right = child;
                (Some(self.rebalance(id)), found)
            }

            Ordering::Equal => {
                let node = self.nodes.get_mut(id);
                if node.count > 1 {
                    node.count -= 1;
                    return (Some(id), true);
                }

                (self.unlink(id), true)
            }
        }
    }

    /// Remove node `id` from the tree entirely. Returns the replacement root.
    fn unlink(&mut self, id: NodeId) -> Option<NodeId> {
        let node = self.nodes.release(id);

        match (node.left, node.right) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some(only),
            (Some(left), Some(right)) => {
                // Promote the in-order successor into the vacated position.
                let (rest, successor) = self.detach_min(right);
                let promoted = self.nodes.get_mut(successor);
                promoted.left = Some(left);
                promoted.right = rest;
                Some(self.rebalance(successor))
            }
        }
    }

    /// Detach the minimum node of the subtree at `id`.
    ///
    /// Returns `(remaining subtree root, detached node)`. The detached node
    /// keeps its key and multiplicity; only its links are stale.
    fn detach_min(&mut self, id: NodeId) -> (Option<NodeId>, NodeId) {
        let node = self.nodes.get(id);
        let Some(left) = node.left else {
            return (node.right, id);
        };

        let (rest, min) = self.detach_min(left);
        self.nodes.get_mut(id).left = rest;
        (Some(self.rebalance(id)), min)
    }
}
