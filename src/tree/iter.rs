//! In-order iteration over `(key, multiplicity)` pairs.

use std::iter::FusedIterator;

use super::node::{NodeArena, NodeId};

/// In-order iterator over the distinct keys of an
/// [`AvlTree`](super::AvlTree) and their multiplicities.
///
/// Created by [`AvlTree::iter`](super::AvlTree::iter).
#[derive(Debug, Clone)]
pub struct Iter<'a, K> {
    nodes: &'a NodeArena<K>,

    /// Nodes whose key has not been yielded yet and whose left subtree is
    /// already exhausted (or about to be pushed).
    stack: Vec<NodeId>,

    remaining: usize,
}

impl<'a, K> Iter<'a, K> {
    pub(super) fn new(nodes: &'a NodeArena<K>, root: Option<NodeId>) -> Self {
        let mut iter = Self {
            nodes,
            stack: Vec::new(),
            remaining: nodes.live(),
        };
        iter.push_left_spine(root);
        iter
    }

    fn push_left_spine(&mut self, mut cursor: Option<NodeId>) {
        while let Some(id) = cursor {
            self.stack.push(id);
            cursor = self.nodes.get(id).left;
        }
    }
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = (&'a K, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let id: NodeId = self.stack.pop()?;
        let nodes: &'a NodeArena<K> = self.nodes;
        let node = nodes.get(id);

        self.push_left_spine(node.right);
        self.remaining -= 1;
        Some((&node.key, node.count))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K> ExactSizeIterator for Iter<'_, K> {}

impl<K> FusedIterator for Iter<'_, K> {}
