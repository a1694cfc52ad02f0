//! Index-based node storage for [`AvlTree`](super::AvlTree).
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Removing a
//! node returns its slot to a free list that the next insert reuses, so a tree
//! that churns around a steady size stops allocating.

/// Handle to a node slot inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    #[inline(always)]
    pub(crate) const fn index(self) -> usize {
        self.0
    }
}

/// One distinct key and its multiplicity.
#[derive(Debug, Clone)]
pub(crate) struct Node<K> {
    pub(crate) key: K,

    /// Outstanding insertions of `key`. Always >= 1 while the node is linked.
    pub(crate) count: usize,

    /// Height of the subtree rooted here. A leaf has height 1.
    pub(crate) height: u8,

    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
}

impl<K> Node<K> {
    #[inline(always)]
    const fn leaf(key: K) -> Self {
        Self {
            key,
            count: 1,
            height: 1,
            left: None,
            right: None,
        }
    }
}

/// Slot arena backing one tree.
#[derive(Debug, Clone)]
pub(crate) struct NodeArena<K> {
    slots: Vec<Option<Node<K>>>,
    free: Vec<NodeId>,
    live: usize,
}

impl<K> NodeArena<K> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Number of linked nodes.
    #[inline(always)]
    pub(crate) const fn live(&self) -> usize {
        self.live
    }

    /// Store a fresh leaf node holding `key`.
    pub(crate) fn alloc(&mut self, key: K) -> NodeId {
        self.live += 1;

        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(Node::leaf(key));
            return id;
        }

        self.slots.push(Some(Node::leaf(key)));
        NodeId(self.slots.len() - 1)
    }

    /// Unlink a node and recycle its slot.
    pub(crate) fn release(&mut self, id: NodeId) -> Node<K> {
        let Some(node) = self.slots.get_mut(id.index()).and_then(Option::take) else {
            unreachable!("released a dangling node id {id:?}");
        };

        self.live -= 1;
        self.free.push(id);
        node
    }

    #[inline(always)]
    pub(crate) fn get(&self, id: NodeId) -> &Node<K> {
        match self.slots.get(id.index()) {
            Some(Some(node)) => node,
            _ => unreachable!("dangling node id {id:?}"),
        }
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node<K> {
        match self.slots.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => unreachable!("dangling node id {id:?}"),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_recycles_slot() {
        let mut arena: NodeArena<u32> = NodeArena::new();

        let a = arena.alloc(1);
        let b = arena.alloc(2);
        assert_eq!(arena.live(), 2);

        let node = arena.release(a);
        assert_eq!(node.key, 1);
        assert_eq!(arena.live(), 1);

        let c = arena.alloc(3);
        assert_eq!(c, a, "freed slot should be reused");
        assert_eq!(arena.get(c).key, 3);
        assert_eq!(arena.get(b).key, 2);
    }

    #[test]
    fn test_fresh_node_is_leaf() {
        let mut arena: NodeArena<i64> = NodeArena::with_capacity(4);
        let id = arena.alloc(-7);
        let node = arena.get(id);

        assert_eq!(node.count, 1);
        assert_eq!(node.height, 1);
        assert!(node.left.is_none());
        assert!(node.right.is_none());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut arena: NodeArena<u8> = NodeArena::new();
        for k in 0..10 {
            let _ = arena.alloc(k);
        }
        arena.clear();
        assert_eq!(arena.live(), 0);
    }
}
