//! Read-only queries: membership, extremes and nearest-key searches.
//!
//! Every search here is one root-to-leaf descent, O(log n), except
//! [`AvlTree::find_closest`] which takes two.

use std::cmp::Ordering;

use super::AvlTree;
use super::node::NodeId;
use crate::key::KeyOrder;

impl<K, O: KeyOrder<K>> AvlTree<K, O> {
    /// Node holding a key equal to `key`.
    fn lookup(&self, key: &K) -> Option<NodeId> {
        let mut cursor: Option<NodeId> = self.root;

        while let Some(id) = cursor {
            let node = self.nodes.get(id);
            cursor = match O::compare(key, &node.key) {
                Ordering::Equal => return Some(id),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }

        None
    }

    /// Whether `key` is present at least once.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }

    /// Multiplicity of `key`, 0 if absent.
    #[must_use]
    pub fn count(&self, key: &K) -> usize {
        self.lookup(key).map_or(0, |id: NodeId| self.nodes.get(id).count)
    }

    /// Smallest key, `None` if the tree is empty.
    #[must_use]
    pub fn find_min(&self) -> Option<&K> {
        let mut id: NodeId = self.root?;
        while let Some(left) = self.nodes.get(id).left {
            id = left;
        }
        Some(&self.nodes.get(id).key)
    }

    /// Largest key, `None` if the tree is empty.
    #[must_use]
    pub fn find_max(&self) -> Option<&K> {
        let mut id: NodeId = self.root?;
        while let Some(right) = self.nodes.get(id).right {
            id = right;
        }
        Some(&self.nodes.get(id).key)
    }

    /// Present key closest to `key` by the ordering's distance.
    ///
    /// When two present keys are equally far away the lesser one wins.
    /// `None` only if the tree is empty.
    ///
    /// # Example
    ///
    /// ```rust
    /// use avl_arena::AvlTree;
    ///
    /// let tree: AvlTree<i32> = [10, 20].into_iter().collect();
    /// assert_eq!(tree.find_closest(&14), Some(&10));
    /// assert_eq!(tree.find_closest(&15), Some(&10));
    /// assert_eq!(tree.find_closest(&16), Some(&20));
    /// ```
    #[must_use]
    pub fn find_closest(&self, key: &K) -> Option<&K> {
        // Both the predecessor and the successor of `key` lie on its search
        // path, so one descent finds the smallest distance.
        let mut nearest: Option<O::Distance> = None;
        let mut cursor: Option<NodeId> = self.root;

        while let Some(id) = cursor {
            let node = self.nodes.get(id);
            let distance: O::Distance = O::distance(key, &node.key);
            if nearest.is_none_or(|d: O::Distance| distance < d) {
                nearest = Some(distance);
            }

            cursor = match O::compare(key, &node.key) {
                Ordering::Equal => break,
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }

        // Keys within `nearest` form one contiguous run; take its first.
        let nearest: O::Distance = nearest?;
        let mut best: Option<NodeId> = None;
        let mut cursor: Option<NodeId> = self.root;

        while let Some(id) = cursor {
            let node = self.nodes.get(id);
            cursor = if O::distance(key, &node.key) <= nearest {
                best = Some(id);
                node.left
            } else if O::compare(&node.key, key) == Ordering::Less {
                node.right
            } else {
                node.left
            };
        }

        best.map(|id: NodeId| &self.nodes.get(id).key)
    }

    /// Smallest present key strictly greater than `key`.
    #[must_use]
    pub fn find_closest_greater(&self, key: &K) -> Option<&K> {
        self.successor(key, false)
    }

    /// Smallest present key greater than or equal to `key`.
    #[must_use]
    pub fn find_closest_greater_equal(&self, key: &K) -> Option<&K> {
        self.successor(key, true)
    }

    /// Largest present key strictly less than `key`.
    #[must_use]
    pub fn find_closest_lesser(&self, key: &K) -> Option<&K> {
        let mut best: Option<NodeId> = None;
        let mut cursor: Option<NodeId> = self.root;

        while let Some(id) = cursor {
            let node = self.nodes.get(id);
            if O::compare(&node.key, key) == Ordering::Less {
                best = Some(id);
                cursor = node.right;
            } else {
                cursor = node.left;
            }
        }

        best.map(|id: NodeId| &self.nodes.get(id).key)
    }

    fn successor(&self, key: &K, inclusive: bool) -> Option<&K> {
        let mut best: Option<NodeId> = None;
        let mut cursor: Option<NodeId> = self.root;

        while let Some(id) = cursor {
            let node = self.nodes.get(id);
            match O::compare(&node.key, key) {
                Ordering::Equal if inclusive => return Some(&node.key),
                Ordering::Greater => {
                    best = Some(id);
                    cursor = node.left;
                }
                Ordering::Equal | Ordering::Less => cursor = node.right,
            }
        }

        best.map(|id: NodeId| &self.nodes.get(id).key)
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::AvlTree;

    fn sample() -> AvlTree<i32> {
        [-100, -50, -25, 90, 99, 100, 200].into_iter().collect()
    }

    #[test]
    fn test_contains_and_count() {
        let mut tree = sample();
        assert!(tree.contains(&90));
        assert!(!tree.contains(&91));

        tree.insert(90);
        assert_eq!(tree.count(&90), 2);
        assert_eq!(tree.count(&91), 0);
    }

    #[test]
    fn test_extremes() {
        let tree = sample();
        assert_eq!(tree.find_min(), Some(&-100));
        assert_eq!(tree.find_max(), Some(&200));

        let empty: AvlTree<i32> = AvlTree::new();
        assert_eq!(empty.find_min(), None);
        assert_eq!(empty.find_max(), None);
    }

    #[test]
    fn test_directional_searches() {
        let tree = sample();

        assert_eq!(tree.find_closest_greater(&90), Some(&99));
        assert_eq!(tree.find_closest_greater_equal(&90), Some(&90));
        assert_eq!(tree.find_closest_greater_equal(&91), Some(&99));
        assert_eq!(tree.find_closest_lesser(&90), Some(&-25));
        assert_eq!(tree.find_closest_lesser(&-99), Some(&-100));

        assert_eq!(tree.find_closest_greater(&200), None);
        assert_eq!(tree.find_closest_greater_equal(&201), None);
        assert_eq!(tree.find_closest_lesser(&-100), None);
    }

    #[test]
    fn test_sentinel_queries_hit_extremes() {
        use crate::key::TreeKey;

        let tree = sample();
        assert_eq!(
            tree.find_closest_greater_equal(&<i32 as TreeKey>::MIN),
            tree.find_min()
        );
        assert_eq!(tree.find_closest_lesser(&<i32 as TreeKey>::MAX), tree.find_max());
    }

    #[test]
    fn test_find_closest() {
        let tree = sample();

        assert_eq!(tree.find_closest(&-1_000_001), Some(&-100));
        assert_eq!(tree.find_closest(&1_000_001), Some(&200));
        assert_eq!(tree.find_closest(&95), Some(&99));
        assert_eq!(tree.find_closest(&100), Some(&100));
        assert_eq!(tree.find_closest(&i32::MIN), Some(&-100));
    }

    #[test]
    fn test_find_closest_tie_prefers_lesser() {
        let tree: AvlTree<i32> = [0, 10, 20, 30].into_iter().collect();

        assert_eq!(tree.find_closest(&5), Some(&0));
        assert_eq!(tree.find_closest(&15), Some(&10));
        assert_eq!(tree.find_closest(&25), Some(&20));
    }

    #[test]
    fn test_searches_on_empty_tree() {
        let tree: AvlTree<u64> = AvlTree::new();
        assert_eq!(tree.find_closest(&3), None);
        assert_eq!(tree.find_closest_greater(&3), None);
        assert_eq!(tree.find_closest_greater_equal(&3), None);
        assert_eq!(tree.find_closest_lesser(&3), None);
    }
}
