use std::iter::FusedIterator;

use crate::rbtree::{Link, LEFT, RIGHT, child, parent};

use super::{overlap, IntervalNode, IntervalTree};

/// The members of an [`IntervalTree`] overlapping a fixed range, in ascending order of `lo`.
///
/// This is the in-order walk of the tree, except that it never enters a subtree that can't hold an
/// overlapping interval:
///   - a left subtree is only entered if its `max_hi` reaches past the start of the query,
///   - a right subtree is only entered if, on top of that, the current node starts before the end
///     of the query (everything to the right starts at or after it).
pub struct Overlapping<'a, V> {
    tree: &'a IntervalTree<V>,
    range: [i64; 2],
    x: Link,
    prev: Link,
}

impl<'a, V> Overlapping<'a, V> {
    pub(super) fn new(tree: &'a IntervalTree<V>, range: [i64; 2]) -> Self {
        Self {
            tree,
            range,
            x: tree.root_link(),
            prev: tree.nil_link(),
        }
    }

    pub fn range(&self) -> [i64; 2] {
        self.range
    }

    /// SAFETY: `c` must be a member.
    unsafe fn reaches_query(&self, c: Link) -> bool {
        // SAFETY: asserted by caller
        unsafe { self.tree.record(c).as_ref().max_hi > self.range[0] }
    }

    /// Whether the walk should go into `x`'s right subtree.
    ///
    /// SAFETY: `x` must be a member.
    unsafe fn enter_right(&self, x: &IntervalNode<V>, right: Link) -> bool {
        // SAFETY: asserted by caller
        right != self.tree.nil_link() && x.lo < self.range[1] && unsafe { self.reaches_query(right) }
    }
}

impl<'a, V> Iterator for Overlapping<'a, V> {
    type Item = &'a IntervalNode<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let nil = self.tree.nil_link();

        // SAFETY: the tree is borrowed for `'a`, so every node we walk to stays a member
        unsafe {
            while self.x != nil {
                let x = self.x;
                let node: &'a IntervalNode<V> = self.tree.record(x).as_ref();
                let (left, right) = (child(x, LEFT), child(x, RIGHT));

                if self.prev == parent(x) {
                    self.prev = x;
                    if left != nil && self.reaches_query(left) {
                        self.x = left;
                        continue;
                    }
                } else if self.prev == left {
                    self.prev = x;
                } else {
                    debug_assert!(self.prev == right, "overlap walk arrived at {x:016x?} from a node that isn't adjacent");
                    // both subtrees are done, and `x` itself was considered on the way into the right one
                    self.prev = x;
                    self.x = parent(x);
                    continue;
                }

                // the left subtree is done (or skipped), so this is `x`'s place in the order
                self.x = if self.enter_right(node, right) { right } else { parent(x) };
                if overlap(self.range, node.range()) {
                    return Some(node);
                }
            }
        }
        None
    }
}

impl<V> FusedIterator for Overlapping<'_, V> {}
