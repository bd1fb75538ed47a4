use std::iter::FusedIterator;
use std::marker::PhantomData;

use log::debug;

use super::{Link, Linked, RbTree, TreeOps, LEFT, RIGHT, child, parent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Ascending order of the tree's ordering.
    InOrder,
    /// Every node comes after both of its children.
    PostOrder,
}

/// Stackless traversal state, driven by where we came from (CLRS exercise 10.4-5).
///
/// NOTE: after a node has been yielded, it is only ever compared by address, never dereferenced.
///       In post-order this means a yielded node can be freed before the walk continues, as long
///       as nobody rewires the links of the nodes that haven't been yielded yet.
#[derive(Debug, Clone, Copy)]
struct Walk {
    x: Link,
    prev: Link,
    order: Order,
}

impl Walk {
    fn new(root: Link, nil: Link, order: Order) -> Self {
        Self { x: root, prev: nil, order }
    }

    /// SAFETY: `nil` must be the sentinel of the tree `self.x` is in, and every node that hasn't
    ///         been yielded yet must be live and unchanged since the walk started.
    unsafe fn next(&mut self, nil: Link) -> Option<Link> {
        let in_order = self.order == Order::InOrder;
        let post_order = self.order == Order::PostOrder;

        // SAFETY: `self.x` is never a node that has been yielded (in post-order we only ever go up
        //         from a yielded node), so it is live (asserted by caller).
        unsafe {
            while self.x != nil {
                let x = self.x;
                if self.prev == parent(x) {
                    // coming down from the parent
                    self.prev = x;
                    if child(x, LEFT) != nil {
                        self.x = child(x, LEFT);
                    } else if child(x, RIGHT) != nil {
                        self.x = child(x, RIGHT);
                        if in_order { return Some(x) }
                    } else {
                        self.x = parent(x);
                        return Some(x);
                    }
                } else if self.prev == child(x, LEFT) {
                    // coming up from the left subtree
                    self.prev = x;
                    if child(x, RIGHT) != nil {
                        self.x = child(x, RIGHT);
                        if in_order { return Some(x) }
                    } else {
                        self.x = parent(x);
                        return Some(x);
                    }
                } else {
                    debug_assert!(self.prev == child(x, RIGHT), "walk arrived at {x:016x?} from a node that isn't adjacent");
                    // coming up from the right subtree
                    self.prev = x;
                    self.x = parent(x);
                    if post_order { return Some(x) }
                }
            }
        }
        None
    }
}

/// A traversal over the records of an [`RbTree`], see [`RbTree::iter`].
pub struct Iter<'a, T: Linked, O: TreeOps<T>> {
    tree: &'a RbTree<T, O>,
    walk: Walk,
}

impl<'a, T: Linked, O: TreeOps<T>> Iter<'a, T, O> {
    pub(super) fn new(tree: &'a RbTree<T, O>, order: Order) -> Self {
        Self { tree, walk: Walk::new(tree.root, tree.nil, order) }
    }
}

impl<'a, T: Linked, O: TreeOps<T>> Iterator for Iter<'a, T, O> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: the tree is borrowed for `'a`, so it can't change while we walk it or while the
        //         yielded references live.
        unsafe {
            let x = self.walk.next(self.tree.nil)?;
            Some(self.tree.record(x).as_ref())
        }
    }
}

impl<T: Linked, O: TreeOps<T>> FusedIterator for Iter<'_, T, O> {}

impl<T: Linked, O: TreeOps<T>> Clone for Iter<'_, T, O> {
    fn clone(&self) -> Self {
        Self { tree: self.tree, walk: self.walk }
    }
}

/// Destructive post-order traversal, see [`RbTree::drain`].
pub struct Drain<'a, T: Linked, O: TreeOps<T>> {
    nil: Link,
    walk: Walk,
    remaining: usize,
    // the tree is already empty, but the sentinel (`nil`) has to outlive us
    _tree: PhantomData<&'a mut RbTree<T, O>>,
}

impl<'a, T: Linked, O: TreeOps<T>> Drain<'a, T, O> {
    pub(super) fn new(tree: &'a mut RbTree<T, O>) -> Self {
        let walk = Walk::new(tree.root, tree.nil, Order::PostOrder);
        let remaining = tree.len;
        if remaining != 0 {
            debug!("Draining {remaining} records");
        }

        // detach everything up front, so the tree is consistent no matter how far we get
        tree.root = tree.nil;
        tree.len = 0;

        Self { nil: tree.nil, walk, remaining, _tree: PhantomData }
    }
}

impl<T: Linked, O: TreeOps<T>> Iterator for Drain<'_, T, O> {
    type Item = T::Handle;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: the detached nodes are only reachable through this walk, and every one of them
        //         is yielded exactly once. Post-order never goes back to a yielded node, so the
        //         caller dropping a handle can't affect the rest of the walk.
        unsafe {
            let x = self.walk.next(self.nil)?;
            self.remaining = self.remaining.saturating_sub(1);
            Some(T::from_ptr(T::from_links(x)))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Linked, O: TreeOps<T>> ExactSizeIterator for Drain<'_, T, O> {}
impl<T: Linked, O: TreeOps<T>> FusedIterator for Drain<'_, T, O> {}

impl<T: Linked, O: TreeOps<T>> Drop for Drain<'_, T, O> {
    fn drop(&mut self) {
        self.for_each(drop);
    }
}
