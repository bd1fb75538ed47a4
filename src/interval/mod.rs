//! Interval trees: red-black trees of half-open ranges `[lo, hi)`, ordered by `lo` and augmented
//! with the largest `hi` of every subtree.
//!
//! The augmentation is what makes [`IntervalTree::overlapping`] output sensitive: a subtree whose
//! largest `hi` doesn't reach past the start of the query can't contain an overlapping interval,
//! so it is skipped entirely.

use std::mem::offset_of;
use std::ptr::NonNull;

use no_panic::no_panic;

use crate::rbtree::{Linked, Links, RbTree, TreeOps};

mod query;

pub use query::Overlapping;

/// Whether the half-open ranges `a` and `b` share at least one point.
///
/// Only proper ranges (`lo < hi`) behave like sets of points here. An empty range `[p, p)`
/// overlaps any range with `lo < p < hi`, and an inverted range `[lo, hi)` (`hi < lo`) overlaps any
/// range that starts before its `hi` and ends after its `lo`.
#[cfg_attr(not(debug_assertions), no_panic)]
pub fn overlap(a: [i64; 2], b: [i64; 2]) -> bool {
    let ([a_lo, a_hi], [b_lo, b_hi]) = (a, b);
    a_lo < b_hi && a_hi > b_lo
}

/// A record holding the range `[lo, hi)` and an arbitrary payload.
///
/// `lo` and `hi` must not change while the record is in a tree (which the tree enforces by owning
/// the handle). `lo < hi` is not required, see [`overlap`] for how other ranges are matched.
#[derive(Debug)]
pub struct IntervalNode<V = ()> {
    pub lo: i64,
    pub hi: i64,
    /// The largest `hi` in this record's subtree (itself included).
    max_hi: i64,
    pub value: V,
    links: Links,
}

impl<V> IntervalNode<V> {
    pub fn new(lo: i64, hi: i64, value: V) -> Box<Self> {
        Box::new(Self { lo, hi, max_hi: hi, value, links: Links::new() })
    }

    pub fn range(&self) -> [i64; 2] {
        [self.lo, self.hi]
    }

    /// The largest `hi` of any interval in this record's subtree, as of the last mutation.
    pub fn max_hi(&self) -> i64 {
        self.max_hi
    }
}

unsafe impl<V> Linked for IntervalNode<V> {
    type Handle = Box<Self>;

    fn into_ptr(handle: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(handle))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        // SAFETY: `ptr` came from `Box::leak` in `into_ptr`
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links> {
        // SAFETY: the field is inside the record
        unsafe { ptr.byte_add(offset_of!(Self, links)).cast() }
    }

    unsafe fn from_links(links: NonNull<Links>) -> NonNull<Self> {
        // SAFETY: `links` points to the `links` field of a record (asserted by caller)
        unsafe { links.byte_sub(offset_of!(Self, links)).cast() }
    }
}

/// Orders by `lo`, maintains `max_hi`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalOps;

impl IntervalOps {
    fn max_hi<V>(node: &IntervalNode<V>, children: [Option<&IntervalNode<V>>; 2]) -> i64 {
        children.into_iter().flatten().fold(node.hi, |max, c| max.max(c.max_hi))
    }
}

impl<V> TreeOps<IntervalNode<V>> for IntervalOps {
    const AUGMENTED: bool = true;

    fn less_than(&self, a: &IntervalNode<V>, b: &IntervalNode<V>) -> bool {
        a.lo < b.lo
    }

    fn update(&self, node: &mut IntervalNode<V>, children: [Option<&IntervalNode<V>>; 2]) {
        node.max_hi = Self::max_hi(node, children);
    }

    fn is_updated(&self, node: &IntervalNode<V>, children: [Option<&IntervalNode<V>>; 2]) -> bool {
        node.max_hi == Self::max_hi(node, children)
    }
}

pub type IntervalTree<V = ()> = RbTree<IntervalNode<V>, IntervalOps>;

impl<V> RbTree<IntervalNode<V>, IntervalOps> {
    /// Every member overlapping `range`, in ascending order of `lo`.
    pub fn overlapping(&self, range: [i64; 2]) -> Overlapping<'_, V> {
        Overlapping::new(self, range)
    }

    /// The member with the smallest `lo` strictly greater than `min_lo`.
    pub fn min_greater_lo(&self, min_lo: i64) -> Option<&IntervalNode<V>> {
        self.min_greater_by(|x| min_lo < x.lo)
    }
}

#[cfg(test)]
mod tests;
