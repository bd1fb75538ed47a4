//! Trees of plain integers.

use std::mem::offset_of;
use std::ptr::NonNull;

use super::{Linked, Links, RbTree, TreeOps};

/// A record ordered by an `i64`, carrying an arbitrary payload.
#[derive(Debug)]
pub struct IntegerNode<V = ()> {
    pub val: i64,
    pub value: V,
    links: Links,
}

impl<V> IntegerNode<V> {
    pub fn new(val: i64, value: V) -> Box<Self> {
        Box::new(Self { val, value, links: Links::new() })
    }
}

unsafe impl<V> Linked for IntegerNode<V> {
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

/// Numeric `<`, without augmentation.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerOps;

impl<V> TreeOps<IntegerNode<V>> for IntegerOps {
    fn less_than(&self, a: &IntegerNode<V>, b: &IntegerNode<V>) -> bool {
        a.val < b.val
    }
}

pub type IntegerTree<V = ()> = RbTree<IntegerNode<V>, IntegerOps>;

impl<V> RbTree<IntegerNode<V>, IntegerOps> {
    /// The member with the smallest value strictly greater than `min`.
    pub fn min_greater_than(&self, min: i64) -> Option<&IntegerNode<V>> {
        self.min_greater_by(|x| min < x.val)
    }
}
