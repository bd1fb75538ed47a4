//! An intrusive, augmentable red-black tree.
//!
//! The tree never allocates or frees the records it orders. Every record embeds one [`Links`] and
//! is handed to the tree as an owning [`Linked::Handle`] on [`RbTree::insert`], and handed back
//! on [`RbTree::delete`]. The tree itself only rewires links.
//!
//! Implementation follows chapter 13 of CLRS ("Introduction to Algorithms"), with a single
//! sentinel node per tree standing in for every absent child and for the root's parent.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::ptr::NonNull;

use log::trace;

mod check;
pub mod integer;
mod iter;

pub use check::InvariantViolation;
pub use iter::{Drain, Iter, Order};

// PROVE: any node with height `h` has black height at least `h/2`
// PROVE: the subtree located at any node `x` contains at least `2^bh(x) - 1` nodes (use induction)
// LEMMA: An RBTree with `n` internal nodes has height at most `2*log₂(n+1)`

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// Which child of a node. Indexing `children` with a side lets the rotation and fixup code be
/// written once for both mirror images.
pub(crate) type Side = bool;
pub(crate) const LEFT: Side = false;
pub(crate) const RIGHT: Side = true;

pub(crate) type Link = NonNull<Links>;

/// The node embedded inside every record that can be a member of an [`RbTree`].
///
/// All fields are owned by the tree while the record is a member. A detached record's links are
/// meaningless (they are fully overwritten on insert).
pub struct Links {
    color: Color,
    parent: Link,
    children: [Link; 2],
}

impl Links {
    pub const fn new() -> Self {
        Self {
            color: Color::Red,
            parent: NonNull::dangling(),
            children: [NonNull::dangling(); 2],
        }
    }

    const fn sentinel() -> Self {
        Self {
            color: Color::Black,
            ..Self::new()
        }
    }
}

impl Default for Links {
    fn default() -> Self {
        Self::new()
    }
}

// NOTE: the pointers are addresses of other records, printing them would only be noise
impl Debug for Links {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Links").field("color", &self.color).finish_non_exhaustive()
    }
}

/// A record that embeds [`Links`] and can therefore be ordered by an [`RbTree`].
///
/// SAFETY: implementors must guarantee that
///   - `links` and `from_links` are inverse conversions between a pointer to the record and a
///     pointer to its single embedded [`Links`] field,
///   - a record stays at the same address for as long as its `Handle` is owned by a tree
///     (`Box<Self>` is the usual handle and satisfies this trivially),
///   - `from_ptr(into_ptr(h))` gives back an equivalent handle.
pub unsafe trait Linked: Sized {
    /// The owning handle to a record. Dropping it releases the record.
    type Handle;

    /// Give up ownership of a handle, leaving only the record's address.
    fn into_ptr(handle: Self::Handle) -> NonNull<Self>;

    /// Take ownership of a record back.
    ///
    /// SAFETY: `ptr` must have come from `into_ptr`, and no other handle to it may exist.
    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle;

    /// The address of the record's embedded links.
    ///
    /// This must not go through a reference (use `byte_add` with `offset_of!`), so that the
    /// returned pointer keeps the provenance of the whole record.
    ///
    /// SAFETY: `ptr` must point to a live record.
    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links>;

    /// The inverse of [`Linked::links`].
    ///
    /// SAFETY: `links` must have been produced by [`Linked::links`].
    unsafe fn from_links(links: NonNull<Links>) -> NonNull<Self>;
}

/// The ordering and augmentation a tree is instantiated with.
pub trait TreeOps<T> {
    /// Whether `update` has to be kept current. When `false` the tree skips the ancestor walks.
    const AUGMENTED: bool = false;

    /// Strict weak ordering of records.
    fn less_than(&self, a: &T, b: &T) -> bool;

    /// Recompute the augmented value of `node` from its own data and the (already current)
    /// augmented values of its `[left, right]` children.
    ///
    /// The result must only depend on the *set* of records below `node`, never on how they are
    /// arranged, since rotations rearrange descendants without calling `update` on every ancestor.
    fn update(&self, _node: &mut T, _children: [Option<&T>; 2]) {}

    /// Whether `node`'s augmented value is what `update` would compute. Only used by
    /// [`RbTree::check_invariants`].
    fn is_updated(&self, _node: &T, _children: [Option<&T>; 2]) -> bool {
        true
    }
}

/// An intrusive red-black tree over records of type `T`, ordered and augmented by `O`.
///
/// Not thread safe: any traversal must be finished (or dropped) before the tree is mutated again,
/// which the borrow checker enforces for [`Iter`] and [`Drain`].
pub struct RbTree<T: Linked, O: TreeOps<T>> {
    root: Link,
    /// Heap allocated so that moving the tree doesn't invalidate links pointing to it.
    nil: Link,
    len: usize,
    ops: O,
    _owns: PhantomData<T::Handle>,
}

impl<T: Linked, O: TreeOps<T> + Default> Default for RbTree<T, O> {
    fn default() -> Self {
        Self::new(O::default())
    }
}

impl<T: Linked, O: TreeOps<T>> RbTree<T, O> {
    pub fn new(ops: O) -> Self {
        let nil = NonNull::from(Box::leak(Box::new(Links::sentinel())));
        Self {
            root: nil,
            nil,
            len: 0,
            ops,
            _owns: PhantomData,
        }
    }

    /// The amount of records currently in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root == self.nil
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// The smallest record, if any.
    pub fn first(&self) -> Option<&T> {
        if self.is_empty() { return None }
        // SAFETY: the root is a member, so is the minimum of its subtree
        unsafe { Some(self.record(self.minimum(self.root)).as_ref()) }
    }

    /// Links a record into the tree, and returns its address, which is its identity for
    /// [`RbTree::delete`].
    ///
    /// A record that compares equal to members is placed after them (to the right). Rotations
    /// don't change the in-order sequence, so equal records currently iterate in insertion order,
    /// but callers shouldn't rely on any order among equal records.
    pub fn insert(&mut self, handle: T::Handle) -> NonNull<T> {
        let node = T::into_ptr(handle);
        let nil = self.nil;

        // SAFETY: `node` is a live record we now own, every member is live, and nothing else holds
        //         references into the tree since we have `&mut self`.
        unsafe {
            let z = T::links(node);

            let mut y = nil;
            let mut x = self.root;
            while x != nil {
                y = x;
                x = child(x, !self.less(z, x));
            }

            set_parent(z, y);
            if y == nil {
                self.root = z;
            } else {
                set_child(y, !self.less(z, y), z);
            }
            set_child(z, LEFT, nil);
            set_child(z, RIGHT, nil);
            set_color(z, Color::Red);
            // counted as soon as it is reachable, `update` and the fixup can still unwind
            self.len += 1;

            // the new leaf is updated too, so callers don't have to pre-initialize its augment
            self.update_to_root(z);
            self.insert_fixup(z);
        }

        trace!("Inserted {node:016x?} ({} records)", self.len);
        node
    }

    /// Unlinks a member from the tree and returns ownership of it.
    ///
    /// SAFETY: `node` must be a member of this tree (as returned by [`RbTree::insert`] and not
    ///         deleted since).
    pub unsafe fn delete(&mut self, node: NonNull<T>) -> T::Handle {
        let nil = self.nil;

        // SAFETY: `node` is a member (asserted by caller), and we have exclusive access to the tree
        unsafe {
            let z = T::links(node);
            let mut y = z;
            let mut y_original_color = color(y);
            let x;

            if child(z, LEFT) == nil {
                x = child(z, RIGHT);
                self.transplant(z, x);
            } else if child(z, RIGHT) == nil {
                x = child(z, LEFT);
                self.transplant(z, x);
            } else {
                // `z` has two children, so the node physically leaving its position is its successor
                y = self.minimum(child(z, RIGHT));
                y_original_color = color(y);
                x = child(y, RIGHT);
                if parent(y) == z {
                    // NOTE: `x` might be the sentinel, whose parent is scratch space for the fixup
                    set_parent(x, y);
                } else {
                    self.transplant(y, x);
                    set_child(y, RIGHT, child(z, RIGHT));
                    set_parent(child(y, RIGHT), y);
                }
                self.transplant(z, y);
                set_child(y, LEFT, child(z, LEFT));
                set_parent(child(y, LEFT), y);
                set_color(y, color(z));
            }
            self.len -= 1;

            self.update_to_root(parent(x));

            if y_original_color == Color::Black {
                self.delete_fixup(x);
            }

            trace!("Deleted {node:016x?} ({} records)", self.len);
            T::from_ptr(node)
        }
    }

    /// The smallest record strictly greater than `key`, according to the tree's ordering.
    ///
    /// `key` doesn't have to be a member, it is only ever passed to [`TreeOps::less_than`].
    pub fn min_greater(&self, key: &T) -> Option<&T> {
        self.min_greater_by(|x| self.ops.less_than(key, x))
    }

    /// The smallest record `x` for which `is_greater(x)` holds.
    ///
    /// `is_greater` must be monotone over the tree's ordering (false for some prefix of the
    /// members, true for the rest), like "`key` is less than `x`".
    pub fn min_greater_by(&self, mut is_greater: impl FnMut(&T) -> bool) -> Option<&T> {
        let nil = self.nil;
        // SAFETY: we only walk between members, and have shared access to the whole tree
        unsafe {
            let mut y = nil;
            let mut x = self.root;
            while x != nil {
                y = x;
                x = child(x, !is_greater(self.record(x).as_ref()));
            }

            // `y` is now next to where a record would be inserted, so it is either the answer, or
            // the answer is a few successors away (more than one when there are equal records)
            while y != nil && !is_greater(self.record(y).as_ref()) {
                y = self.successor_of(y);
            }

            if y == nil { None } else { Some(self.record(y).as_ref()) }
        }
    }

    /// The member that follows `node` in order, if any.
    ///
    /// SAFETY: `node` must be a member of this tree.
    pub unsafe fn successor(&self, node: NonNull<T>) -> Option<NonNull<T>> {
        // SAFETY: asserted by caller
        unsafe {
            let y = self.successor_of(T::links(node));
            if y == self.nil { None } else { Some(self.record(y)) }
        }
    }

    /// A resumable traversal over the members, in the given `order`.
    pub fn iter(&self, order: Order) -> Iter<'_, T, O> {
        Iter::new(self, order)
    }

    /// Empties the tree, handing back every record in post-order (a record comes after both of its
    /// children).
    ///
    /// Each handle may be dropped as soon as it is yielded: the walk never looks at a record again
    /// once it has been yielded. Dropping the `Drain` early drops the remaining handles.
    pub fn drain(&mut self) -> Drain<'_, T, O> {
        Drain::new(self)
    }

    // ----- raw helpers -----

    /// The root's links, for walks implemented outside this module.
    pub(crate) fn root_link(&self) -> Link {
        self.root
    }

    /// The sentinel, standing in for every absent child and the root's parent.
    pub(crate) fn nil_link(&self) -> Link {
        self.nil
    }

    /// SAFETY: `x` must be the links of a live record (never the sentinel).
    pub(crate) unsafe fn record(&self, x: Link) -> NonNull<T> {
        debug_assert!(x != self.nil, "the sentinel is not a record");
        // SAFETY: asserted by caller
        unsafe { T::from_links(x) }
    }

    /// SAFETY: both must be the links of live records.
    unsafe fn less(&self, a: Link, b: Link) -> bool {
        // SAFETY: asserted by caller, and no exclusive references to records exist while the tree
        //         is being worked on
        unsafe { self.ops.less_than(self.record(a).as_ref(), self.record(b).as_ref()) }
    }

    /// Re-run the augmentation on `x`.
    ///
    /// SAFETY: `x` must be a member, and its children's augments must be current.
    unsafe fn update(&self, x: Link) {
        if !O::AUGMENTED { return }
        // SAFETY: asserted by caller. `x` and its children are distinct records, so the one
        //         exclusive reference doesn't alias the two shared ones.
        unsafe {
            let children = [LEFT, RIGHT].map(|side| {
                let c = child(x, side);
                if c == self.nil { None } else { Some(self.record(c).as_ref()) }
            });
            self.ops.update(self.record(x).as_mut(), children);
        }
    }

    /// Re-run the augmentation on `x` and every ancestor of it.
    ///
    /// SAFETY: `x` must be a member or the sentinel, with a valid path of parents to the root.
    unsafe fn update_to_root(&self, mut x: Link) {
        if !O::AUGMENTED { return }
        // SAFETY: asserted by caller
        unsafe {
            while x != self.nil {
                self.update(x);
                x = parent(x);
            }
        }
    }

    /// SAFETY: `x` must be a member.
    unsafe fn minimum(&self, mut x: Link) -> Link {
        // SAFETY: asserted by caller
        unsafe {
            while child(x, LEFT) != self.nil {
                x = child(x, LEFT);
            }
        }
        x
    }

    /// The in-order successor of `x`, or the sentinel if `x` is the maximum.
    ///
    /// SAFETY: `x` must be a member.
    unsafe fn successor_of(&self, mut x: Link) -> Link {
        // SAFETY: asserted by caller
        unsafe {
            if child(x, RIGHT) != self.nil {
                return self.minimum(child(x, RIGHT));
            }
            let mut y = parent(x);
            while y != self.nil && x == child(y, RIGHT) {
                x = y;
                y = parent(y);
            }
            y
        }
    }

    /// Rotates `x` down towards `side`, pulling its other child up into its place.
    ///
    /// SAFETY: `x` must be a member with a non-sentinel child on `!side`.
    unsafe fn rotate(&mut self, x: Link, side: Side) {
        let nil = self.nil;
        // SAFETY: asserted by caller
        unsafe {
            let y = child(x, !side);
            set_child(x, !side, child(y, side));
            if child(y, side) != nil {
                set_parent(child(y, side), x);
            }
            set_parent(y, parent(x));
            if parent(x) == nil {
                self.root = y;
            } else {
                let p = parent(x);
                set_child(p, x != child(p, LEFT), y);
            }
            set_child(y, side, x);
            set_parent(x, y);

            // `x` is now below `y`, so it has to go first
            self.update(x);
            self.update(y);
        }
    }

    /// Replaces the subtree rooted at `u` with the one rooted at `v` (which may be the sentinel).
    ///
    /// SAFETY: `u` must be a member.
    unsafe fn transplant(&mut self, u: Link, v: Link) {
        // SAFETY: asserted by caller
        unsafe {
            let p = parent(u);
            if p == self.nil {
                self.root = v;
            } else {
                set_child(p, u != child(p, LEFT), v);
            }
            set_parent(v, p);
        }
    }

    /// SAFETY: `z` must be a freshly inserted red member.
    unsafe fn insert_fixup(&mut self, mut z: Link) {
        // SAFETY: asserted by caller. A red parent is never the root, so `z` has a grandparent.
        unsafe {
            while color(parent(z)) == Color::Red {
                let zp = parent(z);
                let side = zp != child(parent(zp), LEFT);
                let uncle = child(parent(zp), !side);
                if color(uncle) == Color::Red {
                    set_color(zp, Color::Black);
                    set_color(uncle, Color::Black);
                    set_color(parent(zp), Color::Red);
                    z = parent(zp);
                } else {
                    if z == child(zp, !side) {
                        z = zp;
                        self.rotate(z, side);
                    }
                    set_color(parent(z), Color::Black);
                    set_color(parent(parent(z)), Color::Red);
                    self.rotate(parent(parent(z)), !side);
                }
            }
            set_color(self.root, Color::Black);
        }
    }

    /// SAFETY: `x` must be the node (or sentinel, with its parent set) that took the place of a
    ///         removed black node.
    unsafe fn delete_fixup(&mut self, mut x: Link) {
        // SAFETY: asserted by caller. `x` carries an extra black, so its sibling can't be the
        //         sentinel.
        unsafe {
            while x != self.root && color(x) == Color::Black {
                let side = x != child(parent(x), LEFT);
                let mut w = child(parent(x), !side);
                if color(w) == Color::Red {
                    set_color(w, Color::Black);
                    set_color(parent(x), Color::Red);
                    self.rotate(parent(x), side);
                    w = child(parent(x), !side);
                }
                if color(child(w, LEFT)) == Color::Black && color(child(w, RIGHT)) == Color::Black {
                    set_color(w, Color::Red);
                    x = parent(x);
                } else {
                    if color(child(w, !side)) == Color::Black {
                        set_color(child(w, side), Color::Black);
                        set_color(w, Color::Red);
                        self.rotate(w, !side);
                        w = child(parent(x), !side);
                    }
                    set_color(w, color(parent(x)));
                    set_color(parent(x), Color::Black);
                    set_color(child(w, !side), Color::Black);
                    self.rotate(parent(x), side);
                    x = self.root;
                }
            }
            set_color(x, Color::Black);
        }
    }
}

impl<T: Linked, O: TreeOps<T>> Drop for RbTree<T, O> {
    fn drop(&mut self) {
        // the handles we were given still own their records
        self.drain().for_each(drop);
        // SAFETY: `nil` came from `Box::leak` in `new`, and nothing links to it anymore
        drop(unsafe { Box::from_raw(self.nil.as_ptr()) });
    }
}

impl<T: Linked + Debug, O: TreeOps<T>> Debug for RbTree<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter(Order::InOrder)).finish()
    }
}

// NOTE: these go through raw places instead of references, so that there is never a reference to
//       a `Links` that another raw pointer could invalidate. They are all unsafe because `x` must
//       point to live links (a member record's or the sentinel's).

#[inline]
unsafe fn color(x: Link) -> Color {
    unsafe { (*x.as_ptr()).color }
}

#[inline]
unsafe fn set_color(x: Link, color: Color) {
    unsafe { (*x.as_ptr()).color = color }
}

#[inline]
pub(crate) unsafe fn parent(x: Link) -> Link {
    unsafe { (*x.as_ptr()).parent }
}

#[inline]
unsafe fn set_parent(x: Link, parent: Link) {
    unsafe { (*x.as_ptr()).parent = parent }
}

#[inline]
pub(crate) unsafe fn child(x: Link, side: Side) -> Link {
    unsafe { (*x.as_ptr()).children[side as usize] }
}

#[inline]
unsafe fn set_child(x: Link, side: Side, child: Link) {
    unsafe { (*x.as_ptr()).children[side as usize] = child }
}
