use log::error;
use thiserror::Error;

use super::{Color, Link, Linked, RbTree, TreeOps, LEFT, RIGHT, child, color, parent};

/// A broken red-black tree property, as found by [`RbTree::check_invariants`].
///
/// These only arise from misuse: a comparator that isn't a strict weak ordering, an augmentation
/// that depends on the shape of the tree, keys mutated while their record is a member, or unsafe
/// calls with a non-member.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("the root is red")]
    RedRoot,
    #[error("the sentinel is red")]
    RedSentinel,
    #[error("a red node has a red child")]
    RedRedEdge,
    #[error("black heights differ between subtrees ({left} on the left, {right} on the right)")]
    BlackHeightMismatch { left: usize, right: usize },
    #[error("a child is ordered on the wrong side of its parent")]
    OutOfOrder,
    #[error("a child doesn't link back to its parent")]
    BrokenParentLink,
    #[error("an augmented value is stale")]
    StaleAugment,
    #[error("found {counted} records, but the tree thinks it has {recorded}")]
    LengthMismatch { counted: usize, recorded: usize },
}

impl<T: Linked, O: TreeOps<T>> RbTree<T, O> {
    /// Walks the whole tree checking every red-black, ordering and augmentation property, and
    /// returns the black height of the tree (not counting the sentinel).
    ///
    /// This is O(n) and recursive, it's meant for tests and debugging.
    pub fn check_invariants(&self) -> Result<usize, InvariantViolation> {
        let result = self.check_all();
        if let Err(e) = result {
            error!("Tree invariant violated: {e}");
        }
        result
    }

    fn check_all(&self) -> Result<usize, InvariantViolation> {
        // SAFETY: `root` and `nil` are always live, and we have shared access to every member
        unsafe {
            if color(self.nil) != Color::Black {
                return Err(InvariantViolation::RedSentinel);
            }
            if color(self.root) != Color::Black {
                return Err(InvariantViolation::RedRoot);
            }
            if self.root != self.nil && parent(self.root) != self.nil {
                return Err(InvariantViolation::BrokenParentLink);
            }

            let mut counted = 0;
            let height = self.check_subtree(self.root, &mut counted)?;
            if counted != self.len {
                return Err(InvariantViolation::LengthMismatch { counted, recorded: self.len });
            }
            Ok(height)
        }
    }

    /// Returns the black height of `x`'s subtree.
    ///
    /// SAFETY: `x` must be the sentinel or a member.
    unsafe fn check_subtree(&self, x: Link, counted: &mut usize) -> Result<usize, InvariantViolation> {
        if x == self.nil { return Ok(0) }
        *counted += 1;

        // SAFETY: asserted by caller, and children of members are members or the sentinel
        unsafe {
            let children = [child(x, LEFT), child(x, RIGHT)];

            for (side, c) in [LEFT, RIGHT].into_iter().zip(children) {
                if c == self.nil { continue }
                if parent(c) != x {
                    return Err(InvariantViolation::BrokenParentLink);
                }
                if color(x) == Color::Red && color(c) == Color::Red {
                    return Err(InvariantViolation::RedRedEdge);
                }
                // equal records may sit on either side, only strict inversions are violations
                let inverted = if side == LEFT { self.less(x, c) } else { self.less(c, x) };
                if inverted {
                    return Err(InvariantViolation::OutOfOrder);
                }
            }

            let records = children.map(|c| if c == self.nil { None } else { Some(self.record(c).as_ref()) });
            if O::AUGMENTED && !self.ops.is_updated(self.record(x).as_ref(), records) {
                return Err(InvariantViolation::StaleAugment);
            }

            let [left, right] = children.map(|c| (c, (color(c) == Color::Black) as usize));
            let left = self.check_subtree(left.0, counted)? + left.1;
            let right = self.check_subtree(right.0, counted)? + right.1;
            if left != right {
                return Err(InvariantViolation::BlackHeightMismatch { left, right });
            }
            Ok(left)
        }
    }
}
