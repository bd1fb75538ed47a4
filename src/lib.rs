#![deny(unsafe_op_in_unsafe_fn)]

//! Intrusive red-black trees with pluggable augmentation, and interval trees built on top of them.

// the generic balanced tree
pub mod rbtree;

// specializations
pub mod interval;

pub use interval::{overlap, IntervalNode, IntervalOps, IntervalTree};
pub use rbtree::integer::{IntegerNode, IntegerOps, IntegerTree};
pub use rbtree::{InvariantViolation, Linked, Links, Order, RbTree, TreeOps};

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use simplelog::*;
    // NOTE: every test calls this, only the first one gets to install the logger
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}
