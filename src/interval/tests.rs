use std::ptr::NonNull;

use proptest::collection::vec;
use proptest::prelude::*;

use super::*;
use crate::init_test_logging;
use crate::rbtree::Order;

/// What `overlapping` must find: every member overlapping `range`, brute force.
fn brute_force<V>(tree: &IntervalTree<V>, range: [i64; 2]) -> Vec<[i64; 2]> {
    tree.iter(Order::InOrder)
        .map(IntervalNode::range)
        .filter(|&r| overlap(range, r))
        .collect()
}

fn assert_query<V>(tree: &IntervalTree<V>, range: [i64; 2]) {
    let found = tree.overlapping(range).map(IntervalNode::range).collect::<Vec<_>>();
    assert!(found.is_sorted_by_key(|r| r[0]), "query {range:?} out of order: {found:?}");

    let mut found_sorted = found.clone();
    let mut expected = brute_force(tree, range);
    found_sorted.sort();
    expected.sort();
    assert_eq!(found_sorted, expected, "query {range:?}");
}

#[test]
fn overlap_predicate() {
    assert!(overlap([-10, 10], [0, 20]));
    assert!(!overlap([5, 10], [0, 5]));
    assert!(!overlap([0, 5], [5, 10]));
    assert!(overlap([0, 5], [4, 10]));

    // empty and inverted ranges only match what straddles their endpoints
    assert!(overlap([3, 3], [0, 10]));
    assert!(!overlap([5, 5], [5, 10]));
    assert!(!overlap([3, 3], [3, 3]));
    assert!(overlap([0, 10], [7, 2]));
    assert!(!overlap([3, 6], [7, 2]));
    assert!(overlap([i64::MIN, i64::MAX], [0, 1]));
}

#[test]
fn three_interval_scenario() {
    init_test_logging();
    let mut tree = IntervalTree::default();
    for [lo, hi] in [[0, 5], [10, 15], [3, 8]] {
        tree.insert(IntervalNode::new(lo, hi, ()));
    }
    assert!(tree.check_invariants().is_ok());

    let found = tree.overlapping([4, 11]).map(IntervalNode::range).collect::<Vec<_>>();
    assert_eq!(found, [[0, 5], [3, 8], [10, 15]]);

    let found = tree.overlapping([5, 10]).map(IntervalNode::range).collect::<Vec<_>>();
    assert_eq!(found, [[3, 8]]);
    assert_eq!(tree.overlapping([15, 20]).count(), 0);
    assert_eq!(tree.overlapping([20, 10]).count(), 0);

    assert_eq!(tree.min_greater_lo(0).map(IntervalNode::range), Some([3, 8]));
    assert_eq!(tree.min_greater_lo(3).map(IntervalNode::range), Some([10, 15]));
    assert_eq!(tree.min_greater_lo(10).map(IntervalNode::range), None);
    assert_eq!(tree.first().map(IntervalNode::max_hi), Some(5));
}

#[test]
fn empty_tree_has_no_overlaps() {
    let tree = IntervalTree::<()>::default();
    assert_eq!(tree.overlapping([i64::MIN, i64::MAX]).next().map(IntervalNode::range), None);
    assert!(tree.min_greater_lo(i64::MIN).is_none());
}

#[test]
fn max_hi_follows_deletes() {
    let mut tree = IntervalTree::default();
    let long = tree.insert(IntervalNode::new(0, 1000, "long"));
    let nodes = (1..40).map(|i| tree.insert(IntervalNode::new(i, i + 1, "short"))).collect::<Vec<_>>();

    let root_max = |tree: &IntervalTree<&str>| tree.iter(Order::PostOrder).last().map(IntervalNode::max_hi);
    assert_eq!(root_max(&tree), Some(1000));
    assert_eq!(tree.overlapping([500, 600]).map(|n| n.value).collect::<Vec<_>>(), ["long"]);

    let long = unsafe { tree.delete(long) };
    assert_eq!((long.lo, long.hi, long.value), (0, 1000, "long"));
    assert!(tree.check_invariants().is_ok());
    assert_eq!(root_max(&tree), Some(40));
    assert_eq!(tree.overlapping([500, 600]).count(), 0);

    for node in nodes {
        drop(unsafe { tree.delete(node) });
        assert!(tree.check_invariants().is_ok());
    }
    assert!(tree.is_empty());
}

#[test]
fn sweep_256_intervals() {
    init_test_logging();
    let mut tree = IntervalTree::default();
    let mut nodes = Vec::new();

    for i in 0..0x100 {
        let lo = (i * 8121 + 1) % 0x80;
        nodes.push(tree.insert(IntervalNode::new(lo, lo + i, i)));
        assert!(tree.check_invariants().is_ok());
        assert_query(&tree, [0x80, 0xC0]);
    }

    for lo in (0..0x100).step_by(3) {
        for hi in (lo..0x100).step_by(5) {
            assert_query(&tree, [lo, hi]);
        }
    }

    for node in nodes {
        let node: NonNull<IntervalNode<i64>> = node;
        drop(unsafe { tree.delete(node) });
        assert!(tree.check_invariants().is_ok());
        assert_query(&tree, [0x80, 0xC0]);
    }
}

fn intervals() -> impl Strategy<Value = Vec<[i64; 2]>> {
    // inverted and empty ranges included on purpose
    vec((-50i64..50, -10i64..40).prop_map(|(lo, len)| [lo, lo + len]), 0..80)
}

proptest! {
    #[test]
    fn overlapping_matches_brute_force(ranges in intervals(), queries in vec((-60i64..60, -60i64..60), 1..20)) {
        let mut tree = IntervalTree::default();
        for &[lo, hi] in &ranges {
            tree.insert(IntervalNode::new(lo, hi, ()));
        }
        prop_assert!(tree.check_invariants().is_ok());

        for (lo, hi) in queries {
            assert_query(&tree, [lo, hi]);
        }
    }

    #[test]
    fn overlapping_after_deletes(ranges in intervals(), keep in vec(any::<bool>(), 80), query in (-60i64..60, 0i64..40)) {
        let mut tree = IntervalTree::default();
        let nodes = ranges.iter().map(|&[lo, hi]| tree.insert(IntervalNode::new(lo, hi, ()))).collect::<Vec<_>>();
        for (node, keep) in nodes.into_iter().zip(keep) {
            if !keep {
                drop(unsafe { tree.delete(node) });
            }
        }
        prop_assert!(tree.check_invariants().is_ok());
        assert_query(&tree, [query.0, query.0 + query.1]);
    }

    #[test]
    fn min_greater_lo_is_the_smallest_greater(ranges in intervals(), min_lo in -60i64..60) {
        let mut tree = IntervalTree::default();
        for &[lo, hi] in &ranges {
            tree.insert(IntervalNode::new(lo, hi, ()));
        }
        let expected = ranges.iter().map(|r| r[0]).filter(|&lo| lo > min_lo).min();
        prop_assert_eq!(tree.min_greater_lo(min_lo).map(|n| n.lo), expected);
    }
}
