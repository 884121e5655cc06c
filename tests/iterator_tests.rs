//! Iterator behaviour: full scans, reverse scans, equality, sentinels.

mod common;

use bplustree::BPlusTree;

fn filled(imax: usize, lmax: usize, n: i32) -> BPlusTree {
    let tree = BPlusTree::new(imax, lmax).unwrap();
    for k in 0..n {
        assert!(tree.insert(k, k * 2));
    }
    tree
}

#[test]
fn forward_scan_yields_every_entry_in_order() {
    common::init_tracing();
    let tree = filled(3, 4, 300);

    let mut seen = Vec::new();
    let mut it = tree.begin();
    while it != tree.end() {
        seen.push(it.current());
        it.step_forward();
    }

    let expected: Vec<(i32, i32)> = (0..300).map(|k| (k, k * 2)).collect();
    assert_eq!(seen, expected);
}

#[test]
fn reverse_scan_yields_every_entry_in_reverse() {
    let tree = filled(3, 3, 300);

    let mut seen = Vec::new();
    let mut it = tree.rbegin();
    while it != tree.rend() {
        seen.push(it.current().0);
        it.step_backward();
    }

    let expected: Vec<i32> = (0..300).rev().collect();
    assert_eq!(seen, expected);
}

#[test]
fn empty_tree_iterators_are_sentinels() {
    let tree = BPlusTree::new(3, 4).unwrap();

    assert!(tree.begin() == tree.end());
    assert!(tree.rbegin() == tree.rend());
    assert!(tree.begin().is_end());
    assert!(tree.rbegin().is_rend());
}

#[test]
fn single_entry_scans_both_ways() {
    let tree = BPlusTree::new(3, 4).unwrap();
    assert!(tree.insert(42, 420));

    let mut it = tree.begin();
    assert!(it.is_valid());
    assert_eq!(it.current(), (42, 420));
    it.step_forward();
    assert!(it == tree.end());

    let mut it = tree.rbegin();
    assert_eq!(it.current(), (42, 420));
    it.step_backward();
    assert!(it == tree.rend());
}

#[test]
fn iterators_at_the_same_position_compare_equal() {
    let tree = filled(3, 4, 10);

    // Two shared latches on the same leaf coexist.
    let a = tree.begin();
    let b = tree.begin();
    assert!(a == b);

    drop(b);
    let mut c = tree.begin();
    c.step_forward();
    assert!(a != c);
}

#[test]
fn sentinel_iterators_compare_by_state() {
    let tree = BPlusTree::new(3, 4).unwrap();

    assert!(tree.end() == tree.end());
    assert!(tree.rend() == tree.rend());
    assert!(tree.retry() == tree.retry());
    assert!(tree.end() != tree.rend());
    assert!(tree.end() != tree.retry());
    assert!(tree.retry().is_retry());
}

#[test]
fn mixed_stepping_walks_back_and_forth() {
    let tree = filled(3, 3, 20);

    let mut it = tree.begin();
    for _ in 0..10 {
        it.step_forward();
    }
    assert_eq!(it.current().0, 10);

    for _ in 0..5 {
        it.step_backward();
    }
    assert_eq!(it.current().0, 5);

    for _ in 0..5 {
        it.step_forward();
    }
    assert_eq!(it.current().0, 10);
}

#[test]
fn backward_scan_crosses_leaf_boundaries() {
    // Small fanout so the walk crosses several leaves.
    let tree = filled(3, 3, 30);

    let mut it = tree.rbegin();
    let mut count = 0;
    while it != tree.rend() {
        count += 1;
        it.step_backward();
    }
    assert_eq!(count, 30);
}

#[test]
fn dropping_an_iterator_releases_its_latch() {
    let tree = filled(3, 4, 50);

    let it = tree.begin();
    drop(it);

    // A write into the first leaf needs its exclusive latch; this would
    // wedge if the dropped iterator leaked the shared latch.
    assert!(tree.delete(0));
    assert!(tree.insert(0, 0));
}

#[test]
fn scan_reflects_deletes() {
    let tree = filled(3, 4, 40);
    for k in (0..40).step_by(2) {
        assert!(tree.delete(k));
    }

    let mut seen = Vec::new();
    let mut it = tree.begin();
    while it != tree.end() {
        seen.push(it.current().0);
        it.step_forward();
    }
    let expected: Vec<i32> = (0..40).filter(|k| k % 2 == 1).collect();
    assert_eq!(seen, expected);
}

#[test]
fn default_iterator_is_invalid_and_unique() {
    let tree = BPlusTree::new(3, 4).unwrap();
    let a = bplustree::TreeIterator::default();
    let b = bplustree::TreeIterator::default();

    assert!(a == b);
    assert!(!a.is_valid());
    assert!(a != tree.end());
    assert!(a != tree.retry());
}
