//! Quiescent diagnostics: invariant checking and structure snapshots.
//!
//! Everything here walks the tree without taking latches and is meant for
//! tests, debugging, and teardown-time verification.
//!
//! # Quiescence requirements
//!
//! These methods must only be called when the tree is quiescent: no
//! concurrent inserts, deletes, or latched iterators. Using them on an
//! actively modified tree yields garbage (or worse).

use crate::node::{Key, NodeRef};

use super::BPlusTree;

impl BPlusTree {
    /// True when the tree holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load_root().is_none()
    }

    /// Number of levels; 0 for an empty tree, 1 when the root is a leaf.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.load_root();
        while let Some(current) = node {
            depth += 1;
            node = if current.is_leaf() {
                None
            } else {
                // SAFETY: quiescent tree per module contract.
                Some(unsafe { current.as_inner() }.low_child())
            };
        }
        depth
    }

    /// Keys per node per level, root level first. Inner nodes report their
    /// separator keys, leaves their entry keys.
    #[must_use]
    pub fn structure(&self) -> Vec<Vec<Vec<Key>>> {
        let mut levels = Vec::new();
        let mut frontier = match self.load_root() {
            Some(root) => vec![root],
            None => return levels,
        };

        while !frontier.is_empty() {
            let mut level = Vec::new();
            let mut next_frontier = Vec::new();
            for &node in &frontier {
                if node.is_leaf() {
                    // SAFETY: quiescent tree per module contract.
                    level.push(unsafe { node.as_leaf() }.keys());
                } else {
                    // SAFETY: quiescent tree per module contract.
                    let inner = unsafe { node.as_inner() };
                    level.push((0..inner.len()).map(|i| inner.separator_key(i)).collect());
                    next_frontier.push(inner.low_child());
                    for i in 0..inner.len() {
                        next_frontier.push(inner.child_at(i));
                    }
                }
            }
            levels.push(level);
            frontier = next_frontier;
        }
        levels
    }

    /// Entry keys per leaf, left to right, following the sibling chain.
    #[must_use]
    pub fn leaf_keys(&self) -> Vec<Vec<Key>> {
        let mut out = Vec::new();
        let Some(mut node) = self.load_root() else {
            return out;
        };
        while !node.is_leaf() {
            // SAFETY: quiescent tree per module contract.
            node = unsafe { node.as_inner() }.low_child();
        }

        let mut leaf = Some(node);
        while let Some(current) = leaf {
            // SAFETY: quiescent tree per module contract.
            let leaf_node = unsafe { current.as_leaf() };
            out.push(leaf_node.keys());
            leaf = leaf_node.next();
        }
        out
    }

    /// Verify every structural invariant of the tree.
    ///
    /// Checks, for all reachable nodes: strictly ascending keys, occupancy
    /// bounds (root exempt), separator/subtree key-range consistency,
    /// uniform leaf depth, and a doubly linked leaf chain that covers all
    /// keys in order.
    ///
    /// # Panics
    ///
    /// Panics on the first violated invariant.
    pub fn check_invariants(&self) {
        let Some(root) = self.load_root() else {
            return;
        };

        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        check_subtree(
            root,
            None,
            None,
            true,
            1,
            &mut leaf_depth,
            &mut leaves,
            self.inner_max_size,
            self.leaf_max_size,
        );

        // The in-order leaf sequence must be wired into a doubly linked
        // chain with strictly ascending keys across leaf boundaries.
        let mut previous: Option<NodeRef> = None;
        let mut last_key: Option<Key> = None;
        for (i, &leaf) in leaves.iter().enumerate() {
            // SAFETY: quiescent tree per module contract.
            let leaf_node = unsafe { leaf.as_leaf() };
            assert_eq!(
                leaf_node.prev(),
                previous,
                "leaf {i}: prev link does not match in-order predecessor"
            );
            if let Some(prev) = previous {
                // SAFETY: quiescent tree per module contract.
                assert_eq!(
                    unsafe { prev.as_leaf() }.next(),
                    Some(leaf),
                    "leaf {i}: predecessor's next link does not point here"
                );
            }
            if let Some(last) = last_key {
                assert!(
                    last < leaf_node.first_key(),
                    "keys not ascending across the boundary into leaf {i}"
                );
            }
            last_key = Some(leaf_node.entry(leaf_node.len() - 1).0);
            previous = Some(leaf);
        }
        if let Some(last) = previous {
            // SAFETY: quiescent tree per module contract.
            assert_eq!(
                unsafe { last.as_leaf() }.next(),
                None,
                "rightmost leaf has a dangling next link"
            );
        }
    }
}

#[expect(clippy::too_many_arguments, reason = "internal recursive checker")]
fn check_subtree(
    node: NodeRef,
    lower: Option<Key>,
    upper: Option<Key>,
    is_root: bool,
    depth: usize,
    leaf_depth: &mut Option<usize>,
    leaves: &mut Vec<NodeRef>,
    inner_max: usize,
    leaf_max: usize,
) {
    if node.is_leaf() {
        // SAFETY: quiescent tree per caller contract.
        let leaf = unsafe { node.as_leaf() };

        assert!(leaf.len() >= 1, "reachable leaf is empty");
        assert!(leaf.len() <= leaf_max, "leaf above maximum occupancy");
        if !is_root {
            assert!(
                leaf.len() >= leaf.min_size(),
                "non-root leaf below minimum occupancy: {} < {}",
                leaf.len(),
                leaf.min_size()
            );
        }

        match *leaf_depth {
            None => *leaf_depth = Some(depth),
            Some(expected) => assert_eq!(depth, expected, "leaves at unequal depths"),
        }

        let mut last: Option<Key> = None;
        for i in 0..leaf.len() {
            let (k, _) = leaf.entry(i);
            if let Some(prev) = last {
                assert!(prev < k, "leaf keys not strictly ascending");
            }
            if let Some(lo) = lower {
                assert!(k >= lo, "leaf key {k} below subtree lower bound {lo}");
            }
            if let Some(hi) = upper {
                assert!(k < hi, "leaf key {k} at or above subtree upper bound {hi}");
            }
            last = Some(k);
        }

        leaves.push(node);
        return;
    }

    // SAFETY: quiescent tree per caller contract.
    let inner = unsafe { node.as_inner() };

    assert!(inner.len() >= 1, "reachable inner node has no separators");
    assert!(inner.len() <= inner_max, "inner node above maximum occupancy");
    if !is_root {
        assert!(
            inner.len() >= inner.min_size(),
            "non-root inner node below minimum occupancy: {} < {}",
            inner.len(),
            inner.min_size()
        );
    }

    let low_kind = inner.low_child().kind();
    for i in 0..inner.len() {
        if i > 0 {
            assert!(
                inner.separator_key(i - 1) < inner.separator_key(i),
                "separators not strictly ascending"
            );
        }
        assert_eq!(
            inner.child_at(i).kind(),
            low_kind,
            "children of one inner node differ in kind"
        );
    }

    check_subtree(
        inner.low_child(),
        lower,
        Some(inner.separator_key(0)),
        false,
        depth + 1,
        leaf_depth,
        leaves,
        inner_max,
        leaf_max,
    );
    for i in 0..inner.len() {
        let child_upper = if i + 1 < inner.len() {
            Some(inner.separator_key(i + 1))
        } else {
            upper
        };
        check_subtree(
            inner.child_at(i),
            Some(inner.separator_key(i)),
            child_upper,
            false,
            depth + 1,
            leaf_depth,
            leaves,
            inner_max,
            leaf_max,
        );
    }
}
