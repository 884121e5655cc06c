//! Two-phase insert.
//!
//! The optimistic phase descends with shared latches and takes an exclusive
//! latch only on the target leaf, which covers the common case of a leaf
//! with room. When the leaf is full, every latch is dropped and the
//! pessimistic phase restarts the descent with exclusive latches, keeping a
//! stack of held latches that shrinks whenever an inner node is insert-safe
//! (it could absorb one more separator without splitting).

use crate::leaf::LeafNode;
use crate::node::{Key, NodeRef, Value};
use crate::tracing_helpers::{debug_log, trace_log};

use super::BPlusTree;

impl BPlusTree {
    /// Insert `(key, value)`.
    ///
    /// Returns true when inserted, false when the key already exists (the
    /// existing value is left untouched).
    ///
    /// The tree latch is taken exclusive at the start of the descent because
    /// the root pointer might need to be installed (empty tree); it is
    /// released as soon as the descent moves past the root.
    pub fn insert(&self, key: Key, value: Value) -> bool {
        // --- optimistic phase ---
        self.tree_latch.lock_exclusive();

        let root = match self.load_root() {
            Some(root) => root,
            None => {
                let root = NodeRef::from_leaf(LeafNode::alloc(self.leaf_max_size));
                self.store_root(Some(root));
                root
            }
        };

        let mut current = root;
        let mut parent: Option<NodeRef> = None;
        current.lock_shared();

        while !current.is_leaf() {
            match parent {
                Some(p) => p.unlock_shared(),
                None => self.tree_latch.unlock_exclusive(),
            }
            parent = Some(current);
            // SAFETY: shared latch held on `current`.
            let child = unsafe { current.as_inner() }.find_pivot(key);
            child.lock_shared();
            current = child;
        }

        // Upgrade the leaf latch. The parent (or the tree latch) still pins
        // the leaf in place across the release/reacquire gap.
        current.unlock_shared();
        current.lock_exclusive();
        match parent {
            Some(p) => p.unlock_shared(),
            None => self.tree_latch.unlock_exclusive(),
        }

        {
            // SAFETY: exclusive latch held on the leaf.
            let leaf = unsafe { current.as_leaf_mut() };
            let pos = leaf.lower_bound(key);
            if pos < leaf.len() && leaf.entry(pos).0 == key {
                current.unlock_exclusive();
                return false;
            }
            if leaf.insert_at(pos, (key, value)) {
                current.unlock_exclusive();
                return true;
            }
        }
        current.unlock_exclusive();

        debug_log!(key, "leaf full, restarting insert pessimistically");
        self.insert_pessimistic(key, value)
    }

    /// Exclusive-descent insert with splitting.
    fn insert_pessimistic(&self, key: Key, value: Value) -> bool {
        self.tree_latch.lock_exclusive();
        let mut holds_tree_latch = true;

        let root = match self.load_root() {
            Some(root) => root,
            None => {
                // Every key was deleted between the two phases.
                let root = NodeRef::from_leaf(LeafNode::alloc(self.leaf_max_size));
                self.store_root(Some(root));
                root
            }
        };

        let mut stack: Vec<NodeRef> = Vec::new();
        let mut current = root;
        current.lock_exclusive();

        while !current.is_leaf() {
            // SAFETY: exclusive latch held on `current`.
            let inner = unsafe { current.as_inner() };
            if !inner.is_full() {
                // Insert-safe: this node absorbs any split from below, so
                // nothing above it can change.
                self.release_write_set(&mut stack, &mut holds_tree_latch);
            }
            stack.push(current);
            let child = inner.find_pivot(key);
            child.lock_exclusive();
            current = child;
        }

        // Redo the optimistic phase's leaf work: between the two phases
        // another thread may have inserted the key, or freed up room.
        let lifted_entry;
        {
            // SAFETY: exclusive latch held on the leaf.
            let leaf = unsafe { current.as_leaf_mut() };
            let pos = leaf.lower_bound(key);
            if pos < leaf.len() && leaf.entry(pos).0 == key {
                current.unlock_exclusive();
                self.release_write_set(&mut stack, &mut holds_tree_latch);
                return false;
            }
            if leaf.insert_at(pos, (key, value)) {
                current.unlock_exclusive();
                self.release_write_set(&mut stack, &mut holds_tree_latch);
                return true;
            }

            // Split the leaf and place the new entry on the side whose key
            // range covers it.
            let mut right = leaf.split();
            if key >= right.first_key() {
                let pos = right.lower_bound(key);
                right.insert_at(pos, (key, value));
            } else {
                let pos = leaf.lower_bound(key);
                leaf.insert_at(pos, (key, value));

                // At odd fanouts the fresh right sibling starts one below
                // minimum. Rebalance with the left side's last entry so
                // both halves satisfy minimum occupancy.
                if right.len() < right.min_size() {
                    let moved = leaf.pop_last();
                    right.insert_at(0, moved);
                }
            }

            let old_next = leaf.next();
            right.set_prev(Some(current));
            right.set_next(old_next);
            let lifted_key = right.first_key();
            let right_ref = NodeRef::from_leaf(right);
            leaf.set_next(Some(right_ref));

            if let Some(next) = old_next {
                next.lock_exclusive();
                // SAFETY: exclusive latch held on the right neighbour; its
                // own latch guards its back pointer.
                unsafe { next.as_leaf_mut() }.set_prev(Some(right_ref));
                next.unlock_exclusive();
            }

            lifted_entry = (lifted_key, right_ref);
        }
        current.unlock_exclusive();
        trace_log!(key, lifted = lifted_entry.0, "leaf split");

        // Propagate the lifted separator up the held-latch stack. Every
        // node on the stack except the bottom one is full and will split in
        // turn; the bottom one absorbs the separator.
        let mut lifted = lifted_entry;
        let mut finished = false;

        while !finished {
            let Some(node) = stack.pop() else { break };
            // SAFETY: exclusive latch held (pushed during the descent).
            let inner = unsafe { node.as_inner_mut() };
            let pos = inner.lower_bound(lifted.0);
            if inner.insert_at(pos, lifted) {
                finished = true;
            } else {
                let (mut lifted_key, mut right) = inner.split();
                if lifted.0 >= lifted_key {
                    let pos = right.lower_bound(lifted.0);
                    right.insert_at(pos, lifted);

                    // At even fanouts the left side comes out of the split
                    // one below minimum when the incoming separator lands
                    // right. Rotate one slot back through the lifted key so
                    // both sides satisfy minimum occupancy.
                    if inner.len() < inner.min_size() {
                        let end = inner.len();
                        inner.insert_at(end, (lifted_key, right.low_child()));
                        let (next_key, next_child) = right.pop_first();
                        right.set_low_child(next_child);
                        lifted_key = next_key;
                    }
                } else {
                    let pos = inner.lower_bound(lifted.0);
                    inner.insert_at(pos, lifted);
                }
                lifted = (lifted_key, NodeRef::from_inner(right));
                trace_log!(lifted = lifted.0, "inner node split");
            }
            node.unlock_exclusive();
        }

        if !finished {
            // The split propagated past the last held latch: grow a new
            // root above the old one. The tree latch is still held
            // exclusive, because no node on this path was insert-safe.
            debug_assert!(holds_tree_latch, "root split without the tree latch");
            let mut new_root = crate::internode::InnerNode::alloc(self.inner_max_size, root);
            new_root.insert_at(0, lifted);
            self.store_root(Some(NodeRef::from_inner(new_root)));
            debug_log!(separator = lifted.0, "tree grew a new root");
        }

        self.release_write_set(&mut stack, &mut holds_tree_latch);
        true
    }
}
