//! Two-phase delete with rebalancing.
//!
//! The optimistic phase mirrors the insert descent and only takes the leaf
//! latch exclusive; it commits when removing the entry cannot underflow the
//! leaf. Otherwise the pessimistic phase re-descends with exclusive latches
//! (releasing ancestors above every delete-safe inner node), removes the
//! entry, and repairs occupancy bottom-up: an underflowing node first tries
//! to borrow from the same-parent neighbour (previous preferred, else next)
//! and merges with it when the neighbour sits at minimum. An empty inner
//! root is replaced by its low child; an empty leaf root empties the tree.

use crate::node::{Key, NodeRef};
use crate::tracing_helpers::{debug_log, trace_log};

use super::BPlusTree;

impl BPlusTree {
    /// Remove `key`.
    ///
    /// Returns true when removed, false when the key is absent (the tree is
    /// left unchanged).
    pub fn delete(&self, key: Key) -> bool {
        // --- optimistic phase ---
        self.tree_latch.lock_exclusive();
        let Some(root) = self.load_root() else {
            self.tree_latch.unlock_exclusive();
            return false;
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

        current.unlock_shared();
        current.lock_exclusive();

        // SAFETY: exclusive latch held on the leaf.
        let removable = match parent {
            Some(p) => {
                p.unlock_shared();
                let leaf = unsafe { current.as_leaf() };
                leaf.len() > leaf.min_size()
            }
            None => {
                self.tree_latch.unlock_exclusive();
                // Root-as-leaf: removable as long as the root pointer will
                // not have to change.
                unsafe { current.as_leaf() }.len() > 1
            }
        };

        if removable {
            // SAFETY: exclusive latch held on the leaf.
            let leaf = unsafe { current.as_leaf_mut() };
            let pos = leaf.lower_bound(key);
            if pos >= leaf.len() || leaf.entry(pos).0 != key {
                current.unlock_exclusive();
                return false;
            }
            leaf.remove_at(pos);
            current.unlock_exclusive();
            return true;
        }
        current.unlock_exclusive();

        debug_log!(key, "leaf at minimum, restarting delete pessimistically");
        self.delete_pessimistic(key)
    }

    /// Exclusive-descent delete with borrow/merge rebalancing.
    fn delete_pessimistic(&self, key: Key) -> bool {
        self.tree_latch.lock_exclusive();
        let mut holds_tree_latch = true;

        let Some(root) = self.load_root() else {
            self.tree_latch.unlock_exclusive();
            return false;
        };

        let mut stack: Vec<NodeRef> = Vec::new();
        let mut current = root;
        current.lock_exclusive();

        while !current.is_leaf() {
            // SAFETY: exclusive latch held on `current`.
            let inner = unsafe { current.as_inner() };
            if inner.len() > inner.min_size() {
                // Delete-safe: losing one separator cannot underflow this
                // node, so nothing above it can change.
                self.release_write_set(&mut stack, &mut holds_tree_latch);
            }
            stack.push(current);
            let child = inner.find_pivot(key);
            child.lock_exclusive();
            current = child;
        }

        {
            // SAFETY: exclusive latch held on the leaf.
            let leaf = unsafe { current.as_leaf_mut() };
            let pos = leaf.lower_bound(key);
            if pos >= leaf.len() || leaf.entry(pos).0 != key {
                current.unlock_exclusive();
                self.release_write_set(&mut stack, &mut holds_tree_latch);
                return false;
            }
            leaf.remove_at(pos);

            // The leaf may have been rebalanced between the two phases and
            // not underflow anymore.
            if leaf.len() >= leaf.min_size() {
                current.unlock_exclusive();
                self.release_write_set(&mut stack, &mut holds_tree_latch);
                return true;
            }
        }

        let Some(parent) = stack.pop() else {
            // The leaf is the root; underflow only matters when it is empty.
            debug_assert!(holds_tree_latch, "root leaf change without the tree latch");
            // SAFETY: exclusive latch held on the leaf.
            let now_empty = unsafe { current.as_leaf() }.is_empty();
            current.unlock_exclusive();
            if now_empty {
                self.store_root(None);
                // SAFETY: the root pointer no longer leads here and the
                // tree latch blocks every new descent.
                unsafe { current.free() };
                debug_log!("tree emptied, root cleared");
            }
            self.tree_latch.unlock_exclusive();
            return true;
        };

        let mut finished = self.rebalance_leaf(key, current, parent);
        let mut pending = parent;

        // Walk up the held-latch stack; each iteration repairs the inner
        // node that lost a separator (or occupancy) one level below.
        while !finished {
            let Some(parent) = stack.pop() else { break };
            finished = self.rebalance_inner(key, pending, parent);
            pending = parent;
        }

        if finished {
            pending.unlock_exclusive();
            self.release_write_set(&mut stack, &mut holds_tree_latch);
            return true;
        }

        // The walk reached the root inner node.
        debug_assert!(holds_tree_latch, "root change without the tree latch");
        debug_assert!(Some(pending) == self.load_root(), "walk ended off-root");
        // SAFETY: exclusive latch held on the root.
        let root_inner = unsafe { pending.as_inner() };
        if root_inner.is_empty() {
            let low = root_inner.low_child();
            self.store_root(Some(low));
            pending.unlock_exclusive();
            // SAFETY: unlinked from the root pointer; the tree latch blocks
            // every new descent.
            unsafe { pending.free() };
            debug_log!("root collapsed into its low child");
        } else {
            pending.unlock_exclusive();
        }
        self.tree_latch.unlock_exclusive();
        true
    }

    /// Repair an underflowing leaf using its same-parent neighbour.
    ///
    /// `current` (the leaf) and `parent` are exclusively latched; the leaf
    /// latch is released here, the parent latch stays with the caller.
    /// Returns true when the deletion is fully settled.
    fn rebalance_leaf(&self, key: Key, current: NodeRef, parent: NodeRef) -> bool {
        let mut finished = false;
        // SAFETY: exclusive latch held on `parent`.
        let parent_inner = unsafe { parent.as_inner_mut() };

        if let Some((other, sep)) = parent_inner.previous_sibling_with_separator(key) {
            other.lock_exclusive();
            // SAFETY: exclusive latches held on both leaves.
            let prev_leaf = unsafe { other.as_leaf_mut() };
            if prev_leaf.len() > prev_leaf.min_size() {
                // Borrow the neighbour's last entry; the separator between
                // the pair becomes the underflowing leaf's new first key.
                let moved = prev_leaf.pop_last();
                let leaf = unsafe { current.as_leaf_mut() };
                leaf.insert_at(0, moved);
                parent_inner.set_separator_key(sep, leaf.first_key());
                trace_log!(key, "borrowed from previous leaf");
                current.unlock_exclusive();
                finished = true;
            } else {
                // Merge into the previous leaf and unlink this one.
                {
                    let leaf = unsafe { current.as_leaf_mut() };
                    let old_next = leaf.next();
                    prev_leaf.merge_from(leaf);
                    prev_leaf.set_next(old_next);
                    if let Some(next) = old_next {
                        next.lock_exclusive();
                        // SAFETY: exclusive latch held on the neighbour.
                        unsafe { next.as_leaf_mut() }.set_prev(Some(other));
                        next.unlock_exclusive();
                    }
                }
                parent_inner.remove_at(sep);
                trace_log!(key, "merged into previous leaf");
                current.unlock_exclusive();
                // SAFETY: unlinked from the parent and the sibling chain.
                unsafe { current.free() };
            }
            other.unlock_exclusive();
        } else if let Some((other, sep)) = parent_inner.next_sibling_with_separator(key) {
            other.lock_exclusive();
            // SAFETY: exclusive latches held on both leaves.
            let next_leaf = unsafe { other.as_leaf_mut() };
            if next_leaf.len() > next_leaf.min_size() {
                // Borrow the neighbour's first entry; the separator between
                // the pair becomes the neighbour's new first key.
                let moved = next_leaf.pop_first();
                let leaf = unsafe { current.as_leaf_mut() };
                let end = leaf.len();
                leaf.insert_at(end, moved);
                parent_inner.set_separator_key(sep, next_leaf.first_key());
                trace_log!(key, "borrowed from next leaf");
                current.unlock_exclusive();
                other.unlock_exclusive();
                finished = true;
            } else {
                // Merge the next leaf into this one and unlink it.
                let leaf = unsafe { current.as_leaf_mut() };
                let old_next = next_leaf.next();
                leaf.merge_from(next_leaf);
                leaf.set_next(old_next);
                if let Some(next) = old_next {
                    next.lock_exclusive();
                    // SAFETY: exclusive latch held on the neighbour.
                    unsafe { next.as_leaf_mut() }.set_prev(Some(current));
                    next.unlock_exclusive();
                }
                parent_inner.remove_at(sep);
                trace_log!(key, "merged next leaf in");
                other.unlock_exclusive();
                // SAFETY: unlinked from the parent and the sibling chain.
                unsafe { other.free() };
                current.unlock_exclusive();
            }
        }

        if parent_inner.len() >= parent_inner.min_size() {
            finished = true;
        }
        finished
    }

    /// Repair an underflowing inner node using its same-parent neighbour.
    ///
    /// `node` (the underflowing child) and `parent` are exclusively latched;
    /// the child latch is released here, the parent latch stays with the
    /// caller. Returns true when the deletion is fully settled.
    fn rebalance_inner(&self, key: Key, node: NodeRef, parent: NodeRef) -> bool {
        let mut finished = false;
        // SAFETY: exclusive latch held on `parent`.
        let parent_inner = unsafe { parent.as_inner_mut() };

        if let Some((other, sep)) = parent_inner.previous_sibling_with_separator(key) {
            other.lock_exclusive();
            // SAFETY: exclusive latches held on both inner nodes.
            let prev_inner = unsafe { other.as_inner_mut() };
            let node_inner = unsafe { node.as_inner_mut() };
            if prev_inner.len() > prev_inner.min_size() {
                // Rotate the neighbour's last (separator, child) through
                // the parent: the old parent separator moves down in front
                // of the underflowing node, whose low child slot takes the
                // borrowed child, and the borrowed key moves up.
                let (borrowed_key, borrowed_child) = prev_inner.pop_last();
                let old_sep = parent_inner.separator_key(sep);
                node_inner.insert_at(0, (old_sep, node_inner.low_child()));
                node_inner.set_low_child(borrowed_child);
                parent_inner.set_separator_key(sep, borrowed_key);
                trace_log!(key, "borrowed from previous inner sibling");
                node.unlock_exclusive();
            } else {
                // Merge into the previous sibling: the parent separator
                // comes down over the underflowing node's low child, then
                // its separators follow.
                let old_sep = parent_inner.separator_key(sep);
                let end = prev_inner.len();
                prev_inner.insert_at(end, (old_sep, node_inner.low_child()));
                prev_inner.merge_from(node_inner);
                parent_inner.remove_at(sep);
                trace_log!(key, "merged into previous inner sibling");
                node.unlock_exclusive();
                // SAFETY: unlinked from the parent.
                unsafe { node.free() };
            }
            other.unlock_exclusive();
        } else if let Some((other, sep)) = parent_inner.next_sibling_with_separator(key) {
            other.lock_exclusive();
            // SAFETY: exclusive latches held on both inner nodes.
            let next_inner = unsafe { other.as_inner_mut() };
            let node_inner = unsafe { node.as_inner_mut() };
            if next_inner.len() > next_inner.min_size() {
                // Mirror image of the previous-sibling borrow.
                let (borrowed_key, borrowed_child) = next_inner.pop_first();
                let old_sep = parent_inner.separator_key(sep);
                let end = node_inner.len();
                node_inner.insert_at(end, (old_sep, next_inner.low_child()));
                next_inner.set_low_child(borrowed_child);
                parent_inner.set_separator_key(sep, borrowed_key);
                trace_log!(key, "borrowed from next inner sibling");
                other.unlock_exclusive();
                node.unlock_exclusive();
            } else {
                let old_sep = parent_inner.separator_key(sep);
                let end = node_inner.len();
                node_inner.insert_at(end, (old_sep, next_inner.low_child()));
                node_inner.merge_from(next_inner);
                parent_inner.remove_at(sep);
                trace_log!(key, "merged next inner sibling in");
                other.unlock_exclusive();
                // SAFETY: unlinked from the parent.
                unsafe { other.free() };
                node.unlock_exclusive();
            }
        }

        if parent_inner.len() >= parent_inner.min_size() {
            finished = true;
        }
        finished
    }
}
