//! Bidirectional iteration with hand-over-hand shared latching.
//!
//! A live iterator pins exactly one shared latch: the leaf it points at.
//! Moving to a sibling leaf try-acquires the neighbour's latch and only
//! then releases the current one; when the try fails the iterator becomes
//! `Retry` instead of blocking, so sideways movement can never form a
//! latch cycle with a top-down writer. `End`/`REnd`/`Retry` iterators hold
//! no latches.

use std::fmt as StdFmt;
use std::marker::PhantomData;

use crate::node::{Key, NodeRef, Value};
use crate::tracing_helpers::trace_log;

use super::BPlusTree;

#[derive(Clone, Copy)]
enum IterState {
    /// Positioned on `index` within `leaf`, shared latch held on `leaf`.
    Valid { leaf: NodeRef, index: usize },
    /// Ran off the right end. Holds no latch.
    End,
    /// Ran off the left end. Holds no latch.
    REnd,
    /// A sibling latch could not be acquired; the caller restarts the
    /// traversal with `begin`/`rbegin`. Holds no latch.
    Retry,
    /// Default-constructed, never positioned.
    Invalid,
}

/// Iterator over `(key, value)` entries in key order.
///
/// # Cross-operation rule
///
/// Within one thread, a top-down operation (`begin`, `rbegin`, `insert`,
/// `delete`, `get`) must not be started while an iterator still holds a
/// leaf latch in that same thread: a concurrent writer may hold the tree
/// latch and block on that leaf, and the top-down call would then block on
/// the tree latch. Drop or exhaust the iterator first.
pub struct TreeIterator<'t> {
    state: IterState,
    _tree: PhantomData<&'t BPlusTree>,
}

impl<'t> TreeIterator<'t> {
    pub(super) fn valid(leaf: NodeRef, index: usize) -> Self {
        Self {
            state: IterState::Valid { leaf, index },
            _tree: PhantomData,
        }
    }

    pub(super) fn end() -> Self {
        Self {
            state: IterState::End,
            _tree: PhantomData,
        }
    }

    pub(super) fn rend() -> Self {
        Self {
            state: IterState::REnd,
            _tree: PhantomData,
        }
    }

    pub(super) fn retry() -> Self {
        Self {
            state: IterState::Retry,
            _tree: PhantomData,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self.state, IterState::Valid { .. })
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self.state, IterState::End)
    }

    #[must_use]
    pub fn is_rend(&self) -> bool {
        matches!(self.state, IterState::REnd)
    }

    #[must_use]
    pub fn is_retry(&self) -> bool {
        matches!(self.state, IterState::Retry)
    }

    /// The entry the iterator points at.
    ///
    /// # Panics
    ///
    /// Panics when the iterator is not `Valid`.
    #[must_use]
    pub fn current(&self) -> (Key, Value) {
        match self.state {
            IterState::Valid { leaf, index } => {
                // SAFETY: shared latch held on `leaf` since positioning.
                unsafe { leaf.as_leaf() }.entry(index)
            }
            _ => panic!("current() on a non-valid iterator"),
        }
    }

    /// Advance to the next entry in key order.
    ///
    /// Stepping past the last entry yields `End`; a contended right sibling
    /// yields `Retry`.
    ///
    /// # Panics
    ///
    /// Panics when the iterator is not `Valid`.
    pub fn step_forward(&mut self) {
        let IterState::Valid { leaf, index } = self.state else {
            panic!("step_forward on a non-valid iterator");
        };

        // SAFETY: shared latch held on `leaf`.
        let leaf_node = unsafe { leaf.as_leaf() };
        if index + 1 < leaf_node.len() {
            self.state = IterState::Valid {
                leaf,
                index: index + 1,
            };
            return;
        }

        match leaf_node.next() {
            None => {
                leaf.unlock_shared();
                self.state = IterState::End;
            }
            Some(next) => {
                if next.try_lock_shared() {
                    leaf.unlock_shared();
                    self.state = IterState::Valid {
                        leaf: next,
                        index: 0,
                    };
                } else {
                    leaf.unlock_shared();
                    trace_log!("right sibling contended, iterator must retry");
                    self.state = IterState::Retry;
                }
            }
        }
    }

    /// Retreat to the previous entry in key order.
    ///
    /// Stepping before the first entry yields `REnd`; a contended left
    /// sibling yields `Retry`.
    ///
    /// # Panics
    ///
    /// Panics when the iterator is not `Valid`.
    pub fn step_backward(&mut self) {
        let IterState::Valid { leaf, index } = self.state else {
            panic!("step_backward on a non-valid iterator");
        };

        if index > 0 {
            self.state = IterState::Valid {
                leaf,
                index: index - 1,
            };
            return;
        }

        // SAFETY: shared latch held on `leaf`.
        match unsafe { leaf.as_leaf() }.prev() {
            None => {
                leaf.unlock_shared();
                self.state = IterState::REnd;
            }
            Some(prev) => {
                if prev.try_lock_shared() {
                    leaf.unlock_shared();
                    // SAFETY: shared latch just acquired on `prev`.
                    let last = unsafe { prev.as_leaf() }.len() - 1;
                    self.state = IterState::Valid {
                        leaf: prev,
                        index: last,
                    };
                } else {
                    leaf.unlock_shared();
                    trace_log!("left sibling contended, iterator must retry");
                    self.state = IterState::Retry;
                }
            }
        }
    }
}

impl Default for TreeIterator<'_> {
    fn default() -> Self {
        Self {
            state: IterState::Invalid,
            _tree: PhantomData,
        }
    }
}

impl PartialEq for TreeIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.state, &other.state) {
            (
                IterState::Valid { leaf: a, index: i },
                IterState::Valid { leaf: b, index: j },
            ) => a == b && i == j,
            (IterState::End, IterState::End)
            | (IterState::REnd, IterState::REnd)
            | (IterState::Retry, IterState::Retry)
            | (IterState::Invalid, IterState::Invalid) => true,
            _ => false,
        }
    }
}

impl Eq for TreeIterator<'_> {}

impl Drop for TreeIterator<'_> {
    fn drop(&mut self) {
        if let IterState::Valid { leaf, .. } = self.state {
            leaf.unlock_shared();
        }
    }
}

impl StdFmt::Debug for TreeIterator<'_> {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self.state {
            IterState::Valid { leaf, index } => f
                .debug_struct("TreeIterator")
                .field("leaf", &leaf)
                .field("index", &index)
                .finish(),
            IterState::End => f.write_str("TreeIterator::End"),
            IterState::REnd => f.write_str("TreeIterator::REnd"),
            IterState::Retry => f.write_str("TreeIterator::Retry"),
            IterState::Invalid => f.write_str("TreeIterator::Invalid"),
        }
    }
}

// ============================================================================
//  Construction
// ============================================================================

impl BPlusTree {
    /// Iterator on the first entry, or `End` for an empty tree.
    #[must_use]
    pub fn begin(&self) -> TreeIterator<'_> {
        match self.find_edge_leaf(true) {
            None => TreeIterator::end(),
            Some(leaf) => TreeIterator::valid(leaf, 0),
        }
    }

    /// Iterator on the last entry, or `REnd` for an empty tree.
    #[must_use]
    pub fn rbegin(&self) -> TreeIterator<'_> {
        match self.find_edge_leaf(false) {
            None => TreeIterator::rend(),
            Some(leaf) => {
                // SAFETY: shared latch held on `leaf`; a reachable leaf is
                // never empty.
                let last = unsafe { leaf.as_leaf() }.len() - 1;
                TreeIterator::valid(leaf, last)
            }
        }
    }

    /// The past-the-end iterator.
    #[must_use]
    pub fn end(&self) -> TreeIterator<'_> {
        TreeIterator::end()
    }

    /// The before-the-beginning iterator.
    #[must_use]
    pub fn rend(&self) -> TreeIterator<'_> {
        TreeIterator::rend()
    }

    /// The retry sentinel, for comparing against a contended iterator.
    #[must_use]
    pub fn retry(&self) -> TreeIterator<'_> {
        TreeIterator::retry()
    }
}
