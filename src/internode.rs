//! Inner (routing) node: a low child plus ordered separators.
//!
//! An inner node with `k` separators routes over `k + 1` children. The
//! leftmost child sits outside the separator sequence as the "low child":
//! it covers every key below the first separator. Storing it separately
//! means the separator array never carries an invalid first key, which keeps
//! search, split and merge code free of index-0 special cases.
//!
//! Routing rule: a search key descends into the child at the separator equal
//! to it, if present; into the low child when every separator is strictly
//! greater; otherwise into the child just before the first greater separator.

use crate::node::{Key, NodeHeader, NodeKind, NodeRef};

#[repr(C)]
pub struct InnerNode {
    header: NodeHeader,
    max_size: usize,
    low_child: NodeRef,
    separators: Vec<(Key, NodeRef)>,
}

// The type-erased casts in node.rs rely on the header being first.
const _: () = assert!(std::mem::offset_of!(InnerNode, header) == 0);

impl InnerNode {
    pub fn alloc(max_size: usize, low_child: NodeRef) -> Box<Self> {
        Box::new(Self {
            header: NodeHeader::new(NodeKind::Inner),
            max_size,
            low_child,
            separators: Vec::with_capacity(max_size),
        })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.separators.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.separators.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.separators.len() >= self.max_size
    }

    /// Minimum separators in a non-root inner node.
    ///
    /// With fanout `N = max_size + 1` child pointers, the textbook minimum
    /// is `ceil(N / 2)` pointers, hence `ceil(N / 2) - 1` separators.
    #[inline]
    #[must_use]
    pub fn min_size(&self) -> usize {
        (self.max_size + 1).div_ceil(2) - 1
    }

    #[inline]
    #[must_use]
    pub fn low_child(&self) -> NodeRef {
        self.low_child
    }

    #[inline]
    pub fn set_low_child(&mut self, child: NodeRef) {
        self.low_child = child;
    }

    #[inline]
    #[must_use]
    pub fn separator_key(&self, index: usize) -> Key {
        self.separators[index].0
    }

    #[inline]
    pub fn set_separator_key(&mut self, index: usize, key: Key) {
        self.separators[index].0 = key;
    }

    #[inline]
    #[must_use]
    pub fn child_at(&self, index: usize) -> NodeRef {
        self.separators[index].1
    }

    // ========================================================================
    //  Search
    // ========================================================================

    /// Position of the first separator with key >= `key`, or `len()`.
    #[must_use]
    pub fn lower_bound(&self, key: Key) -> usize {
        self.separators.partition_point(|&(k, _)| k < key)
    }

    /// Which child a search for `key` descends into: `None` for the low
    /// child, `Some(i)` for the child of separator `i`.
    #[must_use]
    pub fn pivot_index(&self, key: Key) -> Option<usize> {
        let idx = self.lower_bound(key);
        if idx < self.separators.len() && self.separators[idx].0 == key {
            Some(idx)
        } else if idx == 0 {
            None
        } else {
            Some(idx - 1)
        }
    }

    /// The child reference a search for `key` descends into.
    #[must_use]
    pub fn find_pivot(&self, key: Key) -> NodeRef {
        match self.pivot_index(key) {
            None => self.low_child,
            Some(i) => self.separators[i].1,
        }
    }

    /// The sibling immediately left of the pivot child for `key`, together
    /// with the index of the separator between them (the separator whose
    /// child is the pivot). `None` iff the pivot is the low child.
    #[must_use]
    pub fn previous_sibling_with_separator(&self, key: Key) -> Option<(NodeRef, usize)> {
        match self.pivot_index(key) {
            None => None,
            Some(0) => Some((self.low_child, 0)),
            Some(i) => Some((self.separators[i - 1].1, i)),
        }
    }

    /// The sibling immediately right of the pivot child for `key`, together
    /// with the index of the separator between them (the separator whose
    /// child is that sibling). `None` iff the pivot is the last child.
    #[must_use]
    pub fn next_sibling_with_separator(&self, key: Key) -> Option<(NodeRef, usize)> {
        match self.pivot_index(key) {
            None => self.separators.first().map(|&(_, child)| (child, 0)),
            Some(i) if i + 1 < self.separators.len() => {
                Some((self.separators[i + 1].1, i + 1))
            }
            Some(_) => None,
        }
    }

    // ========================================================================
    //  Mutation
    // ========================================================================

    /// Insert at `pos`, keeping order. Returns false when the node is full.
    pub fn insert_at(&mut self, pos: usize, separator: (Key, NodeRef)) -> bool {
        if self.separators.len() >= self.max_size {
            return false;
        }
        self.separators.insert(pos, separator);
        true
    }

    pub fn remove_at(&mut self, pos: usize) -> (Key, NodeRef) {
        self.separators.remove(pos)
    }

    pub fn pop_first(&mut self) -> (Key, NodeRef) {
        self.separators.remove(0)
    }

    pub fn pop_last(&mut self) -> (Key, NodeRef) {
        let last = self.separators.len() - 1;
        self.separators.remove(last)
    }

    /// Split a full inner node.
    ///
    /// The left (self) first retains `ceil(max_size / 2)` separators, then
    /// lifts its rightmost retained separator out: the lifted key is
    /// returned for insertion into the parent, and the lifted child seeds
    /// the new right sibling's low child. The remaining upper separators
    /// populate the right sibling.
    pub fn split(&mut self) -> (Key, Box<InnerNode>) {
        debug_assert!(self.is_full(), "split on an inner node that is not full");

        let retain = self.separators.len().div_ceil(2);
        let (lifted_key, lifted_child) = self.separators[retain - 1];

        let mut right = InnerNode::alloc(self.max_size, lifted_child);
        right.separators.extend(self.separators.drain(retain..));
        self.separators.truncate(retain - 1);

        (lifted_key, right)
    }

    /// Append every separator of `other`. The caller has already folded
    /// `other`'s low child in under the parent separator, and unlinks and
    /// frees `other`.
    pub fn merge_from(&mut self, other: &mut InnerNode) {
        debug_assert!(
            self.separators.len() + other.separators.len() <= self.max_size,
            "merged inner nodes exceed fanout"
        );
        self.separators.append(&mut other.separators);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::LeafNode;

    struct Fixture {
        node: Box<InnerNode>,
        children: Vec<NodeRef>,
    }

    impl Fixture {
        /// Inner node with separators `keys` and one leaf child per slot
        /// (low child included).
        fn new(max_size: usize, keys: &[Key]) -> Self {
            let mut children = Vec::new();
            let low = NodeRef::from_leaf(LeafNode::alloc(4));
            children.push(low);

            let mut node = InnerNode::alloc(max_size, low);
            for &k in keys {
                let child = NodeRef::from_leaf(LeafNode::alloc(4));
                children.push(child);
                let pos = node.lower_bound(k);
                assert!(node.insert_at(pos, (k, child)));
            }
            Self { node, children }
        }

        /// Child as positioned in the fixture: 0 = low child, i = child of
        /// separator i - 1.
        fn child(&self, slot: usize) -> NodeRef {
            self.children[slot]
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            for &child in &self.children {
                // SAFETY: test-local nodes, no aliases.
                unsafe { child.free() };
            }
        }
    }

    #[test]
    fn test_find_pivot() {
        let f = Fixture::new(4, &[10, 20, 30]);

        // below every separator: low child
        assert_eq!(f.node.pivot_index(5), None);
        assert_eq!(f.node.find_pivot(5), f.child(0));
        // exact separator hit
        assert_eq!(f.node.pivot_index(20), Some(1));
        assert_eq!(f.node.find_pivot(20), f.child(2));
        // between separators: child before the first greater separator
        assert_eq!(f.node.pivot_index(25), Some(1));
        // beyond every separator: last child
        assert_eq!(f.node.pivot_index(99), Some(2));
        assert_eq!(f.node.find_pivot(99), f.child(3));
    }

    #[test]
    fn test_previous_sibling_with_separator() {
        let f = Fixture::new(4, &[10, 20, 30]);

        // pivot is the low child: no previous
        assert_eq!(f.node.previous_sibling_with_separator(5), None);
        // pivot is the first separator child: previous is the low child
        assert_eq!(
            f.node.previous_sibling_with_separator(15),
            Some((f.child(0), 0))
        );
        assert_eq!(
            f.node.previous_sibling_with_separator(25),
            Some((f.child(1), 1))
        );
        assert_eq!(
            f.node.previous_sibling_with_separator(99),
            Some((f.child(2), 2))
        );
    }

    #[test]
    fn test_next_sibling_with_separator() {
        let f = Fixture::new(4, &[10, 20, 30]);

        // pivot is the low child: next is the first separator child
        assert_eq!(f.node.next_sibling_with_separator(5), Some((f.child(1), 0)));
        assert_eq!(
            f.node.next_sibling_with_separator(15),
            Some((f.child(2), 1))
        );
        // pivot is the last child: no next
        assert_eq!(f.node.next_sibling_with_separator(99), None);
    }

    #[test]
    fn test_split_lifts_rightmost_retained_separator() {
        let f = Fixture::new(3, &[10, 20, 30]);
        let mut node = InnerNode::alloc(3, f.child(0));
        for i in 0..3 {
            assert!(node.insert_at(i, (f.node.separator_key(i), f.node.child_at(i))));
        }

        let (lifted, right) = node.split();

        // retain ceil(3/2) = 2, then lift the second separator
        assert_eq!(lifted, 20);
        assert_eq!(node.len(), 1);
        assert_eq!(node.separator_key(0), 10);
        // the lifted child becomes the right sibling's low child
        assert_eq!(right.low_child(), f.child(2));
        assert_eq!(right.len(), 1);
        assert_eq!(right.separator_key(0), 30);
        assert_eq!(right.child_at(0), f.child(3));
    }

    #[test]
    fn test_merge_appends_separators() {
        let left_f = Fixture::new(4, &[10]);
        let right_f = Fixture::new(4, &[30, 40]);

        let mut left = InnerNode::alloc(4, left_f.child(0));
        assert!(left.insert_at(0, (10, left_f.child(1))));
        let mut right = InnerNode::alloc(4, right_f.child(0));
        assert!(right.insert_at(0, (30, right_f.child(1))));
        assert!(right.insert_at(1, (40, right_f.child(2))));

        // fold the right node's low child in under the parent separator
        let end = left.len();
        assert!(left.insert_at(end, (20, right.low_child())));
        left.merge_from(&mut right);

        assert_eq!(left.len(), 4);
        assert_eq!(
            (0..left.len()).map(|i| left.separator_key(i)).collect::<Vec<_>>(),
            vec![10, 20, 30, 40]
        );
        assert!(right.is_empty());
    }

    #[test]
    fn test_min_size() {
        let f = Fixture::new(3, &[]);
        assert_eq!(f.node.min_size(), 1);

        let f = Fixture::new(4, &[]);
        assert_eq!(f.node.min_size(), 2);

        let f = Fixture::new(5, &[]);
        assert_eq!(f.node.min_size(), 2);
    }
}
