//! Type-erased node handles.
//!
//! Both node types begin with a [`NodeHeader`] as their first field
//! (`#[repr(C)]`), so a pointer to either can be read through the header to
//! learn its kind, then narrow-cast to the concrete type. This replaces
//! virtual dispatch with an explicit kind tag.
//!
//! A [`NodeRef`] is a non-null, type-erased handle. Child references held by
//! an inner node are owning (the parent frees the child when it removes it);
//! leaf sibling references are non-owning back references.

use std::ptr::NonNull;

use crate::internode::InnerNode;
use crate::latch::SharedLatch;
use crate::leaf::LeafNode;

/// Key type stored in the tree. Keys are unique.
pub type Key = i32;

/// Value type stored in the tree.
pub type Value = i32;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeKind {
    Inner,
    Leaf,
}

/// Common first field of both node types.
#[repr(C)]
pub struct NodeHeader {
    kind: NodeKind,
    latch: SharedLatch,
}

impl NodeHeader {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            latch: SharedLatch::new(),
        }
    }
}

/// Non-null, type-erased handle to a heap-allocated node.
///
/// `NodeRef` is `Copy` and carries no lifetime; validity is guaranteed by the
/// latching protocol: a node is only freed while it is unreachable (unlinked
/// from its parent and the leaf chain, with the unlinking done under
/// exclusive latches).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NodeRef(NonNull<NodeHeader>);

impl NodeRef {
    pub fn from_leaf(leaf: Box<LeafNode>) -> Self {
        let ptr = Box::into_raw(leaf);
        // SAFETY: Box::into_raw never returns null.
        Self(unsafe { NonNull::new_unchecked(ptr.cast::<NodeHeader>()) })
    }

    pub fn from_inner(inner: Box<InnerNode>) -> Self {
        let ptr = Box::into_raw(inner);
        // SAFETY: Box::into_raw never returns null.
        Self(unsafe { NonNull::new_unchecked(ptr.cast::<NodeHeader>()) })
    }

    pub fn from_ptr(ptr: *mut NodeHeader) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut NodeHeader {
        self.0.as_ptr()
    }

    #[inline]
    fn header<'a>(self) -> &'a NodeHeader {
        // SAFETY: a NodeRef always points at a live node (see type docs).
        unsafe { self.0.as_ref() }
    }

    #[inline]
    #[must_use]
    pub fn kind(self) -> NodeKind {
        self.header().kind
    }

    #[inline]
    #[must_use]
    pub fn is_leaf(self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    // ========================================================================
    //  Latch operations
    // ========================================================================

    #[inline]
    pub fn lock_shared(self) {
        self.header().latch.lock_shared();
    }

    #[inline]
    pub fn try_lock_shared(self) -> bool {
        self.header().latch.try_lock_shared()
    }

    #[inline]
    pub fn unlock_shared(self) {
        self.header().latch.unlock_shared();
    }

    #[inline]
    pub fn lock_exclusive(self) {
        self.header().latch.lock_exclusive();
    }

    #[inline]
    pub fn unlock_exclusive(self) {
        self.header().latch.unlock_exclusive();
    }

    // ========================================================================
    //  Narrow casts
    // ========================================================================

    /// # Safety
    ///
    /// The node must be a leaf, and the caller must hold a latch on it (or
    /// otherwise have exclusive access, e.g. during teardown).
    #[inline]
    pub unsafe fn as_leaf<'a>(self) -> &'a LeafNode {
        debug_assert!(self.is_leaf(), "as_leaf on an inner node");
        // SAFETY: LeafNode is #[repr(C)] with NodeHeader first; kind checked.
        unsafe { &*self.0.as_ptr().cast::<LeafNode>() }
    }

    /// # Safety
    ///
    /// The node must be a leaf and the caller must hold its exclusive latch.
    /// The returned reference must be dropped before any other reference to
    /// the same node is created (including through the latch operations).
    #[inline]
    pub unsafe fn as_leaf_mut<'a>(self) -> &'a mut LeafNode {
        debug_assert!(self.is_leaf(), "as_leaf_mut on an inner node");
        // SAFETY: see as_leaf; exclusivity per the caller contract.
        unsafe { &mut *self.0.as_ptr().cast::<LeafNode>() }
    }

    /// # Safety
    ///
    /// The node must be an inner node, and the caller must hold a latch on
    /// it (or otherwise have exclusive access).
    #[inline]
    pub unsafe fn as_inner<'a>(self) -> &'a InnerNode {
        debug_assert!(!self.is_leaf(), "as_inner on a leaf node");
        // SAFETY: InnerNode is #[repr(C)] with NodeHeader first; kind checked.
        unsafe { &*self.0.as_ptr().cast::<InnerNode>() }
    }

    /// # Safety
    ///
    /// The node must be an inner node and the caller must hold its exclusive
    /// latch. Same aliasing rule as [`NodeRef::as_leaf_mut`].
    #[inline]
    pub unsafe fn as_inner_mut<'a>(self) -> &'a mut InnerNode {
        debug_assert!(!self.is_leaf(), "as_inner_mut on a leaf node");
        // SAFETY: see as_inner; exclusivity per the caller contract.
        unsafe { &mut *self.0.as_ptr().cast::<InnerNode>() }
    }

    // ========================================================================
    //  Deallocation
    // ========================================================================

    /// Free this node only.
    ///
    /// # Safety
    ///
    /// The node must be unreachable: unlinked from its parent and from the
    /// leaf sibling chain, with no latch held on it and no thread able to
    /// reach it anymore.
    pub unsafe fn free(self) {
        match self.kind() {
            // SAFETY: allocated via Box in from_leaf/from_inner; kind checked.
            NodeKind::Leaf => drop(unsafe { Box::from_raw(self.0.as_ptr().cast::<LeafNode>()) }),
            NodeKind::Inner => drop(unsafe { Box::from_raw(self.0.as_ptr().cast::<InnerNode>()) }),
        }
    }

    /// Free the whole subtree rooted at this node, children first.
    ///
    /// # Safety
    ///
    /// Same as [`NodeRef::free`], for every node in the subtree. Intended
    /// for tree teardown, where `&mut` access guarantees quiescence.
    pub unsafe fn free_subtree(self) {
        if self.kind() == NodeKind::Inner {
            // SAFETY: teardown holds exclusive access to the whole tree.
            let inner = unsafe { self.as_inner() };
            unsafe { inner.low_child().free_subtree() };
            for i in 0..inner.len() {
                unsafe { inner.child_at(i).free_subtree() };
            }
        }
        // SAFETY: children are gone; this node is last.
        unsafe { self.free() }
    }
}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NodeRef")
            .field(&self.kind())
            .field(&self.0.as_ptr())
            .finish()
    }
}
