//! # bplustree
//!
//! A concurrent, in-memory B+Tree index over 32-bit signed integer keys and
//! values, synchronized with latch crabbing.
//!
//! ## Design
//!
//! - Every node carries its own reader/writer latch; a tree-level latch
//!   protects the root pointer itself.
//! - Readers crab downward with shared latches, holding at most a parent and
//!   a child at any moment.
//! - Writers first run an optimistic pass (shared descent, exclusive latch
//!   only on the target leaf) and fall back to a pessimistic pass (exclusive
//!   descent with a held-latch stack) when the leaf would split or underflow.
//!   Safe interior nodes release every ancestor latch early.
//! - Leaves form a doubly linked chain; iterators move sideways with
//!   hand-over-hand shared latching and report `Retry` instead of blocking
//!   when a sibling latch cannot be acquired.
//!
//! ## Example
//!
//! ```
//! use bplustree::BPlusTree;
//!
//! let tree = BPlusTree::new(8, 8).unwrap();
//! assert!(tree.insert(1, 10));
//! assert!(!tree.insert(1, 20)); // duplicate keys are rejected
//! assert_eq!(tree.get(1), Some(10));
//! assert!(tree.delete(1));
//! assert_eq!(tree.get(1), None);
//! ```

mod internode;
mod latch;
mod leaf;
mod node;
mod tracing_helpers;
mod tree;

pub use node::{Key, Value};
pub use tree::{BPlusTree, ConfigError, TreeIterator};
