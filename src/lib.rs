//! Ordered, keyed n-ary trees backed by a generational arena.
//!
//! Each node carries an immutable key, an opaque value, and navigable links
//! to its parent, adjacent siblings, and first/last child. Child order is
//! represented twice: a doubly-linked sibling chain for ordered traversal
//! and a per-node key index for O(1) lookup. [`NodeArena`] owns all nodes
//! and keeps both representations consistent under `add`, `insert`, and
//! `remove`; on a precondition failure it raises the single
//! [`TreeError::InvalidOperation`] kind without partial mutation.
//!
//! A root is simply a node without a parent. One arena may hold any number
//! of disjoint trees and detached subtrees; `remove` disconnects a subtree
//! without destroying it, and `reclaim` frees a detached subtree explicitly.

pub mod arena;
pub mod errors;
pub mod key;
pub mod util;

pub use arena::{Children, Node, NodeArena};
pub use errors::{TreeError, TreeResult};
pub use key::Key;
