use generational_arena::{Arena, Index};
use std::collections::HashMap;
use tracing::instrument;

use crate::errors::{TreeError, TreeResult};
use crate::key::Key;

/// Keyed tree node stored in a [`NodeArena`].
///
/// Child order is held twice: a doubly-linked sibling chain for ordered
/// traversal and a key index for O(1) membership and lookup. Structural
/// operations on the arena update both together; on a precondition failure
/// neither is touched.
#[derive(Debug)]
pub struct Node<V> {
    /// Lookup key, immutable after construction
    key: Key,
    /// Opaque payload, never inspected by tree logic
    value: V,
    /// Handle of the owning node, None for roots and detached nodes
    parent: Option<Index>,
    /// Adjacent siblings within the parent's chain, None at the ends
    previous: Option<Index>,
    next: Option<Index>,
    /// Head and tail of this node's own sibling chain
    first_child: Option<Index>,
    last_child: Option<Index>,
    /// Key index over direct children
    children: HashMap<Key, Index>,
}

impl<V> Node<V> {
    fn new(key: Key, value: V) -> Self {
        Self {
            key,
            value,
            parent: None,
            previous: None,
            next: None,
            first_child: None,
            last_child: None,
            children: HashMap::new(),
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn parent(&self) -> Option<Index> {
        self.parent
    }

    pub fn previous(&self) -> Option<Index> {
        self.previous
    }

    pub fn next(&self) -> Option<Index> {
        self.next
    }

    pub fn first_child(&self) -> Option<Index> {
        self.first_child
    }

    /// Tail of the sibling chain: the unique child with no `next`.
    pub fn last_child(&self) -> Option<Index> {
        self.last_child
    }

    /// Number of entries in the key index.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Looks up a direct child by key.
    pub fn child<K: Into<Key>>(&self, key: K) -> Option<Index> {
        self.children.get(&key.into()).copied()
    }

    /// Key-presence test against the child index.
    pub fn contains_key<K: Into<Key>>(&self, key: K) -> bool {
        self.children.contains_key(&key.into())
    }
}

/// Arena-based storage for ordered, keyed tree nodes.
///
/// Uses a generational arena for memory-safe node handles and O(1) lookups.
/// A root is simply a node without a parent; one arena may hold any number
/// of disjoint trees and detached subtrees. Handles of reclaimed nodes read
/// as absent rather than aliasing later allocations.
#[derive(Debug)]
pub struct NodeArena<V> {
    /// Arena storage for all nodes
    arena: Arena<Node<V>>,
}

impl<V> Default for NodeArena<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> NodeArena<V> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
        }
    }

    /// Allocates a detached node: no parent, no siblings, no children.
    ///
    /// Integer keys stay integers; other inputs are coerced to their string
    /// form by the [`Key`] conversions. Cannot fail.
    #[instrument(level = "trace", skip(self, key, value))]
    pub fn create_node<K: Into<Key>>(&mut self, key: K, value: V) -> Index {
        self.arena.insert(Node::new(key.into(), value))
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get(&self, idx: Index) -> Option<&Node<V>> {
        self.arena.get(idx)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get_mut(&mut self, idx: Index) -> Option<&mut Node<V>> {
        self.arena.get_mut(idx)
    }

    /// Number of live nodes across all trees held by the arena.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    /// Appends `node` as the new last child of `parent`.
    ///
    /// Fails if `node` is already a child of `parent`, its key collides with
    /// an existing child key, or it is attached to another parent.
    #[instrument(level = "trace", skip(self))]
    pub fn add(&mut self, parent: Index, node: Index) -> TreeResult<()> {
        if parent == node {
            return Err(TreeError::InvalidOperation(
                "cannot add node: node cannot be its own child".to_string(),
            ));
        }
        let (key, attached) = {
            let child = self.node_ref(node, "add")?;
            (child.key.clone(), child.parent.is_some())
        };
        let last = {
            let parent_node = self.node_ref(parent, "add")?;
            match parent_node.children.get(&key) {
                Some(&existing) if existing == node => {
                    return Err(TreeError::InvalidOperation(
                        "cannot add node: node already added".to_string(),
                    ));
                }
                Some(_) => {
                    return Err(TreeError::InvalidOperation(format!(
                        "cannot add node: key already in use: {}",
                        key
                    )));
                }
                None => {}
            }
            parent_node.last_child
        };
        if attached {
            return Err(TreeError::InvalidOperation(
                "cannot add node: node is attached to another parent".to_string(),
            ));
        }

        // Preconditions hold; update chain and index together.
        if let Some(last_idx) = last {
            if let Some(last_node) = self.arena.get_mut(last_idx) {
                last_node.next = Some(node);
            }
        }
        if let Some(child) = self.arena.get_mut(node) {
            child.previous = last;
            child.next = None;
            child.parent = Some(parent);
        }
        if let Some(parent_node) = self.arena.get_mut(parent) {
            if last.is_none() {
                parent_node.first_child = Some(node);
            }
            parent_node.last_child = Some(node);
            parent_node.children.insert(key, node);
        }
        Ok(())
    }

    /// Splices `node` immediately before the existing child `before`.
    ///
    /// `before` must be a member of `parent`; `node` must be detached and
    /// its key free among `parent`'s children.
    #[instrument(level = "trace", skip(self))]
    pub fn insert(&mut self, parent: Index, before: Index, node: Index) -> TreeResult<()> {
        if parent == node {
            return Err(TreeError::InvalidOperation(
                "cannot insert node: node cannot be its own child".to_string(),
            ));
        }
        let (before_key, previous) = {
            let before_node = self.node_ref(before, "insert")?;
            (before_node.key.clone(), before_node.previous)
        };
        let (key, attached) = {
            let child = self.node_ref(node, "insert")?;
            (child.key.clone(), child.parent.is_some())
        };
        {
            let parent_node = self.node_ref(parent, "insert")?;
            if parent_node.children.get(&before_key) != Some(&before) {
                return Err(TreeError::InvalidOperation(
                    "cannot insert node: before is not a member of this node".to_string(),
                ));
            }
            if parent_node.children.contains_key(&key) {
                return Err(TreeError::InvalidOperation(format!(
                    "cannot insert node: key already in use: {}",
                    key
                )));
            }
        }
        if attached {
            return Err(TreeError::InvalidOperation(
                "cannot insert node: node is attached to another parent".to_string(),
            ));
        }

        if let Some(prev_idx) = previous {
            if let Some(prev_node) = self.arena.get_mut(prev_idx) {
                prev_node.next = Some(node);
            }
        } else if let Some(parent_node) = self.arena.get_mut(parent) {
            parent_node.first_child = Some(node);
        }
        if let Some(before_node) = self.arena.get_mut(before) {
            before_node.previous = Some(node);
        }
        if let Some(child) = self.arena.get_mut(node) {
            child.previous = previous;
            child.next = Some(before);
            child.parent = Some(parent);
        }
        if let Some(parent_node) = self.arena.get_mut(parent) {
            parent_node.children.insert(key, node);
        }
        Ok(())
    }

    /// Detaches `node` from `parent`.
    ///
    /// The node's own children are untouched: a removed subtree stays intact
    /// in the arena, merely disconnected from its former parent.
    #[instrument(level = "trace", skip(self))]
    pub fn remove(&mut self, parent: Index, node: Index) -> TreeResult<()> {
        let key = self.node_ref(node, "remove")?.key.clone();
        {
            let parent_node = self.node_ref(parent, "remove")?;
            if parent_node.children.get(&key) != Some(&node) {
                return Err(TreeError::InvalidOperation(
                    "cannot remove node: not a member of this node".to_string(),
                ));
            }
        }
        let (previous, next) = {
            let child = self.node_ref(node, "remove")?;
            (child.previous, child.next)
        };

        if let Some(next_idx) = next {
            if let Some(next_node) = self.arena.get_mut(next_idx) {
                next_node.previous = previous;
            }
        }
        if let Some(prev_idx) = previous {
            if let Some(prev_node) = self.arena.get_mut(prev_idx) {
                prev_node.next = next;
            }
        }
        if let Some(child) = self.arena.get_mut(node) {
            child.previous = None;
            child.next = None;
            child.parent = None;
        }
        if let Some(parent_node) = self.arena.get_mut(parent) {
            if parent_node.first_child == Some(node) {
                parent_node.first_child = next;
            }
            if parent_node.last_child == Some(node) {
                parent_node.last_child = previous;
            }
            parent_node.children.remove(&key);
        }
        Ok(())
    }

    /// Looks up a direct child of `parent` by key and detaches it, returning
    /// the detached handle.
    #[instrument(level = "trace", skip(self, key))]
    pub fn remove_by_key<K: Into<Key>>(&mut self, parent: Index, key: K) -> TreeResult<Index> {
        let key = key.into();
        let node = {
            let parent_node = self.node_ref(parent, "remove")?;
            parent_node.children.get(&key).copied().ok_or_else(|| {
                TreeError::InvalidOperation(format!(
                    "cannot remove node: no child with key: {}",
                    key
                ))
            })?
        };
        self.remove(parent, node)?;
        Ok(node)
    }

    /// Membership test against `parent`'s child index.
    ///
    /// Key equality only: a different node sharing a member's key reads as
    /// present. Stale handles read as absent.
    #[instrument(level = "trace", skip(self))]
    pub fn has(&self, parent: Index, node: Index) -> bool {
        match (self.arena.get(parent), self.arena.get(node)) {
            (Some(parent_node), Some(child)) => parent_node.children.contains_key(&child.key),
            _ => false,
        }
    }

    /// Iterates the direct children of `parent` in sibling order.
    ///
    /// Each call starts a fresh traversal from the current first child, so
    /// re-entering iteration reflects structural changes made since a
    /// previous pass. One level only; grandchildren are reached by iterating
    /// the children themselves.
    #[instrument(level = "trace", skip(self))]
    pub fn children(&self, parent: Index) -> Children<'_, V> {
        Children::new(self, parent)
    }

    /// Frees a detached node and every node in its subtree, returning the
    /// number of nodes removed from the arena.
    ///
    /// Fails if the node is still attached to a parent. Handles to freed
    /// nodes read as absent afterwards.
    #[instrument(level = "debug", skip(self))]
    pub fn reclaim(&mut self, node: Index) -> TreeResult<usize> {
        if self.node_ref(node, "reclaim")?.parent.is_some() {
            return Err(TreeError::InvalidOperation(
                "cannot reclaim node: node is attached to a parent".to_string(),
            ));
        }

        let mut stack = vec![node];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.arena.remove(current) {
                stack.extend(removed.children.into_values());
                freed += 1;
            }
        }
        Ok(freed)
    }

    fn node_ref(&self, idx: Index, op: &str) -> TreeResult<&Node<V>> {
        self.arena.get(idx).ok_or_else(|| {
            TreeError::InvalidOperation(format!("cannot {} node: unknown node handle", op))
        })
    }
}

pub struct Children<'a, V> {
    arena: &'a NodeArena<V>,
    cursor: Option<Index>,
}

impl<'a, V> Children<'a, V> {
    #[instrument(level = "trace", skip(arena))]
    fn new(arena: &'a NodeArena<V>, parent: Index) -> Self {
        let cursor = arena.arena.get(parent).and_then(|node| node.first_child);
        Self { arena, cursor }
    }
}

impl<'a, V> Iterator for Children<'a, V> {
    type Item = (Index, &'a Node<V>);

    #[instrument(level = "trace", skip(self))]
    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        if let Some(node) = self.arena.arena.get(current) {
            self.cursor = node.next;
            return Some((current, node));
        }
        None
    }
}
