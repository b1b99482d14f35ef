//! Dependency Bookkeeping
//!
//! [`DependencyGraph`] owns the upstream and downstream adjacency for every
//! id the engine knows about. It does not know about formula functions or
//! cached values; it only answers "who reads from whom".
//!
//! # Invariants
//!
//! 1. For every derived node `d` and every `u` in `d.upstreams`, `u` has a
//!    node and `d` is in `u.downstreams`.
//! 2. Following upstream edges from any node never returns to it.
//! 3. The root node always exists and is never derived.

use std::collections::{HashMap, HashSet, VecDeque};

use super::node::{FormulaId, Node, Upstreams};
use crate::error::{EngineError, Result};

/// The dependency graph for one engine.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// All nodes in the graph, indexed by ID.
    nodes: HashMap<FormulaId, Node>,
}

impl DependencyGraph {
    /// Create a graph containing only the root state node.
    pub fn new() -> Self {
        let root = FormulaId::root();
        let mut nodes = HashMap::new();
        nodes.insert(root.clone(), Node::source(root));
        Self { nodes }
    }

    /// Register `id` as reading from `upstreams`.
    ///
    /// Any previous registration of `id` is unlinked first, so upstreams the
    /// new definition no longer uses stop listing `id` as a downstream.
    /// Fails without touching the graph if `id` is the root or if the new
    /// upstreams would make `id` depend on itself.
    pub fn link(&mut self, id: &FormulaId, upstreams: Upstreams) -> Result<()> {
        if id.is_root() {
            return Err(EngineError::ReservedId(id.clone()));
        }
        if let Some(path) = self.path_to(&upstreams, id) {
            return Err(EngineError::Cycle {
                id: id.clone(),
                path,
            });
        }

        self.unlink(id);

        for upstream in &upstreams {
            self.nodes
                .entry(upstream.clone())
                .or_insert_with(|| Node::source(upstream.clone()))
                .add_downstream(id.clone());
        }
        self.nodes
            .entry(id.clone())
            .or_insert_with(|| Node::source(id.clone()))
            .derive_from(upstreams);

        Ok(())
    }

    /// Drop the registration of `id`.
    ///
    /// `id` is removed from each former upstream's downstream list. Its own
    /// downstreams keep pointing at it, so the node survives as a source
    /// while anything still reads from it. Returns the former upstreams, or
    /// `None` if `id` was not derived.
    pub fn unlink(&mut self, id: &FormulaId) -> Option<Upstreams> {
        let node = self.nodes.get_mut(id)?;
        if !node.is_derived() {
            return None;
        }
        let former = node.make_source();
        let orphaned = node.is_orphan();

        for upstream in &former {
            if let Some(up) = self.nodes.get_mut(upstream) {
                up.remove_downstream(id);
            }
            self.prune(upstream);
        }
        if orphaned {
            self.nodes.remove(id);
        }

        Some(former)
    }

    /// Remove a placeholder node that nothing reads from anymore.
    fn prune(&mut self, id: &FormulaId) {
        if id.is_root() {
            return;
        }
        if self.nodes.get(id).is_some_and(Node::is_orphan) {
            self.nodes.remove(id);
        }
    }

    /// Walk upstream edges from `starts` looking for `target`.
    ///
    /// Returns the walk from the first start that reaches it, ending in
    /// `target`. Only a node something already reads from can be reached,
    /// so a fresh id costs nothing.
    fn path_to(&self, starts: &[FormulaId], target: &FormulaId) -> Option<Vec<FormulaId>> {
        let read_from = self
            .nodes
            .get(target)
            .is_some_and(|node| !node.downstreams().is_empty());
        if !read_from && !starts.contains(target) {
            return None;
        }

        let mut parents: HashMap<FormulaId, Option<FormulaId>> = HashMap::new();
        let mut stack = Vec::with_capacity(starts.len());
        for start in starts.iter().rev() {
            parents.entry(start.clone()).or_insert(None);
            stack.push(start.clone());
        }

        while let Some(current) = stack.pop() {
            if &current == target {
                let mut cursor = parents.get(&current).cloned().flatten();
                let mut path = vec![current];
                while let Some(parent) = cursor {
                    cursor = parents.get(&parent).cloned().flatten();
                    path.push(parent);
                }
                path.reverse();
                return Some(path);
            }
            if let Some(node) = self.nodes.get(&current) {
                for upstream in node.upstreams().iter().rev() {
                    if !parents.contains_key(upstream) {
                        parents.insert(upstream.clone(), Some(current.clone()));
                        stack.push(upstream.clone());
                    }
                }
            }
        }

        None
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Whether `id` is backed by a registered formula.
    pub fn is_derived(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(Node::is_derived)
    }

    /// Upstream ids of `id`, in argument order.
    pub fn upstreams(&self, id: &str) -> Upstreams {
        self.nodes
            .get(id)
            .map(|node| node.upstreams().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Downstream ids of `id`, in registration order.
    pub fn downstreams(&self, id: &str) -> Vec<FormulaId> {
        self.nodes
            .get(id)
            .map(|node| node.downstreams().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every id that transitively reads from `id`, breadth-first.
    pub fn downstream_closure(&self, id: &str) -> Vec<FormulaId> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<FormulaId> = self.downstreams(id).into();

        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.clone()) {
                continue;
            }
            queue.extend(self.downstreams(&next));
            result.push(next);
        }

        result
    }

    /// Get the total number of nodes in the graph, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
