//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexSet;
use smallvec::SmallVec;

/// Id of the root state. Always a source node.
pub const ROOT_ID: &str = "state";

/// Unique identifier for a node in the dependency graph.
///
/// Ids are user-chosen names. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormulaId(Arc<str>);

impl FormulaId {
    /// The id of the root state.
    pub fn root() -> Self {
        Self::from(ROOT_ID)
    }

    /// Whether this is the reserved root id.
    pub fn is_root(&self) -> bool {
        &*self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FormulaId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for FormulaId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&FormulaId> for FormulaId {
    fn from(id: &FormulaId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for FormulaId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for FormulaId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FormulaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream ids of a formula, in argument order.
pub type Upstreams = SmallVec<[FormulaId; 4]>;

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A node with no registered formula: the root state, an id that is only
    /// referenced as an upstream, or a formula that has been deleted while
    /// something still depends on it.
    Source,

    /// A node backed by a registered formula.
    Derived,
}

/// A node in the dependency graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: FormulaId,
    kind: NodeKind,

    /// Ids this node reads from, in argument order. Empty for sources.
    upstreams: Upstreams,

    /// Ids that read from this node, in registration order.
    downstreams: IndexSet<FormulaId>,
}

impl Node {
    /// Create a source node.
    pub fn source(id: FormulaId) -> Self {
        Self {
            id,
            kind: NodeKind::Source,
            upstreams: Upstreams::new(),
            downstreams: IndexSet::new(),
        }
    }

    pub fn id(&self) -> &FormulaId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_derived(&self) -> bool {
        self.kind == NodeKind::Derived
    }

    pub fn upstreams(&self) -> &[FormulaId] {
        &self.upstreams
    }

    pub fn downstreams(&self) -> &IndexSet<FormulaId> {
        &self.downstreams
    }

    /// Turn this node into a derived node reading from `upstreams`.
    pub(crate) fn derive_from(&mut self, upstreams: Upstreams) {
        self.kind = NodeKind::Derived;
        self.upstreams = upstreams;
    }

    /// Turn this node back into a source, returning its former upstreams.
    pub(crate) fn make_source(&mut self) -> Upstreams {
        self.kind = NodeKind::Source;
        std::mem::take(&mut self.upstreams)
    }

    pub(crate) fn add_downstream(&mut self, id: FormulaId) {
        self.downstreams.insert(id);
    }

    pub(crate) fn remove_downstream(&mut self, id: &FormulaId) {
        // shift_remove keeps the remaining notification order intact
        self.downstreams.shift_remove(id);
    }

    /// A source with nothing downstream carries no information.
    pub(crate) fn is_orphan(&self) -> bool {
        self.kind == NodeKind::Source && self.downstreams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_id_is_reserved_name() {
        assert!(FormulaId::root().is_root());
        assert!(!FormulaId::from("count").is_root());
        assert_eq!(FormulaId::root().to_string(), "state");
    }

    #[test]
    fn source_node_becomes_derived_and_back() {
        let mut node = Node::source("b".into());
        assert_eq!(node.kind(), NodeKind::Source);

        node.derive_from(Upstreams::from_vec(vec!["a".into(), "c".into()]));
        assert!(node.is_derived());
        assert_eq!(node.upstreams(), &[FormulaId::from("a"), FormulaId::from("c")]);

        let former = node.make_source();
        assert_eq!(former.len(), 2);
        assert!(node.upstreams().is_empty());
        assert!(node.is_orphan());
    }

    #[test]
    fn downstreams_keep_insertion_order() {
        let mut node = Node::source(FormulaId::root());
        node.add_downstream("z".into());
        node.add_downstream("a".into());
        node.add_downstream("m".into());
        node.add_downstream("a".into());

        node.remove_downstream(&"z".into());
        let order: Vec<_> = node.downstreams().iter().map(|id| id.as_str()).collect();
        assert_eq!(order, vec!["a", "m"]);
    }
}
