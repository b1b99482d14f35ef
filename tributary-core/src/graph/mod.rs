//! Dependency Graph
//!
//! This module implements the dependency graph that tracks which formulas
//! read from which ids.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are ids: the root state, formulas, and ids that are only
//!   referenced as upstreams
//! - Edges are dependencies: if B reads A, there is an edge from A to B
//!
//! When a value changes, the evaluator walks the downstream edges of the
//! changed id to find the formulas to recompute.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized and indexed by id for O(1) lookups.
//!
//! 2. Both forward (upstreams) and reverse (downstreams) edges are kept so
//!    evaluation can pull upstream values and propagation can push to
//!    dependents.
//!
//! 3. Acyclicity is checked when a formula is registered, never during
//!    evaluation.

mod dependency;
mod node;

pub use dependency::DependencyGraph;
pub use node::{FormulaId, Node, NodeKind, Upstreams, ROOT_ID};
