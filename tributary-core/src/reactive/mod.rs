//! Reactive Primitives
//!
//! This module implements the dataflow half of the engine: formulas, the
//! value store that memoizes them, the evaluator that keeps the store
//! consistent with the root state, and the subscriber registry that tells
//! observers about new values.
//!
//! # Concepts
//!
//! ## Formulas
//!
//! A Formula is a named pure function of other ids. Its upstream ids are
//! declared up front, so the dependency graph is known before anything runs.
//!
//! ## The value store
//!
//! Every computed value is cached under its id. The cache doubles as the
//! baseline for change detection: a new value that is structurally equal to
//! the cached one is not a change.
//!
//! ## Subscribers
//!
//! A Subscriber watches a set of ids and is called once a propagation has
//! finished, for each watched id whose value changed.
//!
//! # Implementation Notes
//!
//! Reads are pulled lazily and cached; resets are pushed eagerly along
//! downstream edges and stop at the first node whose value did not change.

mod dataflow;
mod formula;
mod store;
mod subscriber;

pub use dataflow::Dataflow;
pub use formula::{ComputeFn, Formula, FormulaKind};
pub use store::ValueStore;
pub use subscriber::{Callback, Subscriber, SubscriberId, Subscriptions};
