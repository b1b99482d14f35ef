//! Tributary Core
//!
//! This crate provides the runtime for Tributary, a reactive dataflow engine
//! with an event-driven write path. It implements:
//!
//! - A value store holding the root state and every cached derived value
//! - A dependency graph of named formulas, checked for cycles
//! - Incremental evaluation: lazy reads, eager equality-pruned propagation
//! - Action dispatch through interceptor chains, pure reducers and effect
//!   performers
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: formula ids, nodes and the dependency graph
//! - `reactive`: formulas, the value store, evaluation and subscribers
//! - `dispatch`: actions, interceptor chains, effects, performers, fetchers
//!   and the dispatch queue
//! - `engine`: the handle tying all of the above together
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tributary_core::{Action, Effects, Engine};
//!
//! let engine = Engine::new(json!({"count": 0}));
//!
//! // Derived values
//! engine.define_extractor("count", ["count"]).unwrap();
//! engine
//!     .define_transformer("doubled", ["count"], |args| {
//!         json!(args[0].as_i64().unwrap_or(0) * 2)
//!     })
//!     .unwrap();
//!
//! // A reducer describing the next state
//! engine.define_reducer("increment", vec![], |snapshots, action| {
//!     let by = action.param(0).as_i64().unwrap_or(1);
//!     let count = snapshots.state()["count"].as_i64().unwrap_or(0);
//!     Ok(Effects::state(json!({"count": count + by})))
//! });
//!
//! engine.dispatch_sync(Action::new("increment").with(5)).unwrap();
//! assert_eq!(engine.read("doubled").unwrap(), json!(10));
//! ```

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod value;

pub use config::EngineConfig;
pub use dispatch::{Action, EffectCall, Effects, Interceptor, Snapshots};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use graph::FormulaId;
pub use reactive::{Formula, SubscriberId};
pub use value::{Equatable, PathSegment, Value};
