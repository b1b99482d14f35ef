//! Action Dispatch
//!
//! This module implements the write path of the engine: actions are routed
//! through an interceptor chain that gathers inputs, runs a pure reducer and
//! applies the effects it describes.
//!
//! # Lifecycle of one dispatch
//!
//! ```text
//! Idle -> BeforePhase -> ReducerPhase -> AfterPhase -> Done
//! ```
//!
//! There is no way back and no partial commit: the chain runs to the end or
//! an error unwinds it, and stages that already ran are not compensated.
//!
//! # Timing
//!
//! - `dispatch_sync` runs the chain before returning.
//! - `dispatch_later` queues the action until a delay has passed.
//! - `dispatch` queues it with no delay: it still runs only after the
//!   caller has returned, so a caller never observes its own dispatch.

mod action;
mod chain;
mod context;
mod fetcher;
mod interceptor;
mod performer;
mod queue;

pub use action::Action;
pub use chain::{Chain, Phase, DO_FX, INJECT_STATE, REDUCER};
pub use context::{Context, EffectCall, Effects, Snapshots};
pub use fetcher::{fetch_into, Fetcher};
pub use interceptor::{Interceptor, Reducer, Stage};
pub use performer::{presets, Performer, DISPATCH, DISPATCH_LATER, DISPATCH_SYNC};
pub use queue::DispatchQueue;
