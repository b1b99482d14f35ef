//! Engine Errors
//!
//! Every fallible operation in the crate returns [`EngineError`]. User code
//! plugged into the engine (formulas, reducers, interceptors, performers,
//! fetchers) returns the same type, so a failure deep inside a propagation
//! or a dispatch reaches the caller unchanged.

use thiserror::Error;

use crate::graph::FormulaId;

/// Result alias used throughout the crate.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Errors produced by the engine or by user code running inside it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The id is reserved for the root state and cannot hold a formula.
    #[error("formula id `{0}` is reserved")]
    ReservedId(FormulaId),

    /// Registering the formula would make it depend on itself.
    #[error("formula `{id}` would depend on itself through {path:?}")]
    Cycle {
        id: FormulaId,
        /// Upstream walk from the formula back to itself.
        path: Vec<FormulaId>,
    },

    /// No reducer is registered for the action id.
    #[error("no reducer registered for action `{0}`")]
    MissingHandler(String),

    /// No fetcher is registered for the id.
    #[error("no fetcher registered for `{0}`")]
    UnknownFetcher(String),

    /// An effect names a performer kind that is not registered (strict mode).
    #[error("no performer registered for effect `{0}`")]
    UnknownEffect(String),

    /// A value could not be read as an action.
    #[error("malformed action: {0}")]
    MalformedAction(String),

    /// A performer received parameters it cannot use.
    #[error("invalid parameters for `{kind}`: {message}")]
    InvalidParams { kind: String, message: String },

    /// The dispatch queue is at capacity.
    #[error("dispatch queue is full ({0} pending)")]
    QueueFull(usize),

    /// A user computation failed.
    #[error("{0}")]
    Failed(String),

    /// The engine configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Build a failure from user code.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub(crate) fn invalid_params(kind: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}
