//! Interceptors
//!
//! An interceptor is a reusable layer around a reducer: an optional
//! `before` stage that runs on the way in and an optional `after` stage that
//! runs on the way out. Stages take the context by value and hand it on.
//!
//! Interceptors are plain descriptions. They must not keep state between
//! dispatches; everything a stage needs travels in the [`Context`].

use std::fmt;
use std::sync::Arc;

use super::context::{Context, Effects, Snapshots};
use super::action::Action;
use crate::engine::Engine;
use crate::error::Result;

/// One step of a chain.
pub type Stage = Arc<dyn Fn(&Engine, Context) -> Result<Context> + Send + Sync>;

/// Pure function from inputs to a description of effects.
pub type Reducer = Arc<dyn Fn(&Snapshots, &Action) -> Result<Effects> + Send + Sync>;

#[derive(Clone)]
pub struct Interceptor {
    id: String,
    before: Option<Stage>,
    after: Option<Stage>,
}

impl Interceptor {
    /// An interceptor that does nothing yet.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            before: None,
            after: None,
        }
    }

    /// Run `stage` before the reducer.
    pub fn before<F>(mut self, stage: F) -> Self
    where
        F: Fn(&Engine, Context) -> Result<Context> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(stage));
        self
    }

    /// Run `stage` after the reducer.
    pub fn after<F>(mut self, stage: F) -> Self
    where
        F: Fn(&Engine, Context) -> Result<Context> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(stage));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn before_stage(&self) -> Option<&Stage> {
        self.before.as_ref()
    }

    pub(crate) fn after_stage(&self) -> Option<&Stage> {
        self.after.as_ref()
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("id", &self.id)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}
