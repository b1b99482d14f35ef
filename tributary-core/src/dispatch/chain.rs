//! Interceptor Chains
//!
//! A chain is the flat list of stages one action runs through. It is built
//! once, when the reducer is registered, and replayed for every dispatch.
//!
//! # Layout
//!
//! Given custom interceptors `[I1, I2]` the chain is
//!
//! ```text
//! inject-state.before   copy the current state into snapshots.state
//! I1.before
//! I2.before
//! reducer.before        run the reducer, merge its effects
//! I2.after
//! I1.after
//! do-fx.after           replace the state, then run fx in order
//! ```
//!
//! `before` stages run in declaration order and `after` stages in reverse,
//! so the first interceptor wraps all the others. Layers without a stage
//! for a phase are skipped.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::action::Action;
use super::context::Context;
use super::interceptor::{Interceptor, Reducer, Stage};
use crate::engine::Engine;
use crate::error::Result;

pub const INJECT_STATE: &str = "inject-state";
pub const DO_FX: &str = "do-fx";
pub const REDUCER: &str = "reducer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => f.write_str("before"),
            Phase::After => f.write_str("after"),
        }
    }
}

/// A stage together with where it came from.
#[derive(Clone)]
struct Step {
    interceptor: String,
    phase: Phase,
    stage: Stage,
}

/// The executable chain for one action id.
#[derive(Clone)]
pub struct Chain {
    action: String,
    steps: Vec<Step>,
}

impl Chain {
    /// Build the chain for `action`: the standard stages wrapped around
    /// `interceptors` and `reducer`.
    pub fn build(action: impl Into<String>, interceptors: Vec<Interceptor>, reducer: Reducer) -> Self {
        let mut layers = Vec::with_capacity(interceptors.len() + 3);
        layers.push(do_fx());
        layers.push(inject_state());
        layers.extend(interceptors);
        layers.push(reduce_with(reducer));

        let befores = layers.iter().filter_map(|layer| {
            layer.before_stage().map(|stage| Step {
                interceptor: layer.id().to_string(),
                phase: Phase::Before,
                stage: Arc::clone(stage),
            })
        });
        let afters = layers.iter().rev().filter_map(|layer| {
            layer.after_stage().map(|stage| Step {
                interceptor: layer.id().to_string(),
                phase: Phase::After,
                stage: Arc::clone(stage),
            })
        });

        Self {
            action: action.into(),
            steps: befores.chain(afters).collect(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// `(interceptor id, phase)` for every step, in execution order.
    pub fn steps(&self) -> Vec<(&str, Phase)> {
        self.steps
            .iter()
            .map(|step| (step.interceptor.as_str(), step.phase))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }

    /// Thread a fresh context for `action` through every step.
    ///
    /// The first failing step aborts the chain; earlier steps are not undone.
    pub fn run(&self, engine: &Engine, action: Action) -> Result<Context> {
        let mut context = Context::new(action);
        for step in &self.steps {
            debug!(
                action = %self.action,
                interceptor = %step.interceptor,
                phase = %step.phase,
                "running stage"
            );
            context = (step.stage)(engine, context)?;
        }
        Ok(context)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("action", &self.action)
            .field("steps", &self.steps())
            .finish()
    }
}

/// Seeds `snapshots.state` with the current root state.
fn inject_state() -> Interceptor {
    Interceptor::new(INJECT_STATE).before(|engine, mut context| {
        let state = engine.read_root_state()?;
        context.snapshots.insert(crate::graph::ROOT_ID, state);
        Ok(context)
    })
}

/// Runs the reducer and merges what it returns into `effects`.
fn reduce_with(reducer: Reducer) -> Interceptor {
    Interceptor::new(REDUCER).before(move |_, mut context| {
        let effects = reducer(&context.snapshots, &context.action)?;
        context.effects.merge(effects);
        Ok(context)
    })
}

/// Applies the accumulated effects: state first, then each `fx` entry.
fn do_fx() -> Interceptor {
    Interceptor::new(DO_FX).after(|engine, context| {
        if let Some(state) = &context.effects.state {
            engine.reset_root_state(state.clone())?;
        }
        for call in &context.effects.fx {
            engine.perform(call)?;
        }
        Ok(context)
    })
}
