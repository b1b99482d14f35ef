//! Dispatch Context
//!
//! The record threaded through an interceptor chain for one dispatch:
//!
//! - `snapshots`: read-only inputs gathered by `before` stages, seeded with
//!   the current `state`
//! - `effects`: what the reducer (and any `after` stage) wants to happen
//! - `action`: the action being dispatched
//!
//! A context is created fresh for every dispatch and dropped when the chain
//! finishes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::action::Action;
use crate::graph::ROOT_ID;
use crate::value::Value;

/// Named inputs for a reducer, in the order they were gathered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshots(IndexMap<String, Value>);

impl Snapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The injected root state, or `null` if nothing injected it.
    pub fn state(&self) -> &Value {
        self.0.get(ROOT_ID).unwrap_or(&Value::Null)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One side effect to perform: a performer kind and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectCall {
    pub kind: String,
    pub params: Vec<Value>,
}

impl EffectCall {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    pub fn arg(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// What a dispatch should change.
///
/// `state`, when present, replaces the root state. `fx` is run in order
/// after the state has been replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fx: Vec<EffectCall>,
}

impl Effects {
    /// No state change and no side effects.
    pub fn none() -> Self {
        Self::default()
    }

    /// Replace the root state with `state`.
    pub fn state(state: Value) -> Self {
        Self {
            state: Some(state),
            fx: Vec::new(),
        }
    }

    /// Add a side effect.
    pub fn with_fx(mut self, call: EffectCall) -> Self {
        self.fx.push(call);
        self
    }

    /// Fold `other` into `self`: its state wins if it has one, its effects
    /// run after the ones already here.
    pub fn merge(&mut self, other: Effects) {
        if other.state.is_some() {
            self.state = other.state;
        }
        self.fx.extend(other.fx);
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.fx.is_empty()
    }
}

/// Per-dispatch record.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub snapshots: Snapshots,
    pub effects: Effects,
    pub action: Action,
}

impl Context {
    /// A fresh context for `action` with nothing gathered yet.
    pub fn new(action: Action) -> Self {
        Self {
            snapshots: Snapshots::new(),
            effects: Effects::none(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_existing_state_when_other_has_none() {
        let mut effects = Effects::state(json!(1)).with_fx(EffectCall::new("log").arg("a"));
        effects.merge(Effects::none().with_fx(EffectCall::new("log").arg("b")));

        assert_eq!(effects.state, Some(json!(1)));
        let args: Vec<_> = effects.fx.iter().map(|call| call.params[0].clone()).collect();
        assert_eq!(args, vec![json!("a"), json!("b")]);

        effects.merge(Effects::state(json!(2)));
        assert_eq!(effects.state, Some(json!(2)));
    }

    #[test]
    fn effects_deserialize_from_sparse_json() {
        let effects: Effects =
            serde_json::from_value(json!({"fx": [{"kind": "dispatch", "params": [["tick"]]}]}))
                .unwrap();
        assert_eq!(effects.state, None);
        assert_eq!(effects.fx, vec![EffectCall::new("dispatch").arg(json!(["tick"]))]);
    }

    #[test]
    fn fresh_context_has_no_snapshots() {
        let ctx = Context::new(Action::new("noop"));
        assert!(ctx.snapshots.is_empty());
        assert_eq!(ctx.snapshots.state(), &Value::Null);
        assert!(ctx.effects.is_empty());
    }
}
