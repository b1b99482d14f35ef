//! Actions
//!
//! An action names the reducer to run and carries its parameters. On the
//! JSON side it is an array whose head is the action id:
//! `["add-todo", "buy milk", {"due": "friday"}]`.

use std::fmt;

use crate::error::{EngineError, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    id: String,
    params: Vec<Value>,
}

impl Action {
    /// An action with no parameters.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter.
    pub fn with(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Parameter at `index`, or `null` if there are fewer parameters.
    pub fn param(&self, index: usize) -> &Value {
        self.params.get(index).unwrap_or(&Value::Null)
    }

    /// Read an action from its JSON array form.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(EngineError::MalformedAction(format!(
                "expected an array, got {value}"
            )));
        };
        let Some((head, params)) = items.split_first() else {
            return Err(EngineError::MalformedAction("empty action".into()));
        };
        let Value::String(id) = head else {
            return Err(EngineError::MalformedAction(format!(
                "action id must be a string, got {head}"
            )));
        };
        Ok(Self {
            id: id.clone(),
            params: params.to_vec(),
        })
    }

    /// The JSON array form of this action.
    pub fn to_value(&self) -> Value {
        let mut items = Vec::with_capacity(self.params.len() + 1);
        items.push(Value::String(self.id.clone()));
        items.extend(self.params.iter().cloned());
        Value::Array(items)
    }
}

impl From<&str> for Action {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl TryFrom<Value> for Action {
    type Error = EngineError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(&value)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
