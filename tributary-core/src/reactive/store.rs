//! Value Store
//!
//! The last known value of the root state and of every formula that has
//! been computed. An id without an entry has never been computed, or has
//! been invalidated since.

use std::collections::HashMap;

use crate::graph::FormulaId;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    values: HashMap<FormulaId, Value>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Overwrite the entry for `id`, returning the previous value.
    pub fn insert(&mut self, id: FormulaId, value: Value) -> Option<Value> {
        self.values.insert(id, value)
    }

    pub fn remove(&mut self, id: &str) -> Option<Value> {
        self.values.remove(id)
    }
}
