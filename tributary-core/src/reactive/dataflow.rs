//! Incremental Evaluator
//!
//! [`Dataflow`] ties the dependency graph, the registered formulas and the
//! value store together and implements the two evaluation paths.
//!
//! # Reads are lazy
//!
//! `read(id)` returns the cached value. On a miss it first fills in every
//! missing upstream, then runs the formula over the results, caches the
//! output and returns it. An id with no formula reads as `null`.
//!
//! Both paths walk the graph with explicit stacks, never with recursion, so
//! long formula chains do not grow the call stack.
//!
//! # Resets are eager, pruned by equality
//!
//! `reset(id, value)` compares `value` with the cached one. If they are
//! equal nothing happens, which is what keeps a change from leaking into
//! parts of the graph whose inputs did not actually move. Otherwise the cache
//! is overwritten and every downstream formula, in registration order, is
//! recomputed and reset in turn.
//!
//! A formula reachable along two changed paths may be recomputed once per
//! path. Every recomputation reads the latest upstream values, so the cached
//! value converges to the right one.
//!
//! # Failures
//!
//! Errors from a formula bubble out of `read`/`reset` unchanged. The failing
//! formula keeps its previous cache entry; values already written along the
//! way stay written.

use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::{debug, trace};

use super::formula::Formula;
use super::store::ValueStore;
use crate::error::Result;
use crate::graph::{DependencyGraph, FormulaId, Upstreams};
use crate::value::{Equatable, Value};

/// Formulas, their dependency graph and their cached values.
#[derive(Debug, Clone)]
pub struct Dataflow {
    graph: DependencyGraph,
    formulas: HashMap<FormulaId, Formula>,
    store: ValueStore,
}

impl Dataflow {
    /// Create a dataflow whose root state is `state`.
    pub fn new(state: Value) -> Self {
        let mut store = ValueStore::new();
        store.insert(FormulaId::root(), state);
        Self {
            graph: DependencyGraph::new(),
            formulas: HashMap::new(),
            store,
        }
    }

    /// Register `formula` at `id`, replacing any previous definition.
    ///
    /// Nothing is computed. The cached values of `id` and of everything
    /// downstream of it are dropped so the next read sees the new definition.
    pub fn define(&mut self, id: FormulaId, formula: Formula) -> Result<()> {
        self.graph.link(&id, formula.upstreams().clone())?;
        debug!(formula = %id, upstreams = ?formula.upstreams(), "formula defined");

        self.invalidate(&id);
        self.formulas.insert(id, formula);
        Ok(())
    }

    /// Remove the formula at `id`. Returns whether one was registered.
    ///
    /// Downstream formulas are left alone and read `null` for `id` from now
    /// on.
    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.formulas.remove(id).is_some();
        if removed {
            let id = FormulaId::from(id);
            self.graph.unlink(&id);
            self.store.remove(&id);
            debug!(formula = %id, "formula deleted");
        }
        removed
    }

    fn invalidate(&mut self, id: &FormulaId) {
        self.store.remove(id);
        for downstream in self.graph.downstream_closure(id) {
            self.store.remove(&downstream);
        }
    }

    /// Current value of `id`, computing it if it is not cached.
    ///
    /// An id the graph has never seen reads as `null` and is not cached.
    pub fn read(&mut self, id: &str) -> Result<Value> {
        if let Some(value) = self.store.get(id) {
            trace!(formula = %id, "cache hit");
            return Ok(value.clone());
        }

        let id = FormulaId::from(id);
        self.fill(std::slice::from_ref(&id))?;
        Ok(self.store.get(&id).cloned().unwrap_or_default())
    }

    /// Make sure every id in `ids` and everything they read from is cached.
    ///
    /// Walks upstream edges with an explicit stack, so the depth of a
    /// formula chain is bounded by memory rather than by the call stack.
    fn fill(&mut self, ids: &[FormulaId]) -> Result<()> {
        let mut stack: Vec<(FormulaId, bool)> =
            ids.iter().rev().map(|id| (id.clone(), false)).collect();

        while let Some((id, expanded)) = stack.pop() {
            if self.store.contains(&id) {
                continue;
            }
            let Some(formula) = self.formulas.get(&id).cloned() else {
                // dangling upstreams read as null; unknown ids leave no entry
                if self.graph.contains(&id) {
                    self.store.insert(id, Value::Null);
                }
                continue;
            };

            if expanded {
                let value = self.run(&id, &formula)?;
                self.store.insert(id, value);
                continue;
            }

            stack.push((id, true));
            for upstream in formula.upstreams().iter().rev() {
                if !self.store.contains(upstream) {
                    stack.push((upstream.clone(), false));
                }
            }
        }

        Ok(())
    }

    /// Run the formula at `id` over freshly read upstream values, bypassing
    /// its own cache entry.
    fn compute(&mut self, id: &str) -> Result<Value> {
        let Some(formula) = self.formulas.get(id).cloned() else {
            return Ok(Value::Null);
        };
        self.fill(formula.upstreams())?;
        self.run(id, &formula)
    }

    /// Apply `formula` to the cached values of its upstreams.
    fn run(&self, id: &str, formula: &Formula) -> Result<Value> {
        let args: Vec<Value> = formula
            .upstreams()
            .iter()
            .map(|upstream| self.store.get(upstream).cloned().unwrap_or_default())
            .collect();

        debug!(formula = %id, "recomputing");
        formula.compute(&args)
    }

    /// Assign `value` to `id` and propagate the change downstream.
    ///
    /// Every id whose cached value changed is added to `changed`, in the
    /// order the changes happened, even when a later recomputation fails.
    /// Downstreams are visited depth-first in registration order using an
    /// explicit stack of pending downstream lists.
    pub fn reset(
        &mut self,
        id: &FormulaId,
        value: Value,
        changed: &mut IndexSet<FormulaId>,
    ) -> Result<()> {
        if !self.assign(id, value, changed) {
            return Ok(());
        }

        let mut pending = vec![self.graph.downstreams(id).into_iter()];
        while let Some(frame) = pending.last_mut() {
            let Some(downstream) = frame.next() else {
                pending.pop();
                continue;
            };
            if !self.formulas.contains_key(&downstream) {
                continue;
            }
            let fresh = self.compute(&downstream)?;
            if self.assign(&downstream, fresh, changed) {
                pending.push(self.graph.downstreams(&downstream).into_iter());
            }
        }

        Ok(())
    }

    /// Store `value` under `id` unless it equals the cached one. Returns
    /// whether anything changed.
    fn assign(&mut self, id: &FormulaId, value: Value, changed: &mut IndexSet<FormulaId>) -> bool {
        if self.store.get(id).is_some_and(|current| current.equals(&value)) {
            trace!(formula = %id, "unchanged, propagation stops");
            return false;
        }

        self.store.insert(id.clone(), value);
        changed.insert(id.clone());
        true
    }

    /// Cached value of `id`, without computing anything.
    pub fn cached(&self, id: &str) -> Option<&Value> {
        self.store.get(id)
    }

    pub fn is_cached(&self, id: &str) -> bool {
        self.store.contains(id)
    }

    pub fn is_defined(&self, id: &str) -> bool {
        self.formulas.contains_key(id)
    }

    pub fn upstreams(&self, id: &str) -> Upstreams {
        self.graph.upstreams(id)
    }

    pub fn downstreams(&self, id: &str) -> Vec<FormulaId> {
        self.graph.downstreams(id)
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }
}
