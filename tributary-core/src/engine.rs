//! Engine
//!
//! The engine is the owned context every operation goes through. It holds
//! the dataflow (formulas, graph, cached values), the subscribers, the
//! reducer chains, the performer and fetcher registries, and the queue of
//! scheduled dispatches.
//!
//! # Sharing
//!
//! `Engine` is a cheap handle: clones share the same registries. Nothing is
//! global, so two engines created separately never see each other's
//! formulas or reducers.
//!
//! # Locking
//!
//! State sits behind `parking_lot` locks so the handle is `Send + Sync`.
//! Locks are held only for bookkeeping and while pure formulas run. They are
//! always released before reducers, interceptors, performers, fetchers or
//! subscriber callbacks run, so any of those may call back into the engine.
//! The engine still assumes one logical mutator: dispatches are meant to be
//! driven from a single task.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::dispatch::{
    fetch_into, presets, Action, Chain, DispatchQueue, EffectCall, Effects, Fetcher, Interceptor,
    Performer, Phase, Reducer, Snapshots,
};
use crate::error::{EngineError, Result};
use crate::graph::{FormulaId, Upstreams};
use crate::reactive::{Dataflow, Formula, Subscriber, SubscriberId, Subscriptions};
use crate::value::{PathSegment, Value};

struct Shared {
    config: EngineConfig,
    dataflow: Mutex<Dataflow>,
    subscriptions: RwLock<Subscriptions>,
    reducers: DashMap<String, Arc<Chain>>,
    performers: DashMap<String, Performer>,
    fetchers: DashMap<String, Fetcher>,
    queue: Mutex<DispatchQueue>,
    wake: Notify,
}

/// Handle to a reactive dataflow engine.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// An engine with the default configuration and `state` as root state.
    pub fn new(state: Value) -> Self {
        Self::with_config(EngineConfig::default(), state)
    }

    pub fn with_config(config: EngineConfig, state: Value) -> Self {
        let performers = DashMap::new();
        if config.preset_performers {
            for (kind, performer) in presets() {
                performers.insert(kind.to_string(), performer);
            }
        }

        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(DispatchQueue::new(config.queue_capacity)),
                config,
                dataflow: Mutex::new(Dataflow::new(state)),
                subscriptions: RwLock::new(Subscriptions::new()),
                reducers: DashMap::new(),
                performers,
                fetchers: DashMap::new(),
                wake: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    // ------------------------------------------------------------------------
    // Formulas
    // ------------------------------------------------------------------------

    /// Register `formula` at `id`, replacing any previous definition.
    pub fn define_formula(&self, id: impl Into<FormulaId>, formula: Formula) -> Result<()> {
        self.shared.dataflow.lock().define(id.into(), formula)
    }

    /// Register a formula reading `path` out of the root state.
    pub fn define_extractor<I>(&self, id: impl Into<FormulaId>, path: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<PathSegment>,
    {
        self.define_formula(id, Formula::extractor(path))
    }

    /// Register a formula computed from `upstreams`.
    pub fn define_transformer<I, F>(&self, id: impl Into<FormulaId>, upstreams: I, compute: F) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<FormulaId>,
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.define_formula(id, Formula::transformer(upstreams, compute))
    }

    /// Register a formula computed from `upstreams` by a function that may
    /// fail.
    pub fn try_define_transformer<I, F>(
        &self,
        id: impl Into<FormulaId>,
        upstreams: I,
        compute: F,
    ) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<FormulaId>,
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.define_formula(id, Formula::try_transformer(upstreams, compute))
    }

    /// Remove the formula at `id`. Returns whether one was registered.
    pub fn delete_formula(&self, id: &str) -> bool {
        self.shared.dataflow.lock().delete(id)
    }

    /// Current value of `id`, computing it on first access.
    pub fn read(&self, id: &str) -> Result<Value> {
        self.shared.dataflow.lock().read(id)
    }

    pub(crate) fn read_root_state(&self) -> Result<Value> {
        self.read(crate::graph::ROOT_ID)
    }

    /// Assign `value` to `id` and recompute whatever changed downstream.
    ///
    /// Subscribers are told about every id whose value changed once the
    /// propagation is over, also when it stopped on an error.
    pub fn reset(&self, id: impl Into<FormulaId>, value: Value) -> Result<()> {
        let id = id.into();
        let mut changed = IndexSet::new();
        let result = self.shared.dataflow.lock().reset(&id, value, &mut changed);
        self.notify(&changed);
        result
    }

    /// Replace the root state.
    pub fn reset_root_state(&self, state: Value) -> Result<()> {
        self.reset(FormulaId::root(), state)
    }

    pub fn is_cached(&self, id: &str) -> bool {
        self.shared.dataflow.lock().is_cached(id)
    }

    pub fn is_defined(&self, id: &str) -> bool {
        self.shared.dataflow.lock().is_defined(id)
    }

    pub fn upstreams(&self, id: &str) -> Upstreams {
        self.shared.dataflow.lock().upstreams(id)
    }

    pub fn downstreams(&self, id: &str) -> Vec<FormulaId> {
        self.shared.dataflow.lock().downstreams(id)
    }

    // ------------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------------

    /// Call `callback` with `(id, value)` whenever one of `ids` changes.
    pub fn subscribe<I, F>(&self, ids: I, callback: F) -> SubscriberId
    where
        I: IntoIterator,
        I::Item: Into<FormulaId>,
        F: Fn(&FormulaId, &Value) + Send + Sync + 'static,
    {
        self.shared
            .subscriptions
            .write()
            .add(Subscriber::new(ids, callback))
    }

    /// Returns whether the subscriber existed.
    pub fn unsubscribe(&self, subscriber: SubscriberId) -> bool {
        self.shared.subscriptions.write().remove(subscriber)
    }

    fn notify(&self, changed: &IndexSet<FormulaId>) {
        let pending = {
            let subscriptions = self.shared.subscriptions.read();
            if changed.is_empty() || subscriptions.is_empty() {
                return;
            }
            subscriptions.matching(changed)
        };
        if pending.is_empty() {
            return;
        }

        let values: Vec<Value> = {
            let dataflow = self.shared.dataflow.lock();
            pending
                .iter()
                .map(|(id, _)| dataflow.cached(id).cloned().unwrap_or_default())
                .collect()
        };
        for ((id, callback), value) in pending.into_iter().zip(values) {
            callback(&id, &value);
        }
    }

    // ------------------------------------------------------------------------
    // Reducers
    // ------------------------------------------------------------------------

    /// Register the chain for `action`: the standard stages around
    /// `interceptors` and `reducer`. Replaces any previous chain.
    pub fn define_reducer<F>(&self, action: impl Into<String>, interceptors: Vec<Interceptor>, reducer: F)
    where
        F: Fn(&Snapshots, &Action) -> Result<Effects> + Send + Sync + 'static,
    {
        let action = action.into();
        let reducer: Reducer = Arc::new(reducer);
        let chain = Chain::build(action.clone(), interceptors, reducer);
        debug!(action = %action, steps = chain.len(), "reducer defined");
        self.shared.reducers.insert(action, Arc::new(chain));
    }

    /// Remove the chain for `action`. Returns whether one was registered.
    pub fn delete_reducer(&self, action: &str) -> bool {
        self.shared.reducers.remove(action).is_some()
    }

    pub fn has_reducer(&self, action: &str) -> bool {
        self.shared.reducers.contains_key(action)
    }

    /// The `(interceptor, phase)` steps registered for `action`.
    pub fn chain(&self, action: &str) -> Option<Vec<(String, Phase)>> {
        let chain = self.chain_for(action)?;
        let steps = chain
            .steps()
            .into_iter()
            .map(|(interceptor, phase)| (interceptor.to_string(), phase))
            .collect();
        Some(steps)
    }

    fn chain_for(&self, action: &str) -> Option<Arc<Chain>> {
        self.shared
            .reducers
            .get(action)
            .map(|chain| Arc::clone(chain.value()))
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Run the chain for `action` before returning.
    ///
    /// An action without a reducer is logged and reported as
    /// [`EngineError::MissingHandler`]; nothing else happens.
    pub fn dispatch_sync(&self, action: impl Into<Action>) -> Result<()> {
        let action = action.into();
        let Some(chain) = self.chain_for(action.id()) else {
            warn!(action = %action.id(), "no reducer registered, dropping dispatch");
            return Err(EngineError::MissingHandler(action.id().to_string()));
        };

        debug!(action = %action.id(), "dispatching");
        chain.run(self, action)?;
        Ok(())
    }

    /// Schedule `action` to run once `delay` has passed.
    pub fn dispatch_later(&self, action: impl Into<Action>, delay: Duration) -> Result<()> {
        let action = action.into();
        let due = Instant::now() + delay;
        debug!(action = %action.id(), delay_ms = delay.as_millis() as u64, "dispatch scheduled");
        self.shared.queue.lock().push(action, due)?;
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Schedule `action` to run as soon as the current work is finished.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<()> {
        self.dispatch_later(action, Duration::ZERO)
    }

    /// Number of scheduled dispatches not run yet.
    pub fn pending_dispatches(&self) -> usize {
        self.shared.queue.lock().len()
    }

    /// When the earliest scheduled dispatch becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.shared.queue.lock().next_due()
    }

    /// Run one tick: every scheduled dispatch that is due and was queued
    /// before the tick started. Returns how many ran.
    ///
    /// Dispatches without a reducer are logged and skipped. Any other error
    /// stops the tick and is returned; the failed action is not retried.
    pub fn run_pending(&self) -> Result<usize> {
        let mark = self.shared.queue.lock().mark();
        let mut ran = 0;

        loop {
            let next = self.shared.queue.lock().pop_due(Instant::now(), mark);
            let Some(action) = next else {
                break;
            };
            ran += 1;
            match self.dispatch_sync(action) {
                Ok(()) | Err(EngineError::MissingHandler(_)) => {}
                Err(err) => {
                    warn!(error = %err, "scheduled dispatch failed");
                    return Err(err);
                }
            }
        }

        Ok(ran)
    }

    /// Drive the queue until nothing is scheduled, sleeping until each
    /// delayed dispatch is due.
    pub async fn run_until_idle(&self) -> Result<()> {
        loop {
            self.run_pending()?;
            match self.next_due() {
                None => return Ok(()),
                Some(due) if due > Instant::now() => tokio::time::sleep_until(due).await,
                Some(_) => tokio::task::yield_now().await,
            }
        }
    }

    /// Drive the queue forever, waking when new dispatches are scheduled.
    ///
    /// Returns only when a scheduled dispatch fails.
    pub async fn run(&self) -> Result<()> {
        loop {
            self.run_pending()?;
            match self.next_due() {
                Some(due) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(due) => {}
                        _ = self.shared.wake.notified() => {}
                    }
                }
                None => self.shared.wake.notified().await,
            }
        }
    }

    // ------------------------------------------------------------------------
    // Performers and fetchers
    // ------------------------------------------------------------------------

    /// Register the handler for effects of kind `kind`.
    pub fn define_performer<F>(&self, kind: impl Into<String>, performer: F)
    where
        F: Fn(&Engine, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.shared.performers.insert(kind.into(), Arc::new(performer));
    }

    pub fn has_performer(&self, kind: &str) -> bool {
        self.shared.performers.contains_key(kind)
    }

    /// Run the performer for `call`. Unknown kinds are skipped, or rejected
    /// when `strict_effects` is set.
    pub(crate) fn perform(&self, call: &EffectCall) -> Result<()> {
        let performer = self
            .shared
            .performers
            .get(&call.kind)
            .map(|entry| Arc::clone(entry.value()));

        match performer {
            Some(performer) => performer(self, &call.params),
            None if self.shared.config.strict_effects => {
                Err(EngineError::UnknownEffect(call.kind.clone()))
            }
            None => {
                debug!(effect = %call.kind, "no performer registered, skipping");
                Ok(())
            }
        }
    }

    /// Register a fetcher under `id`.
    pub fn define_fetcher<F>(&self, id: impl Into<String>, fetcher: F)
    where
        F: Fn(&Snapshots, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.shared.fetchers.insert(id.into(), Arc::new(fetcher));
    }

    /// An interceptor that runs the fetcher registered under `id` with
    /// `params` and stores its result under `snapshots[id]`.
    ///
    /// Fails if no fetcher is registered under `id` yet.
    pub fn fetcher(&self, id: &str, params: Vec<Value>) -> Result<Interceptor> {
        let fetcher = self
            .shared
            .fetchers
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::UnknownFetcher(id.to_string()))?;
        Ok(fetch_into(id, fetcher, params))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .field("formulas", &self.shared.dataflow.lock().formula_count())
            .field("subscribers", &self.shared.subscriptions.read().len())
            .field("reducers", &self.shared.reducers.len())
            .field("performers", &self.shared.performers.len())
            .field("pending", &self.pending_dispatches())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DISPATCH_LATER, DO_FX, INJECT_STATE, REDUCER};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn increment(snapshots: &Snapshots, action: &Action) -> Result<Effects> {
        let by = action.param(0).as_i64().unwrap_or(1);
        let count = snapshots.state()["count"].as_i64().unwrap_or(0);
        Ok(Effects::state(json!({"count": count + by})))
    }

    fn counter() -> Engine {
        let engine = Engine::new(json!({"count": 0}));
        engine.define_extractor("count", ["count"]).unwrap();
        engine.define_reducer("increment", vec![], increment);
        engine
    }

    #[test]
    fn dispatch_sync_applies_state_before_returning() {
        let engine = counter();
        engine.dispatch_sync("increment").unwrap();
        assert_eq!(engine.read("count").unwrap(), json!(1));

        engine.dispatch_sync(Action::new("increment").with(5)).unwrap();
        assert_eq!(engine.read("count").unwrap(), json!(6));
    }

    #[test]
    fn missing_reducer_is_a_typed_result() {
        let engine = counter();
        let err = engine.dispatch_sync("decrement").unwrap_err();
        assert_eq!(err, EngineError::MissingHandler("decrement".into()));
        assert_eq!(engine.read("count").unwrap(), json!(0));
    }

    #[test]
    fn reducer_without_state_leaves_state_alone() {
        let engine = counter();
        engine.define_reducer("noop", vec![], |_, _| Ok(Effects::none()));
        engine.dispatch_sync("noop").unwrap();
        assert_eq!(engine.read("state").unwrap(), json!({"count": 0}));
    }

    #[test]
    fn dispatch_defers_until_the_queue_runs() {
        let engine = counter();
        engine.dispatch("increment").unwrap();
        assert_eq!(engine.read("count").unwrap(), json!(0));
        assert_eq!(engine.pending_dispatches(), 1);

        assert_eq!(engine.run_pending().unwrap(), 1);
        assert_eq!(engine.read("count").unwrap(), json!(1));
        assert_eq!(engine.pending_dispatches(), 0);
    }

    #[test]
    fn scheduled_missing_handler_does_not_stop_the_tick() {
        let engine = counter();
        engine.dispatch("nobody-home").unwrap();
        engine.dispatch("increment").unwrap();

        assert_eq!(engine.run_pending().unwrap(), 2);
        assert_eq!(engine.read("count").unwrap(), json!(1));
    }

    #[test]
    fn fx_chain_into_further_dispatches() {
        let engine = counter();
        engine.define_reducer("increment-twice", vec![], |_, _| {
            Ok(Effects::none()
                .with_fx(EffectCall::new("dispatch-sync").arg(json!(["increment"])))
                .with_fx(EffectCall::new("dispatch").arg(json!(["increment", 10]))))
        });

        engine.dispatch_sync("increment-twice").unwrap();
        assert_eq!(engine.read("count").unwrap(), json!(1));

        engine.run_pending().unwrap();
        assert_eq!(engine.read("count").unwrap(), json!(11));
    }

    #[test]
    fn unknown_effects_are_skipped_unless_strict() {
        let emit_unknown = |_: &Snapshots, _: &Action| -> Result<Effects> {
            Ok(Effects::state(json!({"count": 1})).with_fx(EffectCall::new("beep")))
        };

        let lenient = Engine::new(json!({"count": 0}));
        lenient.define_reducer("go", vec![], emit_unknown);
        lenient.dispatch_sync("go").unwrap();
        assert_eq!(lenient.read("state").unwrap(), json!({"count": 1}));

        let strict = Engine::with_config(
            EngineConfig {
                strict_effects: true,
                ..EngineConfig::default()
            },
            json!({"count": 0}),
        );
        strict.define_reducer("go", vec![], emit_unknown);
        let err = strict.dispatch_sync("go").unwrap_err();
        assert_eq!(err, EngineError::UnknownEffect("beep".into()));
        // the state effect was applied before the failing fx
        assert_eq!(strict.read("state").unwrap(), json!({"count": 1}));
    }

    #[test]
    fn presets_can_be_disabled() {
        let engine = Engine::with_config(
            EngineConfig {
                preset_performers: false,
                ..EngineConfig::default()
            },
            Value::Null,
        );
        assert!(!engine.has_performer(DISPATCH_LATER));
        assert!(Engine::default().has_performer(DISPATCH_LATER));
    }

    #[test]
    fn performers_receive_params_in_order() {
        let engine = counter();
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        engine.define_performer("log", move |_, params| {
            log_clone.lock().push(params.to_vec());
            Ok(())
        });
        engine.define_reducer("shout", vec![], |_, _| {
            Ok(Effects::none()
                .with_fx(EffectCall::new("log").arg("a").arg(1))
                .with_fx(EffectCall::new("log").arg("b")))
        });

        engine.dispatch_sync("shout").unwrap();
        assert_eq!(
            *log.lock(),
            vec![vec![json!("a"), json!(1)], vec![json!("b")]]
        );
    }

    #[test]
    fn chain_introspection_lists_standard_stages() {
        let engine = counter();
        let steps = engine.chain("increment").unwrap();
        assert_eq!(
            steps,
            vec![
                (INJECT_STATE.to_string(), Phase::Before),
                (REDUCER.to_string(), Phase::Before),
                (DO_FX.to_string(), Phase::After),
            ]
        );
        assert!(engine.chain("missing").is_none());
        assert!(engine.delete_reducer("increment"));
        assert!(!engine.has_reducer("increment"));
    }

    #[test]
    fn fetcher_must_exist_before_use() {
        let engine = counter();
        let err = engine.fetcher("clock", vec![]).unwrap_err();
        assert_eq!(err, EngineError::UnknownFetcher("clock".into()));

        engine.define_fetcher("clock", |_, _| Ok(json!(1234)));
        let interceptor = engine.fetcher("clock", vec![]).unwrap();
        assert_eq!(interceptor.id(), "clock");
    }

    #[test]
    fn subscribers_see_settled_values() {
        let engine = counter();
        engine
            .define_transformer("doubled", ["count"], |args| {
                json!(args[0].as_i64().unwrap_or(0) * 2)
            })
            .unwrap();
        engine.read("doubled").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let reader = engine.clone();
        let subscriber = engine.subscribe(["count", "doubled"], move |id, value| {
            // callbacks may read back into the engine
            let doubled = reader.read("doubled").unwrap();
            seen_clone.lock().push((id.to_string(), value.clone(), doubled));
        });

        engine.dispatch_sync("increment").unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                ("count".to_string(), json!(1), json!(2)),
                ("doubled".to_string(), json!(2), json!(2)),
            ]
        );

        assert!(engine.unsubscribe(subscriber));
        engine.dispatch_sync("increment").unwrap();
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn clones_share_registries_but_engines_do_not() {
        let engine = counter();
        let clone = engine.clone();
        clone.dispatch_sync("increment").unwrap();
        assert_eq!(engine.read("count").unwrap(), json!(1));

        let other = Engine::new(json!({"count": 0}));
        assert!(!other.has_reducer("increment"));
        assert!(!other.is_defined("count"));
    }

    #[test]
    fn debug_summarizes_registries() {
        let engine = counter();
        engine.subscribe(["count"], |_, _| {});
        let summary = format!("{engine:?}");
        assert!(summary.contains("formulas: 1"), "{summary}");
        assert!(summary.contains("subscribers: 1"), "{summary}");
        assert!(summary.contains("reducers: 1"), "{summary}");
    }

    #[test]
    fn queue_capacity_comes_from_config() {
        let engine = Engine::with_config(
            EngineConfig {
                queue_capacity: Some(1),
                ..EngineConfig::default()
            },
            Value::Null,
        );
        engine.dispatch("a").unwrap();
        assert_eq!(engine.dispatch("b").unwrap_err(), EngineError::QueueFull(1));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_later_waits_for_the_delay() {
        let engine = counter();
        engine
            .dispatch_later("increment", Duration::from_millis(100))
            .unwrap();

        assert_eq!(engine.run_pending().unwrap(), 0);
        tokio::time::advance(Duration::from_millis(99)).await;
        assert_eq!(engine.run_pending().unwrap(), 0);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(engine.run_pending().unwrap(), 1);
        assert_eq!(engine.read("count").unwrap(), json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_idle_drains_delayed_chains() {
        let engine = counter();
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_clone = ticks.clone();
        engine.define_reducer("tick", vec![], move |snapshots, _| {
            ticks_clone.fetch_add(1, Ordering::SeqCst);
            let count = snapshots.state()["count"].as_i64().unwrap_or(0);
            let mut effects = Effects::state(json!({"count": count + 1}));
            if count < 2 {
                effects = effects
                    .with_fx(EffectCall::new(DISPATCH_LATER).arg(50).arg(json!(["tick"])));
            }
            Ok(effects)
        });

        let start = Instant::now();
        engine.dispatch("tick").unwrap();
        engine.run_until_idle().await.unwrap();

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(engine.read("count").unwrap(), json!(3));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
