//! Subscriber types for the reactive system.
//!
//! A Subscriber is an external observer (typically a view binding) that
//! wants to hear about new values of a fixed set of ids. Subscribers never
//! take part in evaluation: they are told after a propagation has settled.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::graph::FormulaId;
use crate::value::Value;

/// Unique identifier for a subscriber.
///
/// Returned by `subscribe` and used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Called with the id that changed and its new value.
pub type Callback = Arc<dyn Fn(&FormulaId, &Value) + Send + Sync>;

/// A subscriber to a set of ids.
pub struct Subscriber {
    id: SubscriberId,
    ids: IndexSet<FormulaId>,
    notify: Callback,
}

impl Subscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<I, F>(ids: I, notify: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FormulaId>,
        F: Fn(&FormulaId, &Value) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            ids: ids.into_iter().map(Into::into).collect(),
            notify: Arc::new(notify),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn watches(&self, id: &FormulaId) -> bool {
        self.ids.contains(id)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("ids", &self.ids)
            .finish()
    }
}

/// All subscribers of one engine, in subscription order.
#[derive(Debug, Default)]
pub struct Subscriptions {
    subscribers: IndexMap<SubscriberId, Subscriber>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscriber: Subscriber) -> SubscriberId {
        let id = subscriber.id();
        self.subscribers.insert(id, subscriber);
        id
    }

    /// Returns whether the subscriber existed.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        self.subscribers.shift_remove(&id).is_some()
    }

    /// The notifications owed for `changed`: one per (changed id, watching
    /// subscriber), ordered by change first and subscription second.
    pub fn matching(&self, changed: &IndexSet<FormulaId>) -> Vec<(FormulaId, Callback)> {
        changed
            .iter()
            .flat_map(|id| {
                self.subscribers
                    .values()
                    .filter(move |sub| sub.watches(id))
                    .map(move |sub| (id.clone(), Arc::clone(&sub.notify)))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
