//! Fetchers
//!
//! A fetcher injects outside data into a dispatch. Registered once under an
//! id, it becomes an ordinary interceptor through `Engine::fetcher`, whose
//! `before` stage calls it with the snapshots gathered so far and stores the
//! result under `snapshots[id]`, ready for the reducer.

use std::sync::Arc;

use super::context::Snapshots;
use super::interceptor::Interceptor;
use crate::error::Result;
use crate::value::Value;

/// Produces one snapshot entry from the snapshots gathered so far.
pub type Fetcher = Arc<dyn Fn(&Snapshots, &[Value]) -> Result<Value> + Send + Sync>;

/// Wrap `fetcher` as an interceptor that stores its result under `id`.
pub fn fetch_into(id: impl Into<String>, fetcher: Fetcher, params: Vec<Value>) -> Interceptor {
    let id = id.into();
    let key = id.clone();
    Interceptor::new(id).before(move |_, mut context| {
        let value = fetcher(&context.snapshots, &params)?;
        context.snapshots.insert(key.clone(), value);
        Ok(context)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::action::Action;
    use crate::dispatch::chain::Chain;
    use crate::dispatch::context::Effects;
    use crate::engine::Engine;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn fetched_value_lands_in_snapshots_before_the_reducer() {
        let engine = Engine::new(json!({"user": 7}));
        let fetcher: Fetcher = Arc::new(|snapshots: &Snapshots, params: &[Value]| {
            let user = snapshots.state()["user"].as_i64().unwrap_or(0);
            Ok(json!(format!("profile-{user}-{}", params[0])))
        });

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let chain = Chain::build(
            "load",
            vec![fetch_into("profile", fetcher, vec![json!("full")])],
            Arc::new(move |snapshots: &Snapshots, _: &Action| {
                *seen_clone.lock() = snapshots.get("profile").cloned();
                Ok(Effects::none())
            }),
        );

        chain.run(&engine, Action::new("load")).unwrap();
        assert_eq!(*seen.lock(), Some(json!("profile-7-\"full\"")));
    }
}
