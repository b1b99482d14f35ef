//! Effect Performers
//!
//! A performer executes one kind of effect. Reducers only describe effects
//! (`EffectCall { kind, params }`); the `do-fx` stage looks the kind up here
//! and runs the handler with the parameters.
//!
//! Three performers come preset and feed actions back into the dispatcher,
//! which is how one action chains into the next without the reducer touching
//! the engine:
//!
//! | kind             | params           |
//! |------------------|------------------|
//! | `dispatch`       | `[action]`       |
//! | `dispatch-sync`  | `[action]`       |
//! | `dispatch-later` | `[ms, action]`   |

use std::sync::Arc;
use std::time::Duration;

use super::action::Action;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::value::Value;

pub const DISPATCH: &str = "dispatch";
pub const DISPATCH_SYNC: &str = "dispatch-sync";
pub const DISPATCH_LATER: &str = "dispatch-later";

/// Handler for one effect kind.
pub type Performer = Arc<dyn Fn(&Engine, &[Value]) -> Result<()> + Send + Sync>;

/// The performers every engine starts with unless configured otherwise.
pub fn presets() -> Vec<(&'static str, Performer)> {
    vec![
        (DISPATCH, Arc::new(perform_dispatch) as Performer),
        (DISPATCH_SYNC, Arc::new(perform_dispatch_sync) as Performer),
        (DISPATCH_LATER, Arc::new(perform_dispatch_later) as Performer),
    ]
}

fn perform_dispatch(engine: &Engine, params: &[Value]) -> Result<()> {
    let action = action_param(DISPATCH, params, 0)?;
    engine.dispatch(action)
}

fn perform_dispatch_sync(engine: &Engine, params: &[Value]) -> Result<()> {
    let action = action_param(DISPATCH_SYNC, params, 0)?;
    // a missing reducer drops only the nested dispatch; dispatch_sync logged it
    match engine.dispatch_sync(action) {
        Err(EngineError::MissingHandler(_)) => Ok(()),
        other => other,
    }
}

fn perform_dispatch_later(engine: &Engine, params: &[Value]) -> Result<()> {
    let ms = params
        .first()
        .and_then(Value::as_u64)
        .ok_or_else(|| EngineError::invalid_params(DISPATCH_LATER, "expected a delay in ms"))?;
    let action = action_param(DISPATCH_LATER, params, 1)?;
    engine.dispatch_later(action, Duration::from_millis(ms))
}

fn action_param(kind: &str, params: &[Value], index: usize) -> Result<Action> {
    let value = params
        .get(index)
        .ok_or_else(|| EngineError::invalid_params(kind, format!("missing action at {index}")))?;
    Action::from_value(value)
}
