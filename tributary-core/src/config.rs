//! Engine Configuration
//!
//! Behavior switches for an [`Engine`](crate::Engine). Every field has a
//! default, so a partial JSON document is enough to override one of them.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Configuration for an engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fail a dispatch when an effect names an unregistered performer
    /// instead of skipping it.
    pub strict_effects: bool,

    /// Register the `dispatch`, `dispatch-later` and `dispatch-sync`
    /// performers when the engine is created.
    pub preset_performers: bool,

    /// Maximum number of scheduled dispatches waiting in the queue.
    /// `None` means unbounded.
    pub queue_capacity: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_effects: false,
            preset_performers: true,
            queue_capacity: None,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"strict_effects": true}"#).unwrap();
        assert!(config.strict_effects);
        assert!(config.preset_performers);
        assert_eq!(config.queue_capacity, None);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let err = EngineConfig::from_json(r#"{"queue_capacity": "lots"}"#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
