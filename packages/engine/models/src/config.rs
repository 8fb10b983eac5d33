//! Prediction engine settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine settings, loadable from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before a local-model request is dispatched.
    pub local_debounce_ms: u64,
    /// Quiet period before a remote-model request is dispatched.
    pub remote_debounce_ms: u64,
    /// API root for the remote model (e.g. `http://localhost:8000/api/v1`).
    pub api_base_url: String,
    /// Name of the local prediction worker thread.
    pub worker_thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_debounce_ms: 50,
            remote_debounce_ms: 300,
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            worker_thread_name: "swing-map-predict".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parses settings from TOML; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a value has the wrong
    /// type.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Local debounce window.
    #[must_use]
    pub const fn local_debounce(&self) -> Duration {
        Duration::from_millis(self.local_debounce_ms)
    }

    /// Remote debounce window.
    #[must_use]
    pub const fn remote_debounce(&self) -> Duration {
        Duration::from_millis(self.remote_debounce_ms)
    }
}
