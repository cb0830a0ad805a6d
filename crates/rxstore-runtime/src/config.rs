//! Store Configuration - Naming and diagnostics
//!
//! [`StoreConfig`] carries the settings of a store that are not part of its
//! state logic. It can be built in code or loaded from RON.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Settings for one store instance
///
/// # Example
///
/// ```
/// use rxstore_runtime::StoreConfig;
///
/// let config = StoreConfig::from_ron(r#"(name: "counter", trace_actions: true)"#).unwrap();
/// assert_eq!(config.name, "counter");
/// assert!(config.trace_actions);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Label used in log events and errors
    pub name: String,
    /// Log every folded action at trace level
    pub trace_actions: bool,
}

impl StoreConfig {
    /// Create a configuration with the given name and default settings
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Enable or disable per-action tracing
    pub fn with_trace_actions(mut self, enabled: bool) -> Self {
        self.trace_actions = enabled;
        self
    }

    /// Parse a configuration from RON text
    ///
    /// Missing fields take their default values.
    pub fn from_ron(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            trace_actions: false,
        }
    }
}
