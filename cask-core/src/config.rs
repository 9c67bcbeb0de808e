//! The configuration store consumed by `give_config` contextual bindings.
//!
//! Hosts register a [`Config`] under the conventional `"config"` identifier;
//! contextual bindings then inject individual values into primitive
//! constructor parameters:
//!
//! ```
//! use cask_core::{Config, Container, to_instance};
//! use serde_json::json;
//!
//! let container = Container::new();
//! let config = Config::new().with("mail.host", json!("smtp.example.com"));
//! container.instance("config", to_instance(config)).unwrap();
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The identifier the container resolves configuration from.
pub const CONFIG_ID: &str = "config";

/// A flat store of dotted-key configuration values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    values: HashMap<String, Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `key -> value` entries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let values = serde_json::from_str(json)?;
        Ok(Self { values })
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
