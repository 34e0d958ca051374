//! Environment-variable config store.
//!
//! Read-only: the deployment platform resolves the secret and injects it as
//! a process environment variable, so the key here is the variable name.

use super::{ConfigStore, ConfigStoreError};

/// A read-only config store over the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigStore;

impl EnvConfigStore {
    /// Creates the store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConfigStore for EnvConfigStore {
    fn put(&self, key: &str, _document: &str) -> Result<(), ConfigStoreError> {
        Err(ConfigStoreError::InvalidKey {
            key: key.to_string(),
            reason: "environment-backed store is read-only".to_string(),
        })
    }

    fn get(&self, key: &str) -> Result<String, ConfigStoreError> {
        if key.is_empty() {
            return Err(ConfigStoreError::InvalidKey {
                key: key.to_string(),
                reason: "variable name must not be empty".to_string(),
            });
        }
        std::env::var(key).map_err(|_| ConfigStoreError::NotFound(key.to_string()))
    }
}
