//! Config store abstractions.
//!
//! The configuration document is published once at deployment time and read
//! back by the collector at startup. The `ConfigStore` trait captures that
//! single named-key contract; implementations cover a directory-rooted
//! parameter store and the environment-variable injection used when the
//! platform hands the document to the process as a secret.

pub mod env_store;
pub mod fs_store;

pub use env_store::EnvConfigStore;
pub use fs_store::FsConfigStore;

use thiserror::Error;

/// Errors produced by config store operations.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    /// No document exists under the requested key.
    #[error("no configuration document under key '{0}'")]
    NotFound(String),

    /// The key is empty or escapes the store root.
    #[error("invalid store key '{key}': {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The underlying storage failed.
    #[error("config store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A durable, access-controlled store holding configuration documents by key.
///
/// Documents are opaque to the store: `put` writes the bytes it is given
/// verbatim and `get` returns them unchanged.
pub trait ConfigStore: Send + Sync {
    /// Publishes a document under the given key, replacing any previous
    /// version.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigStoreError`] if the key is invalid or the write
    /// fails.
    fn put(&self, key: &str, document: &str) -> Result<(), ConfigStoreError>;

    /// Fetches the document stored under the given key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError::NotFound`] if nothing was published under
    /// the key, or another variant if the read fails.
    fn get(&self, key: &str) -> Result<String, ConfigStoreError>;
}
