//! Directory-rooted config store.
//!
//! Keys are `/`-separated parameter names (`/tracegate/collector/config`)
//! mapped to files under the store root. This is the local stand-in for the
//! platform parameter store a deployment would publish to.

use super::{ConfigStore, ConfigStoreError};
use std::path::{Component, Path, PathBuf};

/// A config store backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    root: PathBuf,
}

impl FsConfigStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory is created lazily on the first `put`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key to its path under the store root, rejecting empty keys and
    /// path traversal.
    fn key_path(&self, key: &str) -> Result<PathBuf, ConfigStoreError> {
        let trimmed = key.trim_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigStoreError::InvalidKey {
                key: key.to_string(),
                reason: "key must contain at least one segment".to_string(),
            });
        }

        let relative = Path::new(trimmed);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ConfigStoreError::InvalidKey {
                key: key.to_string(),
                reason: "key must not contain '.' or '..' segments".to_string(),
            });
        }

        Ok(self.root.join(relative))
    }
}

impl ConfigStore for FsConfigStore {
    fn put(&self, key: &str, document: &str) -> Result<(), ConfigStoreError> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, document)?;
        tracing::debug!(key, path = %path.display(), "published configuration document");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, ConfigStoreError> {
        let path = self.key_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(document) => Ok(document),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(ConfigStoreError::Io(e)),
        }
    }
}
