//! Collector process settings.
//!
//! These are the handful of knobs the process itself needs before it has a
//! configuration document: where to fetch the document from. Everything else
//! (ports, pipelines, exporters) lives in the document.

use crate::source::{ConfigFetchError, ConfigSource};
use std::path::PathBuf;

/// Process settings loaded from environment variables.
///
/// - `TRACEGATE_CONFIG`: the config source spec - `env:NAME`, `file:PATH`,
///   or `store:KEY` (default: `file:config/collector.yaml`)
/// - `TRACEGATE_STORE_DIR`: root directory of the config store, used by
///   `store:` sources (default: `/var/lib/tracegate/store`)
#[derive(Debug, Clone)]
pub struct Settings {
    /// The config source spec.
    pub config_source: String,
    /// Root directory for `store:` sources.
    pub store_dir: PathBuf,
}

impl Settings {
    /// Creates settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let config_source = std::env::var("TRACEGATE_CONFIG")
            .unwrap_or_else(|_| "file:config/collector.yaml".to_string());
        let store_dir = std::env::var("TRACEGATE_STORE_DIR")
            .map_or_else(|_| PathBuf::from("/var/lib/tracegate/store"), PathBuf::from);

        Self {
            config_source,
            store_dir,
        }
    }

    /// Resolves the configured source spec.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFetchError::UnsupportedScheme`] if the spec does not
    /// name a supported source.
    pub fn source(&self) -> Result<ConfigSource, ConfigFetchError> {
        ConfigSource::parse(&self.config_source, &self.store_dir)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_source: "file:config/collector.yaml".to_string(),
            store_dir: PathBuf::from("/var/lib/tracegate/store"),
        }
    }
}
