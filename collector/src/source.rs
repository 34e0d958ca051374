//! Configuration document sources.
//!
//! The collector fetches its configuration document exactly once at startup.
//! The source spec mirrors how a deployment hands the document over: as a
//! secret environment variable (`env:OTEL_CONFIG`), a mounted file
//! (`file:/etc/tracegate/collector.yaml`), or a key in the config store
//! (`store:/tracegate/collector/config`).
//!
//! Any fetch or validation failure here is startup-fatal: the process must
//! not serve traffic without a valid document.

use shared::config::{ConfigError, TelemetryConfig};
use shared::store::{ConfigStore, ConfigStoreError, EnvConfigStore, FsConfigStore};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that prevent the collector from obtaining a valid configuration.
#[derive(Debug, Error)]
pub enum ConfigFetchError {
    /// The source spec does not name a supported scheme.
    #[error("unsupported config source '{0}' (expected env:NAME, file:PATH, or store:KEY)")]
    UnsupportedScheme(String),

    /// The config store could not produce the document.
    #[error("failed to fetch configuration document: {0}")]
    Store(#[from] ConfigStoreError),

    /// A file source could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    File {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The document was fetched but failed schema validation.
    #[error("configuration document rejected: {0}")]
    Invalid(#[from] ConfigError),
}

/// Where the configuration document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A process environment variable holding the full document.
    Env(String),
    /// A file on disk.
    File(PathBuf),
    /// A key in a directory-rooted config store.
    Store {
        /// The store root directory.
        dir: PathBuf,
        /// The key the document was published under.
        key: String,
    },
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env(name) => write!(f, "env:{name}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Store { key, .. } => write!(f, "store:{key}"),
        }
    }
}

impl ConfigSource {
    /// Parses a source spec.
    ///
    /// A bare path with no scheme is treated as a file source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFetchError::UnsupportedScheme`] for any other scheme.
    pub fn parse(spec: &str, store_dir: &Path) -> Result<Self, ConfigFetchError> {
        if let Some(name) = spec.strip_prefix("env:") {
            Ok(Self::Env(name.to_string()))
        } else if let Some(path) = spec.strip_prefix("file:") {
            Ok(Self::File(PathBuf::from(path)))
        } else if let Some(key) = spec.strip_prefix("store:") {
            Ok(Self::Store {
                dir: store_dir.to_path_buf(),
                key: key.to_string(),
            })
        } else if spec.contains(':') {
            Err(ConfigFetchError::UnsupportedScheme(spec.to_string()))
        } else {
            Ok(Self::File(PathBuf::from(spec)))
        }
    }

    /// Fetches the raw document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigFetchError`] if the source cannot be read.
    pub fn fetch(&self) -> Result<String, ConfigFetchError> {
        match self {
            Self::Env(name) => Ok(EnvConfigStore::new().get(name)?),
            Self::File(path) => {
                std::fs::read_to_string(path).map_err(|source| ConfigFetchError::File {
                    path: path.clone(),
                    source,
                })
            }
            Self::Store { dir, key } => Ok(FsConfigStore::new(dir).get(key)?),
        }
    }

    /// Fetches, parses, and validates the configuration document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigFetchError`] if the document cannot be fetched or
    /// fails schema validation.
    pub fn load(&self) -> Result<TelemetryConfig, ConfigFetchError> {
        let document = self.fetch()?;
        Ok(TelemetryConfig::from_yaml(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::store::ConfigStore;

    const VALID_DOCUMENT: &str = r#"
receivers:
  otlp: {}
exporters:
  debug: {}
service:
  pipelines:
    traces: {receivers: [otlp], exporters: [debug]}
"#;

    #[test]
    fn test_parse_env_source() {
        let source = ConfigSource::parse("env:OTEL_CONFIG", Path::new("/tmp")).unwrap();
        assert_eq!(source, ConfigSource::Env("OTEL_CONFIG".to_string()));
    }

    #[test]
    fn test_parse_file_source() {
        let source = ConfigSource::parse("file:/etc/collector.yaml", Path::new("/tmp")).unwrap();
        assert_eq!(
            source,
            ConfigSource::File(PathBuf::from("/etc/collector.yaml"))
        );
    }

    #[test]
    fn test_parse_bare_path_is_file_source() {
        let source = ConfigSource::parse("config/collector.yaml", Path::new("/tmp")).unwrap();
        assert_eq!(
            source,
            ConfigSource::File(PathBuf::from("config/collector.yaml"))
        );
    }

    #[test]
    fn test_parse_store_source_uses_store_dir() {
        let source = ConfigSource::parse("store:/tracegate/collector/config", Path::new("/data"))
            .unwrap();
        assert_eq!(
            source,
            ConfigSource::Store {
                dir: PathBuf::from("/data"),
                key: "/tracegate/collector/config".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_unknown_scheme_rejected() {
        let err = ConfigSource::parse("s3://bucket/config", Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, ConfigFetchError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.yaml");
        std::fs::write(&path, VALID_DOCUMENT).unwrap();

        let source = ConfigSource::File(path);
        let config = source.load().unwrap();
        assert_eq!(config.service.pipelines.len(), 1);
    }

    #[test]
    fn test_load_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = shared::store::FsConfigStore::new(dir.path());
        store.put("/tracegate/collector/config", VALID_DOCUMENT).unwrap();

        let source = ConfigSource::Store {
            dir: dir.path().to_path_buf(),
            key: "/tracegate/collector/config".to_string(),
        };
        let config = source.load().unwrap();
        assert!(config.exporters.contains_key("debug"));
    }

    #[test]
    fn test_fetch_missing_file_is_fatal() {
        let source = ConfigSource::File(PathBuf::from("/definitely/not/here.yaml"));
        let err = source.fetch().unwrap_err();
        assert!(matches!(err, ConfigFetchError::File { .. }));
    }

    #[test]
    fn test_load_invalid_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.yaml");
        std::fs::write(&path, "service:\n  pipelines: {}\n").unwrap();

        let err = ConfigSource::File(path).load().unwrap_err();
        assert!(matches!(err, ConfigFetchError::Invalid(_)));
    }

    #[test]
    fn test_source_display() {
        assert_eq!(
            ConfigSource::Env("OTEL_CONFIG".to_string()).to_string(),
            "env:OTEL_CONFIG"
        );
        assert_eq!(
            ConfigSource::Store {
                dir: PathBuf::from("/data"),
                key: "/k".to_string()
            }
            .to_string(),
            "store:/k"
        );
    }
}
