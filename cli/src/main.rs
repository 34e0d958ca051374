//! Tracegate CLI
//!
//! Supplies the collector's configuration document: reads it from a file and
//! publishes it verbatim to the config store the collector pulls from at
//! startup. A missing or unreadable source document is fatal to deployment
//! and is never retried.
//!
//! # Usage
//!
//! ```bash
//! tracegate --help
//! tracegate publish --file config/collector.yaml --store-dir /var/lib/tracegate/store
//! tracegate validate --file config/collector.yaml
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::config::TelemetryConfig;
use shared::store::{ConfigStore, FsConfigStore};
use std::path::PathBuf;

/// Default store key the collector pulls its document from.
const DEFAULT_KEY: &str = "/tracegate/collector/config";

/// Tracegate CLI - config supplier for the collector sidecar
#[derive(Parser)]
#[command(name = "tracegate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a configuration document to the config store, verbatim
    Publish {
        /// Path to the source document
        #[arg(short, long)]
        file: PathBuf,

        /// Root directory of the config store
        #[arg(short = 'd', long, env = "TRACEGATE_STORE_DIR")]
        store_dir: PathBuf,

        /// Store key to publish under
        #[arg(short, long, default_value = DEFAULT_KEY)]
        key: String,
    },

    /// Parse a document against the collector schema and report the result
    Validate {
        /// Path to the document to check
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Publish {
            file,
            store_dir,
            key,
        }) => {
            let document = std::fs::read_to_string(&file).with_context(|| {
                format!("configuration document unreadable: {}", file.display())
            })?;

            let store = FsConfigStore::new(store_dir);
            store
                .put(&key, &document)
                .with_context(|| format!("failed to publish document under '{key}'"))?;

            println!(
                "Published {} ({} bytes) to {} under '{}'",
                file.display(),
                document.len(),
                store.root().display(),
                key
            );
        }
        Some(Commands::Validate { file }) => {
            let document = std::fs::read_to_string(&file).with_context(|| {
                format!("configuration document unreadable: {}", file.display())
            })?;

            let config = TelemetryConfig::from_yaml(&document)
                .with_context(|| format!("invalid configuration document: {}", file.display()))?;

            println!(
                "{} is valid: {} receiver(s), {} processor(s), {} exporter(s), {} pipeline(s)",
                file.display(),
                config.receivers.len(),
                config.processors.len(),
                config.exporters.len(),
                config.service.pipelines.len()
            );
        }
        None => {
            println!("Tracegate CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
