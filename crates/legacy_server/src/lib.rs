//! # Legacy Server
//!
//! Persistent-world server core: replicated entity caches over a document
//! store, the claims and regions derived from them, and the commands that
//! change them. This crate is the entry point that wires those layers
//! together and drives them from a fixed-rate tick loop.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! legacy_server
//!
//! # Specify custom configuration
//! legacy_server --config production.toml
//!
//! # Override specific settings
//! legacy_server --instance survival-2 --log-level debug --json-logs
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! SIGINT and SIGTERM start a graceful shutdown; a second signal exits at
//! once.

use tracing::error;

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod server;
pub mod shutdown;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Parses the command line, sets up logging and runs the application until
/// it shuts down. Exits the process with status 1 on startup or runtime
/// failure.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging needs the file's settings before the application loads it
    let config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    let mut logging = config.logging.clone();
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use commands::NationCommands;
pub use config::{CacheSettings, LoggingSettings, MapSettings, RegionSettings, ServerSettings, StoreSettings};
pub use error::CommandError;
pub use server::LegacyServer;
