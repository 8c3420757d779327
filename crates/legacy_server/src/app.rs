//! Main application logic and lifecycle management.
//!
//! [`Application`] merges configuration with command-line overrides, brings
//! the world state up, runs the tick loop and tears everything down in
//! phases when a termination signal arrives.

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::server::LegacyServer;
use crate::shutdown::ShutdownState;
use crate::signals::{wait_for_shutdown, wait_for_signal};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct Application {
    config: AppConfig,
    server: Arc<LegacyServer>,
}

impl Application {
    /// Loads the configuration named by `args`, applies the command-line
    /// overrides and builds the server.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(instance) = args.instance {
            config.server.instance_name = instance;
        }
        if args.master {
            config.server.master = true;
        }

        Self::from_config(config)
    }

    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner(&config.server.instance_name, config.server.master);
        let server = Arc::new(LegacyServer::new(&config));
        Ok(Self { config, server })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn server(&self) -> &Arc<LegacyServer> {
        &self.server
    }

    /// Runs until SIGINT/SIGTERM, then shuts down gracefully. A second
    /// signal during shutdown exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Legacy server '{}'", self.config.server.instance_name);
        self.log_configuration_summary();

        self.server.start().await?;

        let shutdown_state = ShutdownState::new();
        let tick_handle = {
            let server = self.server.clone();
            let shutdown_state = shutdown_state.clone();
            tokio::spawn(async move { server.run_tick_loop(shutdown_state).await })
        };

        info!("✅ Legacy server is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        wait_for_shutdown(&shutdown_state).await?;

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("🕒 Phase 1: Stopping the tick loop...");
        match tokio::time::timeout(Duration::from_secs(5), tick_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("❌ Tick loop ended abnormally: {}", e),
            Err(_) => warn!("⏰ Tick loop did not stop within timeout, continuing shutdown"),
        }

        info!("🧹 Phase 2: Stopping commands and cache feeds...");
        self.server.shutdown().await;
        shutdown_state.complete_shutdown();

        info!("✅ Legacy server shutdown complete");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        let config = &self.config;
        info!("📋 Configuration Summary:");
        info!("  🗄️ Database: {} (feed capacity {})", config.store.database, config.store.feed_capacity);
        info!("  ⏱️ Tick interval: {}ms", config.server.tick_interval_ms);
        info!(
            "  📦 Caches: load on startup {} | resync on lag {}",
            config.cache.load_on_startup, config.cache.resync_on_lag
        );
        info!("  🧱 Failed access cooldown: {}ms", config.regions.failed_access_cooldown_ms);
        info!("  🗺️ Map sync: {}", if config.map.enabled { "enabled" } else { "disabled" });
    }
}
