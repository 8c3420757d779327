//! Signal handling for graceful server shutdown.
//!
//! SIGINT and SIGTERM on Unix, Ctrl+C elsewhere.

use crate::shutdown::ShutdownState;
use tokio::signal;
use tracing::info;

/// Waits for a termination signal and marks `state` as shutting down.
pub async fn wait_for_shutdown(state: &ShutdownState) -> std::io::Result<()> {
    wait_for_signal().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    state.initiate_shutdown();
    Ok(())
}

pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
