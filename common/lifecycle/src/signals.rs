use tokio::signal::unix::{signal, SignalKind};

use crate::error::LifecycleError;

/// Resolves on the first SIGINT or SIGTERM.
pub async fn wait_for_shutdown_signal() -> Result<(), LifecycleError> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(LifecycleError::Signal)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(LifecycleError::Signal)?;

    tokio::select! {
        _ = sigint.recv() => tracing::info!("received SIGINT"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
    }
    Ok(())
}
