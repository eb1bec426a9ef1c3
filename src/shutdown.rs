use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared flag the blocking driver loop checks between ticks
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Graceful shutdown coordinator for the device restarter
///
/// Cancellation is cooperative: a signal raises the stop flag, and the driver
/// finishes its current tick (including any in-flight request, which is
/// bounded by its own timeout) before exiting.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    stop: StopFlag,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn request_shutdown(&self) {
        info!("Shutdown requested");
        self.stop.set();
    }

    /// Wait for SIGINT (or SIGTERM on unix) and raise the stop flag
    pub async fn wait_for_shutdown(&self) -> Result<()> {
        info!("Shutdown coordinator ready - will stop gracefully on SIGINT/SIGTERM");
        wait_for_signal().await?;
        self.request_shutdown();
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
