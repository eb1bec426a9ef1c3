use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging
///
/// `RUST_LOG` wins when set; otherwise `log_level` from the configuration is
/// used as the filter.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    tracing::info!("device-restarter telemetry initialized");
    Ok(())
}

/// Generate an ID linking every log line of one driver run
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping a driver run against one device
pub fn create_run_span(run_id: &str, device: &str) -> tracing::Span {
    tracing::info_span!("restart_run", run.id = run_id, device.url = device)
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    // The fmt layers write synchronously, nothing to flush
    tracing::info!("device-restarter telemetry shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
