use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use crate::clock::MonotonicClock;
use crate::config::RestarterConfig;
use crate::device::HttpDeviceClient;
use crate::driver::{run_blocking, DriverExit, DriverOptions, DriverSummary};
use crate::shutdown::ShutdownCoordinator;
use crate::telemetry::{create_run_span, generate_run_id, init_telemetry, shutdown_telemetry};
use crate::workflows::RestartController;

pub struct RunCommand {
    pub config_path: Option<PathBuf>,
    pub tick_interval_ms: Option<u64>,
    pub max_ticks: Option<u64>,
    pub exit_on_success: bool,
}

impl RunCommand {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            tick_interval_ms: None,
            max_ticks: None,
            exit_on_success: false,
        }
    }

    pub fn with_tick_interval_ms(mut self, tick_interval_ms: Option<u64>) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_exit_on_success(mut self, exit_on_success: bool) -> Self {
        self.exit_on_success = exit_on_success;
        self
    }

    fn driver_options(&self, config: &RestarterConfig) -> DriverOptions {
        let mut options = DriverOptions::from(&config.driver);
        if let Some(ms) = self.tick_interval_ms.filter(|ms| *ms > 0) {
            options.tick_interval = std::time::Duration::from_millis(ms);
        }
        options.max_ticks = self.max_ticks;
        options.exit_on_success |= self.exit_on_success;
        options
    }

    pub async fn execute(&self) -> Result<()> {
        RestarterConfig::load_env_file()?;
        let config = RestarterConfig::load_from(self.config_path.as_deref())?;
        init_telemetry(&config.observability)?;

        let options = self.driver_options(&config);
        let device = config.device.clone();
        let policy = config.backoff.policy();
        let run_id = generate_run_id();
        info!(run.id = %run_id, device = %device.base_url, "starting restart workflow");

        let coordinator = ShutdownCoordinator::new();
        let stop = coordinator.stop_flag();

        // The HTTP client blocks, so the whole loop lives on a blocking thread.
        let mut worker = tokio::task::spawn_blocking(move || -> Result<DriverSummary> {
            let span = create_run_span(&run_id, &device.base_url);
            let _entered = span.enter();

            let client = HttpDeviceClient::new(&device)?;
            let mut controller = RestartController::new(client, MonotonicClock::new(), policy)?;
            Ok(run_blocking(&mut controller, &options, &stop))
        });

        let summary = tokio::select! {
            result = &mut worker => result??,
            signal = coordinator.wait_for_shutdown() => {
                signal?;
                worker.await??
            }
        };

        report(&summary);
        shutdown_telemetry();
        Ok(())
    }
}

fn report(summary: &DriverSummary) {
    let headline = match summary.exit {
        DriverExit::Succeeded => "✅ Configuration applied",
        DriverExit::Stopped => "🛑 Stopped",
        DriverExit::TickLimit => "⏱️  Tick limit reached",
    };
    println!("{headline} after {} ticks", summary.ticks);
    println!("   step: {}", summary.status.step);
    println!("   success: {}", summary.status.success);
    if !summary.status.success {
        println!("   next attempt in: {} ms", summary.status.retry_in_ms);
    }
}
