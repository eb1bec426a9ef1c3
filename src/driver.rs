//! Blocking loop that ticks a [`RestartController`] on a fixed cadence.

use std::time::{Duration, Instant};

use tracing::info;

use crate::clock::Clock;
use crate::config::DriverConfig;
use crate::device::DeviceOperations;
use crate::shutdown::StopFlag;
use crate::workflows::{RestartController, WorkflowStatus};

// Longest uninterrupted sleep, so a stop request is noticed promptly.
const STOP_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub tick_interval: Duration,
    pub max_ticks: Option<u64>,
    pub exit_on_success: bool,
}

impl From<&DriverConfig> for DriverOptions {
    fn from(config: &DriverConfig) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            max_ticks: None,
            exit_on_success: config.exit_on_success,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// The stop flag was raised
    Stopped,
    /// A cycle completed and `exit_on_success` was set
    Succeeded,
    /// `max_ticks` ticks were run
    TickLimit,
}

#[derive(Debug, Clone)]
pub struct DriverSummary {
    pub exit: DriverExit,
    pub ticks: u64,
    pub status: WorkflowStatus,
}

/// Tick `controller` until stopped, out of ticks, or (optionally) successful.
pub fn run_blocking<D, K>(
    controller: &mut RestartController<D, K>,
    options: &DriverOptions,
    stop: &StopFlag,
) -> DriverSummary
where
    D: DeviceOperations + 'static,
    K: Clock + 'static,
{
    let mut ticks = 0u64;
    let exit = loop {
        if stop.is_set() {
            break DriverExit::Stopped;
        }
        if options.max_ticks.is_some_and(|max| ticks >= max) {
            break DriverExit::TickLimit;
        }

        if let Some(tick) = controller.tick() {
            if tick.moved() {
                info!(from = %tick.step, to = %tick.next, "workflow step changed");
            }
        }
        ticks += 1;

        if options.exit_on_success && controller.is_successful() {
            break DriverExit::Succeeded;
        }

        sleep_unless_stopped(options.tick_interval, stop);
    };

    let status = controller.status();
    info!(?exit, ticks, success = status.success, "driver finished");
    DriverSummary {
        exit,
        ticks,
        status,
    }
}

fn sleep_unless_stopped(duration: Duration, stop: &StopFlag) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline || stop.is_set() {
            return;
        }
        std::thread::sleep((deadline - now).min(STOP_POLL));
    }
}
