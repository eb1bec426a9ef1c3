use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "device-restarter")]
#[command(about = "Log in to a device and apply a configuration change, retrying with backoff")]
#[command(long_about = "device-restarter walks a device's web interface through fetch, initialize, \
                       authenticate and apply, retrying the whole sequence with growing delays until \
                       it succeeds. Get started with 'device-restarter config init'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Drive the restart workflow until it succeeds or is stopped
    Run {
        /// Configuration file to use instead of ./device-restarter.toml
        #[arg(long, help = "Path to a TOML configuration file")]
        config: Option<PathBuf>,
        /// Override driver.tick_interval_ms
        #[arg(long, help = "Milliseconds between workflow ticks")]
        tick_interval_ms: Option<u64>,
        /// Stop after this many ticks
        #[arg(long, help = "Exit after running this many ticks")]
        max_ticks: Option<u64>,
        /// Exit once the configuration change has been applied
        #[arg(long, help = "Exit as soon as a restart cycle succeeds")]
        exit_on_success: bool,
    },
    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show {
        /// Configuration file to use instead of ./device-restarter.toml
        #[arg(long, help = "Path to a TOML configuration file")]
        config: Option<PathBuf>,
    },
    /// Write the default configuration to a file
    Init {
        /// Where to write the file
        #[arg(long, default_value = "device-restarter.toml", help = "Destination path")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long, help = "Overwrite the file if it already exists")]
        force: bool,
    },
}
