use anyhow::Result;
use clap::Parser;

use device_restarter::cli::commands::config::{InitConfigCommand, ShowConfigCommand};
use device_restarter::cli::commands::run::RunCommand;
use device_restarter::cli::commands::show_how_to_get_started;
use device_restarter::cli::{Cli, Commands, ConfigAction};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => show_how_to_get_started(),
        Some(Commands::Run {
            config,
            tick_interval_ms,
            max_ticks,
            exit_on_success,
        }) => tokio::runtime::Runtime::new()?.block_on(async {
            RunCommand::new(config)
                .with_tick_interval_ms(tick_interval_ms)
                .with_max_ticks(max_ticks)
                .with_exit_on_success(exit_on_success)
                .execute()
                .await
        }),
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show { config } => ShowConfigCommand::new(config).execute(),
            ConfigAction::Init { path, force } => InitConfigCommand::new(path, force).execute(),
        },
    }
}
