mod app;
mod commands;
mod logging;

use std::process::ExitCode;

use bdaysync_core::{RunMode, Settings};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bdaysync")]
#[command(version)]
#[command(about = "Keep birthday events for your CardDAV contacts on a CalDAV calendar")]
struct Cli {
    /// Don't print the startup banner
    #[arg(long, global = true)]
    no_banner: bool,

    /// Defaults to RUN_MODE: "once" runs a single sync, anything else the daemon
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Sync once and exit
    RunOnce,
    /// Sync on a schedule until interrupted
    RunDaemon,
    /// List address books and birthdays without touching the calendar
    Diagnose,
    /// Check the configuration (and connectivity, if enabled)
    HealthCheck,
}

impl Commands {
    fn title(self) -> &'static str {
        match self {
            Commands::RunOnce => "single sync",
            Commands::RunDaemon => "daemon",
            Commands::Diagnose => "diagnostic",
            Commands::HealthCheck => "health check",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("bdaysync: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&settings);

    let command = cli.command.unwrap_or(match settings.run_mode() {
        RunMode::Once => Commands::RunOnce,
        RunMode::Daemon => Commands::RunDaemon,
    });

    if !cli.no_banner {
        print_banner(command);
    }

    let result = match command {
        Commands::RunOnce => commands::run_once::run(&settings).await,
        Commands::RunDaemon => commands::daemon::run(&settings).await,
        Commands::Diagnose => commands::diagnose::run(&settings).await,
        Commands::HealthCheck => commands::health_check::run(&settings).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_banner(command: Commands) {
    println!("🎂 bdaysync {}", env!("CARGO_PKG_VERSION"));
    println!("   CardDAV birthdays → CalDAV events ({})", command.title());
    println!();
}
