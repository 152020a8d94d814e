//! `netopt`: Linux multipath routing optimizer.
//!
//! One-shot CLI around the probe engine (C3), weight planner (C5), safety
//! envelope (C8), and route applicator (C6) — see each subsystem crate's
//! own doc comment for its piece of the pipeline.

mod cli;
mod commands;
mod config_paths;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use netopt_common::config::{self, ConfigInput};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("netopt: {e}");
            std::process::exit(e.exit_code());
        }
    };

    let result = match &cli.command {
        Command::Apply(args) => commands::apply::run(&config, args).await,
        Command::Restore(args) => commands::restore::run(&config, args).await,
        Command::Status => commands::status::run(&config).await,
        Command::Checkpoint { action } => commands::checkpoint::run(&config, action).await,
        Command::Watchdog { action } => commands::watchdog::run(&config, action).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("netopt: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

fn init_tracing(verbose: u8, quiet: u8) {
    let default_level = match verbose.saturating_sub(quiet) {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let level = if quiet > verbose { "warn" } else { default_level };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

fn resolve_config(cli: &Cli) -> netopt_common::error::Result<netopt_common::config::Config> {
    let system_path = cli
        .config
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from(config_paths::SYSTEM_CONFIG_PATH));
    let user_path = config_paths::user_config_path();

    let mut overlay = ConfigInput::default();
    if let Some(state_root) = &cli.state_root {
        overlay.state_root = Some(state_root.clone());
    }

    let env = std::env::vars();
    config::load(&system_path, &user_path, env, Some(overlay))
}
