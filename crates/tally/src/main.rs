// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tally - chat-driven expense capture for ERPNext.
//!
//! Binary entry point: loads and validates configuration, then dispatches
//! to the retry worker daemon, the interactive capture shell, or config
//! inspection.

use clap::{Parser, Subcommand};

mod serve;
mod shell;
mod worker;

/// Tally - chat-driven expense capture for ERPNext.
#[derive(Parser, Debug)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the retry worker that re-submits queued journal entries.
    Serve,
    /// Capture expenses interactively from the terminal.
    Shell,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match tally_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            tally_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.bot.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run(config).await,
        Some(Commands::Shell) => shell::run(config).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("tally: use --help for available commands");
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("tally: {err}");
        std::process::exit(1);
    }
}

fn print_config(config: &tally_config::TallyConfig) -> Result<(), tally_core::TallyError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| tally_core::TallyError::Internal(format!("config serialization: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// Initializes the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tally={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
