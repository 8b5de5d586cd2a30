//! cwabin CLI - logger recording converter
//!
//! Command-line interface for the cwabin conversion engine.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use cwabin::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("cwabin v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("cwabin v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Convert {
            inputs,
            output,
            config,
            window,
            lowpass,
            integrate,
            width,
            threads,
            report,
        } => commands::convert(
            &inputs,
            &output,
            config.as_deref(),
            &window,
            lowpass,
            integrate.as_deref(),
            width,
            threads,
            report.as_deref(),
        )
        .map_err(with_suggestions)
        .with_context(|| format!("converting into {}", output.display())),
        Commands::Window { inputs, window } => {
            commands::window(&inputs, &window).map_err(with_suggestions)
        }
        Commands::Info { inputs } => commands::info(&inputs).map_err(with_suggestions),
        Commands::Inspect { path } => commands::inspect(&path)
            .map_err(with_suggestions)
            .with_context(|| format!("reading {}", path.display())),
    }
}

/// Print recovery hints before handing the error to anyhow
fn with_suggestions(err: cwabin::ConvertError) -> anyhow::Error {
    let suggestions = match &err {
        cwabin::ConvertError::LoggerFailed { source, .. } => source.recovery_suggestions(),
        other => other.recovery_suggestions(),
    };
    for suggestion in suggestions {
        eprintln!("hint: {}", suggestion);
    }
    anyhow::Error::new(err)
}
