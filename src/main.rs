mod cli;
mod ui;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;
use tracing::{Level, error};

use buildbreaker::BuildBreaker;
use buildbreaker::config::load_settings;
use buildbreaker::error::LOG_STAMP;
use buildbreaker::poller::Interrupt;
use buildbreaker::severity::Severity;
use buildbreaker::telemetry::init_tracing;
use cli::{Cli, Command};
use ui::RunProgress;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json_logs, level);

    match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            error!("{LOG_STAMP} {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Setup problems come back as `Err`; a broken build has already been
/// reported by the verdict line and only sets the exit code.
async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Check {
            config,
            define,
            issues,
            measures,
        } => {
            let settings = load_settings(&config, &define)?;
            let issues = match issues {
                Some(path) => read_json_array(&path)?,
                None => Vec::new(),
            };
            let measures = match measures {
                Some(path) => read_json_array(&path)?,
                None => Vec::new(),
            };

            let (handle, interrupt) = Interrupt::pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.raise();
                }
            });

            let breaker = BuildBreaker::from_settings(settings)?.with_interrupt(interrupt);
            let progress = RunProgress::start("Checking analysis results");
            match breaker.run(&issues, &measures).await {
                Ok(()) => {
                    progress.passed();
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    progress.broken(&err);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Severities => {
            for severity in Severity::ALL {
                println!("{}\t{severity}", severity.ordinal());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}
