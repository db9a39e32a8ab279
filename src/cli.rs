//! Command-line interface of `buildbreaker`, built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (check, severities) and
//! the global flags (--verbose, --json-logs).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Breaks the build when a code-analysis run does not meet its quality rules.
#[derive(Debug, Parser)]
#[command(name = "buildbreaker", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug output.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Emit log lines as JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json_logs: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every check against the latest analysis and fail if the build is broken.
    Check {
        /// TOML file with a [settings] table.
        #[arg(long, short, default_value = "buildbreaker.toml")]
        config: PathBuf,

        /// Override a setting, e.g. -D sonar.buildbreaker.skip=true.
        #[arg(short = 'D', value_name = "KEY=VALUE")]
        define: Vec<String>,

        /// JSON array of issues produced by the analysis.
        #[arg(long)]
        issues: Option<PathBuf>,

        /// JSON array of measures carrying alert levels.
        #[arg(long)]
        measures: Option<PathBuf>,
    },

    /// Print the severity scale, least severe first.
    Severities,
}
