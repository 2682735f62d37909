use std::path::PathBuf;

use clap::Subcommand;

use crate::args::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a plan document without resolving configuration.
    Validate {
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Build the dependency graph and print its order, levels or DOT rendering.
    Plan {
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Provision: create every resource and run every action.
    Run {
        path: PathBuf,
        /// Event sink: stdout, tracing or none.
        #[arg(long, default_value = "tracing")]
        events: String,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        concurrency: ConcurrencyArgs,
    },
}
