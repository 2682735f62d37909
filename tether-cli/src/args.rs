use std::path::PathBuf;

use clap::Args;

use crate::output::OutputFormat;

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// Where configuration values and secrets come from. Earlier layers win:
/// `--set`, then `--config`, then the environment, then the plan's `config` defaults.
#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
    #[arg(long, default_value = "TETHER_")]
    pub env_prefix: String,
}

#[derive(Debug, Args, Clone)]
pub struct ConcurrencyArgs {
    /// Unbounded when omitted.
    #[arg(long)]
    pub max_concurrency: Option<usize>,
    #[arg(long = "max-concurrency-host", value_name = "HOST=N")]
    pub max_concurrency_host: Vec<String>,
    /// Overall run deadline in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Per-command and per-provider-call timeout in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 1800)]
    pub command_timeout: u64,
}
