//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ecr-cache - content-addressed image cache for CI steps
///
/// Fingerprints the build definition, reuses the image already published
/// under that fingerprint, or builds and publishes it.
#[derive(Parser, Debug)]
#[command(name = "ecr-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Diagnostic log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ECR_CACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull the cached image or build and publish it, then export its reference
    Run(RunArgs),

    /// Print the fingerprint of the current build definition
    Fingerprint(FingerprintArgs),

    /// Show the resolved configuration
    Config,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Append NAME=reference to this file for later steps
    #[arg(long, env = "BUILDKITE_ENV_FILE")]
    pub env_file: Option<PathBuf>,
}

/// Arguments for the fingerprint command
#[derive(Parser, Debug)]
pub struct FingerprintArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,
}

/// Fingerprint output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The fingerprint alone
    Plain,
    /// Fingerprint plus every hashed input
    Json,
}

/// Diagnostic log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
