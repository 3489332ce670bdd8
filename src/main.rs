//! ecr-cache - content-addressed container image cache for CI steps
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use ecr_cache::cli::{Cli, Commands, LogFormat};
use ecr_cache::config::{ConfigLoader, Environment};
use ecr_cache::error::CacheResult;
use ecr_cache::ui;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::expand_section();
            eprintln!("{} {}", style("Error:").red().bold().for_stderr(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow().for_stderr(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CacheResult<()> {
    let cli = Cli::parse();

    // 0 = info (fingerprint trace visible), 1 = debug, 2+ = trace
    let filter = match cli.verbose {
        0 => EnvFilter::new("ecr_cache=info"),
        1 => EnvFilter::new("ecr_cache=debug"),
        _ => EnvFilter::new("ecr_cache=trace"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    // Snapshot once; nothing reads the process environment after this
    let env = Environment::capture();

    let loader = match cli.config {
        Some(ref path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new(),
    };
    let config = loader.load(&env).await?;
    debug!(
        "Repository: {}",
        config.repository_name.as_deref().unwrap_or("<not resolved>")
    );

    match cli.command {
        Commands::Run(args) => ecr_cache::cli::commands::run(args, &config, &env).await,
        Commands::Fingerprint(args) => {
            ecr_cache::cli::commands::fingerprint(args, &config, &env).await
        }
        Commands::Config => ecr_cache::cli::commands::config(&config).await,
    }
}
