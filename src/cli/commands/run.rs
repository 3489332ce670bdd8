//! Run command - pull or build the cached image and export its reference

use crate::cli::args::RunArgs;
use crate::config::{Config, Environment};
use crate::error::CacheResult;
use crate::export::Exporter;
use crate::fingerprint::FingerprintInputs;
use crate::image::{DockerCli, ImageEngine};
use crate::pipeline;
use crate::registry::EcrCli;
use crate::ui;
use tracing::debug;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config, env: &Environment) -> CacheResult<()> {
    // Reject a bad variable name before any remote call
    let exporter = Exporter::new(config.export_env_variable.as_str())?.with_env_file(args.env_file);

    let registry = EcrCli::new(config.region.clone());
    let engine = DockerCli::new();
    debug!("Using image engine: {}", engine.engine_name());

    let inputs = FingerprintInputs::from_config(config);
    let report = pipeline::run(&registry, &engine, config, &inputs, env).await?;

    let line = exporter.publish(report.outcome.image()).await?;
    println!("{}", line);
    ui::key_value(&config.export_env_variable, report.outcome.image());

    Ok(())
}
