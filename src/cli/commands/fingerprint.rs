//! Fingerprint command - print the fingerprint without touching the registry

use crate::cli::args::{FingerprintArgs, OutputFormat};
use crate::config::{Config, Environment};
use crate::error::CacheResult;
use crate::fingerprint::{FingerprintEngine, FingerprintInputs};

/// Execute the fingerprint command
pub async fn execute(args: FingerprintArgs, config: &Config, env: &Environment) -> CacheResult<()> {
    let inputs = FingerprintInputs::from_config(config);
    let report = FingerprintEngine::new(config.hash_algorithm).compute(&inputs, env)?;

    match args.format {
        OutputFormat::Plain => println!("{}", report.fingerprint),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}
