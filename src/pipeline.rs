//! The cache step end to end
//!
//! Repository setup, fingerprint, then pull-or-build. Each phase prints a
//! section header before it touches the network so a failing step can be
//! found from the log alone.

use crate::config::{Config, Environment};
use crate::error::CacheResult;
use crate::fingerprint::{FingerprintEngine, FingerprintInputs, FingerprintReport};
use crate::image::{BuildRequest, ImageEngine};
use crate::orchestrator::{BuildOrchestrator, CacheOutcome};
use crate::registry::{PolicyOutcome, RegistryLocation, RegistryService, RepositoryManager};
use crate::ui;
use tracing::debug;

/// What one run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub location: RegistryLocation,
    pub fingerprint: FingerprintReport,
    pub policy: PolicyOutcome,
    pub outcome: CacheOutcome,
}

/// Run the cache step against the given collaborators
pub async fn run(
    registry: &dyn RegistryService,
    engine: &dyn ImageEngine,
    config: &Config,
    inputs: &FingerprintInputs,
    env: &Environment,
) -> CacheResult<RunReport> {
    let repository_name = config.repository(env)?;

    ui::section(&format!(
        ":ecr: Ensuring repository {} ({})",
        repository_name,
        registry.service_name()
    ));
    let manager = RepositoryManager::new(registry);
    let location = manager
        .ensure_repository(&repository_name, &config.tags)
        .await?;
    ui::key_value("Location", location.as_str());

    ui::section(&format!(
        ":ecr: Applying lifecycle policy ({} days)",
        config.max_age_days
    ));
    let policy = manager
        .apply_expiration_policy(&repository_name, config.max_age_days)
        .await;
    match &policy {
        PolicyOutcome::Applied => ui::step_ok("Lifecycle policy applied"),
        PolicyOutcome::Skipped { .. } => {
            ui::step_warn("Lifecycle policy not applied, continuing without it")
        }
    }

    ui::section(":docker: Computing fingerprint");
    let fingerprint = FingerprintEngine::new(config.hash_algorithm).compute(inputs, env)?;
    ui::key_value("Fingerprint", fingerprint.fingerprint.as_str());

    ui::section(&format!(":docker: Logging in to {}", location.host()));
    let orchestrator = BuildOrchestrator::new(registry, engine);
    orchestrator.authenticate(&location).await?;

    ui::section(&format!(
        ":docker: Pulling or building {}",
        location.reference(&fingerprint.fingerprint)
    ));
    let template = BuildRequest::from_config(config, String::new());
    let outcome = orchestrator
        .run(&location, &fingerprint.fingerprint, &template)
        .await?;
    ui::step_ok(&format!("{}: {}", outcome, outcome.image()));

    debug!("Run complete: {:?}", outcome);
    Ok(RunReport {
        location,
        fingerprint,
        policy,
        outcome,
    })
}
