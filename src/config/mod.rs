//! Configuration loading for ecr-cache
//!
//! Precedence, highest first: plugin properties from the environment, the
//! optional TOML file, built-in defaults. Everything is resolved once,
//! before any remote call.

pub mod properties;
pub mod schema;

pub use properties::{Environment, PropertyReader};
pub use schema::{Config, FileConfig, HashAlgorithm};

use crate::error::{CacheError, CacheResult};
use schema::{DEFAULT_EXPORT_VARIABLE, DEFAULT_MAX_AGE_DAYS};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Variable holding the organization identifier
pub const ORGANIZATION_VAR: &str = "BUILDKITE_ORGANIZATION_SLUG";

/// Variable holding the pipeline identifier
pub const PIPELINE_VAR: &str = "BUILDKITE_PIPELINE_SLUG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader that reads only the environment
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Loader that layers the environment over a TOML file
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: Some(path),
        }
    }

    /// Load and resolve the configuration
    pub async fn load(&self, env: &Environment) -> CacheResult<Config> {
        let file = match &self.config_path {
            Some(path) => Self::load_file(path).await?,
            None => FileConfig::default(),
        };
        resolve(file, env)
    }

    /// Read the optional TOML file
    pub async fn load_file(path: &Path) -> CacheResult<FileConfig> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| CacheError::io(format!("reading config from {}", path.display()), e))?;

        debug!("Loaded config file {}", path.display());
        toml::from_str(&content).map_err(|e| CacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge file values with plugin properties from `env`
pub fn resolve(file: FileConfig, env: &Environment) -> CacheResult<Config> {
    let props = PropertyReader::new(env);

    // Derived lazily when the pipeline identity is missing, so commands that
    // never reach the registry still work outside a pipeline
    let repository_name = props
        .read_scalar("ECR_NAME")
        .or(file.repository_name)
        .or_else(|| default_repository_name(env).ok());

    let max_age_days = match props.read_scalar("MAX_AGE_DAYS") {
        Some(raw) => parse_max_age(&raw)?,
        None => file.max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS),
    };
    if max_age_days == 0 {
        return Err(CacheError::config_value("max-age-days", "must be at least 1"));
    }

    let hash_algorithm = match props.read_scalar("HASH_ALGORITHM") {
        Some(raw) => raw
            .parse::<HashAlgorithm>()
            .map_err(|reason: String| CacheError::config_value("hash-algorithm", reason))?,
        None => file.hash_algorithm.unwrap_or_default(),
    };

    let mut tags = file.tags;
    tags.extend(props.read_map("ECR_TAGS"));

    let config = Config {
        repository_name,
        max_age_days,
        dockerfile: props
            .read_scalar("DOCKERFILE")
            .map(PathBuf::from)
            .or(file.dockerfile)
            .unwrap_or_else(|| PathBuf::from("Dockerfile")),
        context: props
            .read_scalar("CONTEXT")
            .map(PathBuf::from)
            .or(file.context)
            .unwrap_or_else(|| PathBuf::from(".")),
        target: props
            .read_scalar("TARGET")
            .or(file.target)
            .filter(|t| !t.is_empty()),
        export_env_variable: props
            .read_scalar("EXPORT_ENV_VARIABLE")
            .or(file.export_env_variable)
            .unwrap_or_else(|| DEFAULT_EXPORT_VARIABLE.to_string()),
        build_args: non_empty_or(props.read_list("BUILD_ARGS"), file.build_args),
        cache_on: non_empty_or(props.read_list("CACHE_ON"), file.cache_on),
        additional_build_args: props
            .read_scalar("ADDITIONAL_BUILD_ARGS")
            .or(file.additional_build_args)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        region: props.read_scalar("REGION").or(file.region),
        hash_algorithm,
        tags,
    };

    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

impl Config {
    /// Repository to use, failing if it is neither configured nor derivable
    pub fn repository(&self, env: &Environment) -> CacheResult<String> {
        match &self.repository_name {
            Some(name) => Ok(name.clone()),
            None => default_repository_name(env),
        }
    }
}

/// `build-cache/<organization>/<pipeline>`
pub fn default_repository_name(env: &Environment) -> CacheResult<String> {
    let org = env
        .get(ORGANIZATION_VAR)
        .ok_or_else(|| CacheError::MissingPipelineIdentity(ORGANIZATION_VAR.to_string()))?;
    let pipeline = env
        .get(PIPELINE_VAR)
        .ok_or_else(|| CacheError::MissingPipelineIdentity(PIPELINE_VAR.to_string()))?;
    Ok(format!("build-cache/{}/{}", org, pipeline))
}

fn parse_max_age(raw: &str) -> CacheResult<u32> {
    raw.trim().parse().map_err(|_| {
        CacheError::config_value(
            "max-age-days",
            format!("'{}' is not a positive integer", raw),
        )
    })
}

fn non_empty_or(values: Vec<String>, fallback: Option<Vec<String>>) -> Vec<String> {
    if values.is_empty() {
        fallback.unwrap_or_default()
    } else {
        values
    }
}
