//! Error types for ecr-cache
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ecr-cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in ecr-cache
#[derive(Error, Debug)]
pub enum CacheError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigValue { key: String, reason: String },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Cannot derive a repository name: {0} is not set")]
    MissingPipelineIdentity(String),

    // Fingerprint errors
    #[error("Build spec not found: {0}")]
    SpecNotFound(PathBuf),

    #[error("Invalid cache glob {pattern}: {reason}")]
    GlobPattern { pattern: String, reason: String },

    #[error("Failed to read cache input {path}: {source}")]
    CacheInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Registry errors
    #[error("Repository lookup failed for {name}: {reason}")]
    RepositoryLookup { name: String, reason: String },

    #[error("Failed to create repository {name}: {reason}")]
    RepositoryCreate { name: String, reason: String },

    #[error("Failed to tag repository {arn}: {reason}")]
    RepositoryTag { arn: String, reason: String },

    #[error("Failed to apply lifecycle policy to {name}: {reason}")]
    LifecyclePolicy { name: String, reason: String },

    #[error("Registry login failed for {registry}: {reason}")]
    RegistryLogin { registry: String, reason: String },

    #[error("Unexpected registry response: {0}")]
    RegistryResponse(String),

    // Image errors
    #[error("Image build failed for {image}:\n{output}")]
    ImageBuild { image: String, output: String },

    #[error("Failed to tag {source_image} as {target}: {reason}")]
    ImageTag {
        source_image: String,
        target: String,
        reason: String,
    },

    #[error("Image push failed: {image}: {reason}")]
    ImagePush { image: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a configuration value error
    pub fn config_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigValue {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingPipelineIdentity(_) => {
                Some("Set ecr-name explicitly when running outside Buildkite")
            }
            Self::SpecNotFound(_) => Some("Check the dockerfile option and the working directory"),
            Self::RepositoryLookup { .. } | Self::RegistryLogin { .. } => {
                Some("Check AWS credentials and region: aws sts get-caller-identity")
            }
            Self::CommandFailed { .. } => Some("Ensure the aws and docker CLIs are on PATH"),
            _ => None,
        }
    }
}
