//! Configuration schema for ecr-cache
//!
//! Values come from an optional TOML file and are overridden by plugin
//! properties from the environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Variable that receives the resolved image reference by default
pub const DEFAULT_EXPORT_VARIABLE: &str = "BUILDKITE_PLUGIN_DOCKER_IMAGE";

/// Default expiration threshold in days
pub const DEFAULT_MAX_AGE_DAYS: u32 = 30;

/// Fully resolved configuration for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Registry repository name; `None` when neither configured nor derivable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,

    /// Expire images pushed more than this many days ago
    pub max_age_days: u32,

    /// Build spec path
    pub dockerfile: PathBuf,

    /// Build context directory
    pub context: PathBuf,

    /// Build stage to target
    pub target: Option<String>,

    /// Variable name that receives the image reference
    pub export_env_variable: String,

    /// Build arguments, `KEY` or `KEY=VALUE`
    pub build_args: Vec<String>,

    /// Globs whose matched files feed the fingerprint
    pub cache_on: Vec<String>,

    /// Extra arguments passed through to the image builder
    pub additional_build_args: Vec<String>,

    /// Registry region
    pub region: Option<String>,

    /// Digest used for fingerprints
    pub hash_algorithm: HashAlgorithm,

    /// Resource tags applied to the repository
    pub tags: BTreeMap<String, String>,
}

/// Optional on-disk configuration; every field may be omitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub repository_name: Option<String>,
    pub max_age_days: Option<u32>,
    pub dockerfile: Option<PathBuf>,
    pub context: Option<PathBuf>,
    pub target: Option<String>,
    pub export_env_variable: Option<String>,
    pub build_args: Option<Vec<String>>,
    pub cache_on: Option<Vec<String>>,
    pub additional_build_args: Option<String>,
    pub region: Option<String>,
    pub hash_algorithm: Option<HashAlgorithm>,
    pub tags: BTreeMap<String, String>,
}

/// Digest algorithm for fingerprints
///
/// `Sha1` matches fingerprints published by existing caches. Switching to
/// `Sha256` changes every fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!("unsupported hash algorithm '{}'", other)),
        }
    }
}
