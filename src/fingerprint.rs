//! Build fingerprints
//!
//! A fingerprint is a short hash of everything that determines the image:
//! build spec bytes, target stage, host architecture, build arguments and
//! the contents of every file matched by the cache globs. Each input is
//! hashed on its own, the hex digests are concatenated in a fixed order and
//! the concatenation is hashed again and truncated.
//!
//! The order of inputs is part of the format. Reordering anything changes
//! every fingerprint and orphans existing cache entries.

use crate::config::{Config, Environment, HashAlgorithm};
use crate::error::{CacheError, CacheResult};
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Number of hex characters kept from the final digest
pub const FINGERPRINT_LEN: usize = 7;

/// Short deterministic identifier of a build configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The fingerprint as a tag-safe string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
impl Fingerprint {
    pub(crate) fn from_hex(hex: &str) -> Self {
        Self(hex.to_string())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything that feeds a fingerprint
#[derive(Debug, Clone)]
pub struct FingerprintInputs {
    /// Directory that relative paths and globs are resolved against
    pub root: PathBuf,
    /// Build spec file
    pub dockerfile: PathBuf,
    /// Build stage
    pub target: Option<String>,
    /// Host architecture identifier
    pub architecture: String,
    /// Build arguments in declared order
    pub build_args: Vec<String>,
    /// Cache globs in declared order
    pub cache_on: Vec<String>,
}

impl FingerprintInputs {
    /// Inputs for `config`, resolved against the working directory
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: PathBuf::from("."),
            dockerfile: config.dockerfile.clone(),
            target: config.target.clone(),
            architecture: host_architecture().to_string(),
            build_args: config.build_args.clone(),
            cache_on: config.cache_on.clone(),
        }
    }

    /// Resolve inputs against `root` instead of the working directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}

/// Architecture string as reported by `uname -m` on Linux
pub fn host_architecture() -> &'static str {
    std::env::consts::ARCH
}

/// Category of a hashed input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    Dockerfile,
    Target,
    Architecture,
    BuildArg,
    CacheFile,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dockerfile => "dockerfile",
            Self::Target => "target",
            Self::Architecture => "architecture",
            Self::BuildArg => "build-arg",
            Self::CacheFile => "cache-file",
        };
        f.write_str(name)
    }
}

/// One hashed input, in the order it was folded into the fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashedInput {
    pub kind: InputKind,
    /// Path, value or argument that was hashed
    pub label: String,
    /// Hex digest of the input
    pub digest: String,
}

/// Fingerprint together with the inputs that produced it
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintReport {
    pub fingerprint: Fingerprint,
    pub algorithm: HashAlgorithm,
    pub inputs: Vec<HashedInput>,
}

/// Computes fingerprints with a fixed digest algorithm
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintEngine {
    algorithm: HashAlgorithm,
}

impl FingerprintEngine {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Compute the fingerprint of `inputs`
    ///
    /// Bare build arguments (no `=`) take their value from `env`. Globs that
    /// match nothing are skipped; unreadable files abort the computation.
    pub fn compute(
        &self,
        inputs: &FingerprintInputs,
        env: &Environment,
    ) -> CacheResult<FingerprintReport> {
        let mut hashed = Vec::new();

        let spec_path = inputs.root.join(&inputs.dockerfile);
        info!("Dockerfile: {}", inputs.dockerfile.display());
        let spec = fs::read(&spec_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::SpecNotFound(spec_path.clone()),
            _ => CacheError::CacheInput {
                path: spec_path.clone(),
                source: e,
            },
        })?;
        hashed.push(self.hash(InputKind::Dockerfile, inputs.dockerfile.display(), &spec));

        let target = inputs.target.as_deref().unwrap_or("");
        info!("Target: {}", target);
        hashed.push(self.hash(InputKind::Target, target, target.as_bytes()));

        info!("Architecture: {}", inputs.architecture);
        hashed.push(self.hash(
            InputKind::Architecture,
            &inputs.architecture,
            inputs.architecture.as_bytes(),
        ));

        for arg in &inputs.build_args {
            let resolved = resolve_build_arg(arg, env);
            info!("Build arg: {}", arg);
            hashed.push(self.hash(InputKind::BuildArg, arg, resolved.as_bytes()));
        }

        for pattern in &inputs.cache_on {
            info!("Cache on: {}", pattern);
            let matches = expand_glob(&inputs.root, pattern)?;
            if matches.is_empty() {
                debug!("Cache glob {} matched no files", pattern);
            }
            for path in matches {
                let bytes = fs::read(&path).map_err(|e| CacheError::CacheInput {
                    path: path.clone(),
                    source: e,
                })?;
                let label = path.strip_prefix(&inputs.root).unwrap_or(&path);
                info!("  {}", label.display());
                hashed.push(self.hash(InputKind::CacheFile, label.display(), &bytes));
            }
        }

        let combined: String = hashed.iter().map(|h| h.digest.as_str()).collect();
        let mut digest = hex_digest(self.algorithm, combined.as_bytes());
        digest.truncate(FINGERPRINT_LEN);

        Ok(FingerprintReport {
            fingerprint: Fingerprint(digest),
            algorithm: self.algorithm,
            inputs: hashed,
        })
    }

    fn hash(&self, kind: InputKind, label: impl fmt::Display, data: &[u8]) -> HashedInput {
        let digest = hex_digest(self.algorithm, data);
        debug!("{} {} -> {}", kind, label, digest);
        HashedInput {
            kind,
            label: label.to_string(),
            digest,
        }
    }
}

/// Lowercase hex digest of `data`
pub fn hex_digest(algorithm: HashAlgorithm, data: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
        HashAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
    }
}

/// `NAME` becomes `NAME=<value from env, or empty>`; `NAME=VALUE` is kept
pub fn resolve_build_arg(arg: &str, env: &Environment) -> String {
    if arg.contains('=') {
        arg.to_string()
    } else {
        format!("{}={}", arg, env.get(arg).unwrap_or(""))
    }
}

/// Expand `pattern` under `root`, returning matched files in enumeration order
///
/// `**` matches across directories, `*` does not cross `/`, and hidden
/// files need an explicit leading dot, the way a globstar shell behaves.
pub fn expand_glob(root: &Path, pattern: &str) -> CacheResult<Vec<PathBuf>> {
    let mut full = if Path::new(pattern).is_absolute() || root == Path::new(".") {
        pattern.to_string()
    } else {
        let root = root.to_string_lossy();
        format!("{}/{}", Pattern::escape(root.trim_end_matches('/')), pattern)
    };
    // A trailing `**` only yields directories in the glob crate
    if full == "**" || full.ends_with("/**") {
        full.push_str("/*");
    }

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let entries = glob::glob_with(&full, options).map_err(|e| CacheError::GlobPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CacheError::CacheInput {
            path: e.path().to_path_buf(),
            source: e.into_error(),
        })?;
        if path.is_dir() {
            continue;
        }
        files.push(path);
    }
    Ok(files)
}
