//! Image build and transfer
//!
//! The [`ImageEngine`] trait covers the local side of the cache: logging
//! in, pulling, building, re-tagging and pushing images.

mod docker;

pub use docker::DockerCli;

use crate::config::Config;
use crate::error::CacheResult;
use crate::registry::RegistryCredentials;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines to include in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Everything needed to build one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub target: Option<String>,
    /// `KEY` or `KEY=VALUE`; bare keys are resolved by the builder
    pub build_args: Vec<String>,
    /// Passed through verbatim before the context argument
    pub additional_args: Vec<String>,
    /// Reference the built image is tagged with
    pub tag: String,
}

impl BuildRequest {
    /// Request for `config`, tagged as `tag`
    pub fn from_config(config: &Config, tag: impl Into<String>) -> Self {
        Self {
            dockerfile: config.dockerfile.clone(),
            context: config.context.clone(),
            target: config.target.clone(),
            build_args: config.build_args.clone(),
            additional_args: config.additional_build_args.clone(),
            tag: tag.into(),
        }
    }

    /// Command-line arguments for `docker build`
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--file".to_string(),
            self.dockerfile.display().to_string(),
            "--tag".to_string(),
            self.tag.clone(),
        ];

        if let Some(target) = &self.target {
            args.push("--target".to_string());
            args.push(target.clone());
        }

        for arg in &self.build_args {
            args.push("--build-arg".to_string());
            args.push(arg.clone());
        }

        args.extend(self.additional_args.iter().cloned());
        args.push(self.context.display().to_string());
        args
    }
}

/// Local image engine
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Authenticate against `registry`
    async fn login(&self, registry: &str, credentials: &RegistryCredentials) -> CacheResult<()>;

    /// Pull `reference`; `Ok(false)` means it could not be pulled
    async fn pull(&self, reference: &str) -> CacheResult<bool>;

    /// Build and tag an image
    async fn build(&self, request: &BuildRequest) -> CacheResult<()>;

    /// Add `target` as another name for the local image `source`
    async fn tag(&self, source: &str, target: &str) -> CacheResult<()>;

    /// Push `reference` to its registry
    async fn push(&self, reference: &str) -> CacheResult<()>;

    /// Get the human-readable engine name for display
    fn engine_name(&self) -> &'static str;
}

/// Extract the useful tail of build output for error diagnostics.
///
/// Returns the last `BUILD_ERROR_TAIL_LINES` lines so error messages are
/// actionable without being overwhelming.
pub(crate) fn build_error_output(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Lines are decoded lossily: build tools print arbitrary bytes, and both
/// pipes must be drained to EOF or the child blocks on a full pipe.
/// Returns all collected output lines for error reporting.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(&str) + Send + Sync),
) -> Vec<String> {
    let mut all_output = Vec::new();
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return all_output;
    };

    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_reader = BufReader::new(stdout);
    // Partial reads survive a cancelled `read_until`, so the buffers live
    // across loop iterations
    let mut stderr_buf = Vec::new();
    let mut stdout_buf = Vec::new();

    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            read = stderr_reader.read_until(b'\n', &mut stderr_buf), if !stderr_done => {
                match read {
                    Ok(0) | Err(_) => stderr_done = true,
                    Ok(_) => {
                        let line = decode_line(&stderr_buf);
                        stderr_buf.clear();
                        on_output(&line);
                        all_output.push(line);
                    }
                }
            }
            read = stdout_reader.read_until(b'\n', &mut stdout_buf), if !stdout_done => {
                match read {
                    Ok(0) | Err(_) => stdout_done = true,
                    Ok(_) => {
                        let line = decode_line(&stdout_buf);
                        stdout_buf.clear();
                        on_output(&line);
                        all_output.push(line);
                    }
                }
            }
        }
    }

    all_output
}

/// One output line without its terminator; invalid UTF-8 becomes U+FFFD
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
