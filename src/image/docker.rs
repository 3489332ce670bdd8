//! Docker CLI image engine

use crate::error::{CacheError, CacheResult};
use crate::image::{build_error_output, stream_child_output, BuildRequest, ImageEngine};
use crate::registry::RegistryCredentials;
use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Image engine backed by the `docker` CLI
///
/// Child output is forwarded to stderr so stdout carries only results.
pub struct DockerCli {
    program: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Use a docker-compatible CLI under a different name
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Execute a command and capture its output
    async fn exec(&self, args: &[&str]) -> CacheResult<Output> {
        debug!("Executing: {} {:?}", self.program, args);

        Command::new(&self.program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CacheError::command_failed(format!("{} {:?}", self.program, args), e))
    }

    /// Execute a long-running command, forwarding its output line by line
    ///
    /// Returns whether it succeeded and everything it printed.
    async fn exec_streaming(&self, args: &[String]) -> CacheResult<(bool, Vec<String>)> {
        debug!("Streaming: {} {:?}", self.program, args);

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CacheError::command_failed(format!("{} {:?}", self.program, args), e))?;

        let lines = stream_child_output(&mut child, &|line: &str| eprintln!("{}", line)).await;
        let status = child
            .wait()
            .await
            .map_err(|e| CacheError::io(format!("waiting for {} {:?}", self.program, args), e))?;

        Ok((status.success(), lines))
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageEngine for DockerCli {
    async fn login(&self, registry: &str, credentials: &RegistryCredentials) -> CacheResult<()> {
        debug!("Logging in to {}", registry);

        let mut child = Command::new(&self.program)
            .args(["login", "--username", credentials.username.as_str(), "--password-stdin", registry])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CacheError::command_failed(format!("{} login", self.program), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(credentials.password.as_bytes())
                .await
                .map_err(|e| CacheError::io("writing registry password", e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CacheError::io(format!("waiting for {} login", self.program), e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CacheError::RegistryLogin {
                registry: registry.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn pull(&self, reference: &str) -> CacheResult<bool> {
        info!("Pulling image: {}", reference);

        let output = self.exec(&["pull", reference]).await?;
        if output.status.success() {
            Ok(true)
        } else {
            debug!(
                "Pull of {} failed: {}",
                reference,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Ok(false)
        }
    }

    async fn build(&self, request: &BuildRequest) -> CacheResult<()> {
        info!("Building image: {}", request.tag);

        let (success, lines) = self.exec_streaming(&request.to_args()).await?;
        if success {
            Ok(())
        } else {
            Err(CacheError::ImageBuild {
                image: request.tag.clone(),
                output: build_error_output(&lines),
            })
        }
    }

    async fn tag(&self, source: &str, target: &str) -> CacheResult<()> {
        debug!("Tagging {} as {}", source, target);

        let output = self.exec(&["tag", source, target]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(CacheError::ImageTag {
                source_image: source.to_string(),
                target: target.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn push(&self, reference: &str) -> CacheResult<()> {
        info!("Pushing image: {}", reference);

        let args = vec!["push".to_string(), reference.to_string()];
        let (success, lines) = self.exec_streaming(&args).await?;
        if success {
            Ok(())
        } else {
            Err(CacheError::ImagePush {
                image: reference.to_string(),
                reason: build_error_output(&lines),
            })
        }
    }

    fn engine_name(&self) -> &'static str {
        "Docker"
    }
}
