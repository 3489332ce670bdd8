//! Publishing the resolved image reference to later pipeline steps
//!
//! A child process cannot change its parent's environment. The reference is
//! printed as an `export` line for hooks to `eval`, and appended to the
//! agent's env file when one is available.

use crate::error::{CacheError, CacheResult};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writes `NAME=<reference>` for downstream consumers
#[derive(Debug, Clone)]
pub struct Exporter {
    variable: String,
    env_file: Option<PathBuf>,
}

impl Exporter {
    /// Exporter for `variable`, which must be a valid shell identifier
    pub fn new(variable: impl Into<String>) -> CacheResult<Self> {
        let variable = variable.into();
        if !is_identifier(&variable) {
            return Err(CacheError::config_value(
                "export-env-variable",
                format!("'{}' is not a valid variable name", variable),
            ));
        }
        Ok(Self {
            variable,
            env_file: None,
        })
    }

    /// Also append to an env file
    pub fn with_env_file(mut self, path: Option<PathBuf>) -> Self {
        self.env_file = path;
        self
    }

    /// `export NAME=value`, quoted for POSIX shells when needed
    pub fn export_line(&self, value: &str) -> String {
        format!("export {}={}", self.variable, shell_quote(value))
    }

    /// Append to the env file (if any) and return the export line
    pub async fn publish(&self, value: &str) -> CacheResult<String> {
        if let Some(path) = &self.env_file {
            debug!("Appending {} to {}", self.variable, path.display());
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .map_err(|e| CacheError::io(format!("opening env file {}", path.display()), e))?;
            file.write_all(format!("{}={}\n", self.variable, value).as_bytes())
                .await
                .map_err(|e| CacheError::io(format!("writing env file {}", path.display()), e))?;
        }
        Ok(self.export_line(value))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
