//! Amazon ECR through the AWS CLI

use crate::error::{CacheError, CacheResult};
use crate::registry::{
    LifecyclePolicy, RegistryCredentials, RegistryLocation, RegistryService,
    RepositoryDescription, Tags,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Marker the CLI prints when a repository does not exist
const NOT_FOUND_MARKER: &str = "RepositoryNotFoundException";

/// Registry service backed by `aws ecr`
pub struct EcrCli {
    region: Option<String>,
}

impl EcrCli {
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }

    /// Arguments for an `aws ecr` invocation, with region and output format
    fn args(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = ["ecr"]
            .iter()
            .chain(subcommand)
            .map(|s| s.to_string())
            .collect();
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        args.push("--output".to_string());
        args.push("json".to_string());
        args
    }

    async fn exec(&self, subcommand: &[&str]) -> CacheResult<Output> {
        let args = self.args(subcommand);
        debug!("Executing: aws {}", subcommand.first().unwrap_or(&""));

        Command::new("aws")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CacheError::command_failed(format!("aws ecr {}", subcommand.join(" ")), e))
    }
}

#[async_trait]
impl RegistryService for EcrCli {
    async fn describe_repository(&self, name: &str) -> CacheResult<Option<RepositoryDescription>> {
        let output = self
            .exec(&["describe-repositories", "--repository-names", name])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stderr) {
                return Ok(None);
            }
            return Err(CacheError::RepositoryLookup {
                name: name.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        let response: DescribeRepositoriesResponse = serde_json::from_slice(&output.stdout)?;
        response
            .repositories
            .into_iter()
            .next()
            .map(|r| Some(r.into()))
            .ok_or_else(|| {
                CacheError::RegistryResponse(format!("no repository returned for {}", name))
            })
    }

    async fn create_repository(
        &self,
        name: &str,
        tags: &Tags,
    ) -> CacheResult<RepositoryDescription> {
        let tag_json = tags_json(tags)?;
        let mut subcommand = vec!["create-repository", "--repository-name", name];
        if !tags.is_empty() {
            subcommand.extend(["--tags", tag_json.as_str()]);
        }

        let output = self.exec(&subcommand).await?;
        if !output.status.success() {
            return Err(CacheError::RepositoryCreate {
                name: name.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let response: CreateRepositoryResponse = serde_json::from_slice(&output.stdout)?;
        Ok(response.repository.into())
    }

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> CacheResult<()> {
        let tag_json = tags_json(tags)?;
        let output = self
            .exec(&["tag-resource", "--resource-arn", arn, "--tags", tag_json.as_str()])
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CacheError::RepositoryTag {
                arn: arn.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn put_lifecycle_policy(&self, name: &str, policy: &LifecyclePolicy) -> CacheResult<()> {
        let text = policy.to_json()?;
        let output = self
            .exec(&[
                "put-lifecycle-policy",
                "--repository-name",
                name,
                "--lifecycle-policy-text",
                text.as_str(),
            ])
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CacheError::LifecyclePolicy {
                name: name.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn login_credentials(
        &self,
        location: &RegistryLocation,
    ) -> CacheResult<RegistryCredentials> {
        let mut args = vec!["ecr".to_string(), "get-login-password".to_string()];
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }

        let output = Command::new("aws")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CacheError::command_failed("aws ecr get-login-password", e))?;

        if !output.status.success() {
            return Err(CacheError::RegistryLogin {
                registry: location.host().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(RegistryCredentials {
            username: "AWS".to_string(),
            password: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        })
    }

    fn service_name(&self) -> &'static str {
        "Amazon ECR"
    }
}

fn is_not_found(stderr: &str) -> bool {
    stderr.contains(NOT_FOUND_MARKER)
}

/// Tags in the CLI's JSON list form, which tolerates commas in values
fn tags_json(tags: &Tags) -> CacheResult<String> {
    let list: Vec<TagEntry<'_>> = tags
        .iter()
        .map(|(key, value)| TagEntry { key, value })
        .collect();
    Ok(serde_json::to_string(&list)?)
}

#[derive(Serialize)]
struct TagEntry<'a> {
    #[serde(rename = "Key")]
    key: &'a str,
    #[serde(rename = "Value")]
    value: &'a str,
}

#[derive(Deserialize)]
struct DescribeRepositoriesResponse {
    repositories: Vec<RepositoryRecord>,
}

#[derive(Deserialize)]
struct CreateRepositoryResponse {
    repository: RepositoryRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryRecord {
    repository_arn: String,
    registry_id: String,
    repository_uri: String,
}

impl From<RepositoryRecord> for RepositoryDescription {
    fn from(record: RepositoryRecord) -> Self {
        Self {
            uri: record.repository_uri,
            registry_id: record.registry_id,
            arn: record.repository_arn,
        }
    }
}
