//! Registry repository management
//!
//! Makes sure the cache repository exists, carries the configured resource
//! tags and has an expiration policy. Every operation is safe to repeat:
//! repositories are created only when missing, tags are only ever added and
//! the policy is overwritten in place.

mod ecr;
pub mod policy;

pub use ecr::EcrCli;
pub use policy::LifecyclePolicy;

use crate::error::CacheResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Resource tags attached to a repository
pub type Tags = BTreeMap<String, String>;

/// Registry-side identity of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescription {
    /// Pull/push location, e.g. `123.dkr.ecr.us-east-1.amazonaws.com/build-cache/acme/web`
    pub uri: String,
    pub registry_id: String,
    /// Unique resource identifier used for tagging
    pub arn: String,
}

/// Short-lived credentials for the image engine
#[derive(Clone)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Pull/push address of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLocation(String);

impl RegistryLocation {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Registry host, the part before the first `/`
    pub fn host(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// `<location>:<tag>`
    pub fn reference(&self, tag: impl fmt::Display) -> String {
        format!("{}:{}", self.0, tag)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote artifact registry
#[async_trait]
pub trait RegistryService: Send + Sync {
    /// Look up a repository; `Ok(None)` means it does not exist
    ///
    /// Any other lookup failure must be returned as an error.
    async fn describe_repository(&self, name: &str) -> CacheResult<Option<RepositoryDescription>>;

    /// Create a repository with tags attached at creation
    async fn create_repository(&self, name: &str, tags: &Tags)
        -> CacheResult<RepositoryDescription>;

    /// Add tags to an existing resource without removing any
    async fn tag_resource(&self, arn: &str, tags: &Tags) -> CacheResult<()>;

    /// Install or overwrite the repository lifecycle policy
    async fn put_lifecycle_policy(&self, name: &str, policy: &LifecyclePolicy) -> CacheResult<()>;

    /// Obtain credentials for pushing to and pulling from `location`
    async fn login_credentials(
        &self,
        location: &RegistryLocation,
    ) -> CacheResult<RegistryCredentials>;

    /// Human-readable service name for display
    fn service_name(&self) -> &'static str;
}

/// Result of installing the expiration policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    Applied,
    /// The registry refused the policy; the run continues without it
    Skipped { reason: String },
}

/// Idempotent repository setup on top of a [`RegistryService`]
pub struct RepositoryManager<'a> {
    registry: &'a dyn RegistryService,
}

impl<'a> RepositoryManager<'a> {
    pub fn new(registry: &'a dyn RegistryService) -> Self {
        Self { registry }
    }

    /// Find or create the repository and merge in `tags`
    pub async fn ensure_repository(&self, name: &str, tags: &Tags) -> CacheResult<RegistryLocation> {
        let repository = match self.registry.describe_repository(name).await? {
            Some(existing) => {
                debug!("Repository {} exists: {}", name, existing.arn);
                if !tags.is_empty() {
                    info!("Tagging repository {} with {} tag(s)", name, tags.len());
                    self.registry.tag_resource(&existing.arn, tags).await?;
                }
                existing
            }
            None => {
                info!("Creating repository {}", name);
                self.registry.create_repository(name, tags).await?
            }
        };

        Ok(RegistryLocation::new(repository.uri))
    }

    /// Install the single-rule expiration policy
    ///
    /// Failures are logged and reported as [`PolicyOutcome::Skipped`] so
    /// that least-privilege pipelines can still build and push.
    pub async fn apply_expiration_policy(&self, name: &str, max_age_days: u32) -> PolicyOutcome {
        let policy = LifecyclePolicy::expire_after_days(max_age_days);
        match self.registry.put_lifecycle_policy(name, &policy).await {
            Ok(()) => {
                info!("Expiring images in {} after {} days", name, max_age_days);
                PolicyOutcome::Applied
            }
            Err(e) => {
                warn!("Could not apply lifecycle policy to {}: {}", name, e);
                PolicyOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }
}
