//! In-memory registry and image engine for tests

use crate::error::{CacheError, CacheResult};
use crate::image::{BuildRequest, ImageEngine};
use crate::registry::{
    LifecyclePolicy, RegistryCredentials, RegistryLocation, RegistryService,
    RepositoryDescription, Tags,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

const REGISTRY_HOST: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com";

#[derive(Default)]
struct Repository {
    tags: Tags,
    policy: Option<LifecyclePolicy>,
}

/// Registry that keeps repositories in memory and records every call
#[derive(Default)]
pub struct FakeRegistry {
    repositories: Mutex<BTreeMap<String, Repository>>,
    calls: Mutex<Vec<String>>,
    lookup_error: Option<String>,
    policy_fails: bool,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(self, name: &str) -> Self {
        self.repositories
            .lock()
            .unwrap()
            .insert(name.to_string(), Repository::default());
        self
    }

    /// Fail lookups with something other than "not found"
    pub fn failing_lookup(mut self, reason: &str) -> Self {
        self.lookup_error = Some(reason.to_string());
        self
    }

    /// Reject lifecycle policies as if permission were missing
    pub fn failing_policy(mut self) -> Self {
        self.policy_fails = true;
        self
    }

    pub fn uri_for(&self, name: &str) -> String {
        format!("{}/{}", REGISTRY_HOST, name)
    }

    fn arn_for(name: &str) -> String {
        format!("arn:aws:ecr:us-east-1:123456789012:repository/{}", name)
    }

    fn name_for_arn(arn: &str) -> Option<&str> {
        arn.split_once(":repository/").map(|(_, name)| name)
    }

    fn description(&self, name: &str) -> RepositoryDescription {
        RepositoryDescription {
            uri: self.uri_for(name),
            registry_id: "123456789012".to_string(),
            arn: Self::arn_for(name),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with("create "))
            .count()
    }

    pub fn tags_of(&self, name: &str) -> Tags {
        self.repositories
            .lock()
            .unwrap()
            .get(name)
            .map(|r| r.tags.clone())
            .unwrap_or_default()
    }

    pub fn policy_of(&self, name: &str) -> Option<LifecyclePolicy> {
        self.repositories
            .lock()
            .unwrap()
            .get(name)
            .and_then(|r| r.policy.clone())
    }
}

#[async_trait]
impl RegistryService for FakeRegistry {
    async fn describe_repository(&self, name: &str) -> CacheResult<Option<RepositoryDescription>> {
        self.record(format!("describe {}", name));
        if let Some(reason) = &self.lookup_error {
            return Err(CacheError::RepositoryLookup {
                name: name.to_string(),
                reason: reason.clone(),
            });
        }
        let exists = self.repositories.lock().unwrap().contains_key(name);
        Ok(exists.then(|| self.description(name)))
    }

    async fn create_repository(
        &self,
        name: &str,
        tags: &Tags,
    ) -> CacheResult<RepositoryDescription> {
        self.record(format!("create {}", name));
        let mut repositories = self.repositories.lock().unwrap();
        if repositories.contains_key(name) {
            return Err(CacheError::RepositoryCreate {
                name: name.to_string(),
                reason: "RepositoryAlreadyExistsException".to_string(),
            });
        }
        repositories.insert(
            name.to_string(),
            Repository {
                tags: tags.clone(),
                policy: None,
            },
        );
        Ok(self.description(name))
    }

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> CacheResult<()> {
        self.record(format!("tag {}", arn));
        let mut repositories = self.repositories.lock().unwrap();
        let repository = Self::name_for_arn(arn)
            .and_then(|name| repositories.get_mut(name))
            .ok_or_else(|| CacheError::RepositoryTag {
                arn: arn.to_string(),
                reason: "InvalidParameterException".to_string(),
            })?;
        repository.tags.extend(tags.clone());
        Ok(())
    }

    async fn put_lifecycle_policy(&self, name: &str, policy: &LifecyclePolicy) -> CacheResult<()> {
        self.record(format!("policy {}", name));
        if self.policy_fails {
            return Err(CacheError::LifecyclePolicy {
                name: name.to_string(),
                reason: "AccessDeniedException".to_string(),
            });
        }
        if let Some(repository) = self.repositories.lock().unwrap().get_mut(name) {
            repository.policy = Some(policy.clone());
        }
        Ok(())
    }

    async fn login_credentials(
        &self,
        _location: &RegistryLocation,
    ) -> CacheResult<RegistryCredentials> {
        self.record("login".to_string());
        Ok(RegistryCredentials {
            username: "AWS".to_string(),
            password: "token".to_string(),
        })
    }

    fn service_name(&self) -> &'static str {
        "Fake registry"
    }
}

/// Image engine with a simulated local store and remote registry
#[derive(Default)]
pub struct FakeEngine {
    /// Local reference -> image id
    local: Mutex<BTreeMap<String, String>>,
    /// Remote reference -> image id
    remote: Mutex<BTreeMap<String, String>>,
    calls: Mutex<Vec<String>>,
    builds: Mutex<Vec<BuildRequest>>,
    failing: BTreeSet<&'static str>,
    failing_pushes: BTreeSet<String>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `reference` was already pushed
    pub fn with_remote(self, reference: &str) -> Self {
        self.remote
            .lock()
            .unwrap()
            .insert(reference.to_string(), "sha256:cached".to_string());
        self
    }

    /// Make one operation (`build`, `tag`, `push`, `login`) fail
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Make pushes of `reference` fail while other pushes succeed
    pub fn failing_push_of(mut self, reference: &str) -> Self {
        self.failing_pushes.insert(reference.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn builds(&self) -> Vec<BuildRequest> {
        self.builds.lock().unwrap().clone()
    }

    pub fn remote_image(&self, reference: &str) -> Option<String> {
        self.remote.lock().unwrap().get(reference).cloned()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ImageEngine for FakeEngine {
    async fn login(&self, registry: &str, _credentials: &RegistryCredentials) -> CacheResult<()> {
        self.record(format!("login {}", registry));
        if self.failing.contains("login") {
            return Err(CacheError::RegistryLogin {
                registry: registry.to_string(),
                reason: "denied".to_string(),
            });
        }
        Ok(())
    }

    async fn pull(&self, reference: &str) -> CacheResult<bool> {
        self.record(format!("pull {}", reference));
        let image = self.remote.lock().unwrap().get(reference).cloned();
        match image {
            Some(id) => {
                self.local.lock().unwrap().insert(reference.to_string(), id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn build(&self, request: &BuildRequest) -> CacheResult<()> {
        self.record(format!("build {}", request.tag));
        self.builds.lock().unwrap().push(request.clone());
        if self.failing.contains("build") {
            return Err(CacheError::ImageBuild {
                image: request.tag.clone(),
                output: "RUN exited with 1".to_string(),
            });
        }
        let id = format!("sha256:built-{}", self.builds.lock().unwrap().len());
        self.local.lock().unwrap().insert(request.tag.clone(), id);
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> CacheResult<()> {
        self.record(format!("tag {} {}", source, target));
        let id = self.local.lock().unwrap().get(source).cloned();
        match id {
            Some(id) if !self.failing.contains("tag") => {
                self.local.lock().unwrap().insert(target.to_string(), id);
                Ok(())
            }
            _ => Err(CacheError::ImageTag {
                source_image: source.to_string(),
                target: target.to_string(),
                reason: "No such image".to_string(),
            }),
        }
    }

    async fn push(&self, reference: &str) -> CacheResult<()> {
        self.record(format!("push {}", reference));
        let id = self.local.lock().unwrap().get(reference).cloned();
        match id {
            Some(id)
                if !self.failing.contains("push") && !self.failing_pushes.contains(reference) =>
            {
                self.remote.lock().unwrap().insert(reference.to_string(), id);
                Ok(())
            }
            _ => Err(CacheError::ImagePush {
                image: reference.to_string(),
                reason: "denied".to_string(),
            }),
        }
    }

    fn engine_name(&self) -> &'static str {
        "Fake engine"
    }
}
