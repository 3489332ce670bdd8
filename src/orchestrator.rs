//! Pull-or-build control flow
//!
//! One run is a small state machine:
//!
//! | Phase | Next on success | Next on failure |
//! |-------|-----------------|-----------------|
//! | Pull `<location>:<fingerprint>` | Done (hit) | Build |
//! | Build, tagged with the fingerprint | Tag `latest` | Failed |
//! | Tag `latest` locally | Push fingerprint | Failed |
//! | Push fingerprint | Push `latest` | Failed |
//! | Push `latest` | Done (built) | Failed |
//!
//! A failure after the first push leaves the registry half updated: the
//! fingerprint tag may exist without a matching `latest`. Nothing is rolled
//! back.

use crate::error::CacheResult;
use crate::fingerprint::Fingerprint;
use crate::image::{BuildRequest, ImageEngine};
use crate::registry::{RegistryLocation, RegistryService};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Floating tag that follows the most recent build
pub const LATEST_TAG: &str = "latest";

/// How a run obtained its image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum CacheOutcome {
    /// The fingerprint was already published
    Hit { image: String },
    /// The image was built and published under both tags
    Built { image: String, latest: String },
}

impl CacheOutcome {
    /// `<location>:<fingerprint>`
    pub fn image(&self) -> &str {
        match self {
            Self::Hit { image } | Self::Built { image, .. } => image,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit { .. } => write!(f, "cache hit"),
            Self::Built { .. } => write!(f, "built and pushed"),
        }
    }
}

/// Drives pull, build, tag and push for one fingerprint
pub struct BuildOrchestrator<'a> {
    registry: &'a dyn RegistryService,
    engine: &'a dyn ImageEngine,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(registry: &'a dyn RegistryService, engine: &'a dyn ImageEngine) -> Self {
        Self { registry, engine }
    }

    /// Log the image engine in to the registry at `location`
    pub async fn authenticate(&self, location: &RegistryLocation) -> CacheResult<()> {
        info!(
            "Logging {} in to {}",
            self.engine.engine_name(),
            self.registry.service_name()
        );
        let credentials = self.registry.login_credentials(location).await?;
        self.engine.login(location.host(), &credentials).await
    }

    /// Reuse the image published under `fingerprint`, or build and publish it
    ///
    /// `template` supplies everything but the tag, which is always
    /// `<location>:<fingerprint>`.
    pub async fn run(
        &self,
        location: &RegistryLocation,
        fingerprint: &Fingerprint,
        template: &BuildRequest,
    ) -> CacheResult<CacheOutcome> {
        let image = location.reference(fingerprint);

        if self.engine.pull(&image).await? {
            info!("Found cached image {}", image);
            return Ok(CacheOutcome::Hit { image });
        }

        info!("No image for fingerprint {}, building", fingerprint);
        let request = BuildRequest {
            tag: image.clone(),
            ..template.clone()
        };
        self.engine.build(&request).await?;

        let latest = location.reference(LATEST_TAG);
        self.engine.tag(&image, &latest).await?;

        self.engine.push(&image).await?;
        self.engine.push(&latest).await?;

        info!("Published {} and {}", image, latest);
        Ok(CacheOutcome::Built { image, latest })
    }
}
