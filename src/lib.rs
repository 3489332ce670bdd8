//! ecr-cache - content-addressed container image cache for CI steps
//!
//! Computes a short fingerprint of a build definition, reuses the image
//! published under it, or builds and publishes it under both the fingerprint
//! and `latest`.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod image;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;
pub mod ui;

#[cfg(test)]
mod testutil;

pub use error::{CacheError, CacheResult};
