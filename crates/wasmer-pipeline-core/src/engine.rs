//! Container engine trait.
//!
//! Engines realize [`Container`] plans in isolated environments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;
use crate::container::Container;

/// Operating system and architecture containers run on, as reported by the
/// engine (e.g. `linux`/`amd64`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

/// Trait for container engines.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Name of this engine.
    fn name(&self) -> &'static str;

    /// Platform containers are run on.
    async fn platform(&self) -> Result<Platform>;

    /// Run the plan and return the standard output of its last command.
    async fn stdout(&self, container: &Container) -> Result<String>;

    /// Run the plan, then copy the directory at `path` inside the container to
    /// `dest` on the host. Returns the standard output of the last command.
    async fn export_directory(
        &self,
        container: &Container,
        path: &str,
        dest: &Path,
    ) -> Result<String>;
}
