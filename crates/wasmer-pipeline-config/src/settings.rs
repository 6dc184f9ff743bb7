//! Pipeline settings parsing.
//!
//! Settings live in an optional `wasmer-pipeline.kdl` file:
//!
//! ```kdl
//! build {
//!     image "rust:1.75-bookworm"
//!     rust-version "1.75.0"
//!     cargo-wasix-version "v0.1.23"
//!     wasix-release "v2023-11-01.1"
//! }
//! deploy {
//!     image "ubuntu"
//!     installer-url "https://get.wasmer.io"
//!     wasmer-dir "/root/.wasmer"
//! }
//! exclude "target" ".git" ".fluentci"
//! work-dir "/tmp/wasmer-pipeline"
//! ```
//!
//! Every setting is optional and defaults to the values shown.

use crate::{ConfigError, ConfigResult, PipelineEnv};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File looked up in the source directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "wasmer-pipeline.kdl";

/// Settings for the build job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Base image of the build container.
    pub image: String,
    /// Rust toolchain shipped in the image; its cargo is reused by the
    /// wasix toolchain.
    pub rust_version: String,
    /// cargo-wasix release tag.
    pub cargo_wasix_version: String,
    /// wasix-org/rust release providing the toolchain and wasix-libc.
    pub wasix_release: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            image: "rust:1.75-bookworm".to_string(),
            rust_version: "1.75.0".to_string(),
            cargo_wasix_version: "v0.1.23".to_string(),
            wasix_release: "v2023-11-01.1".to_string(),
        }
    }
}

/// Settings for the deploy job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Base image of the deploy container.
    pub image: String,
    /// Wasmer CLI install script.
    pub installer_url: String,
    /// WASMER_DIR inside the deploy container.
    pub wasmer_dir: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            image: "ubuntu".to_string(),
            installer_url: "https://get.wasmer.io".to_string(),
            wasmer_dir: "/root/.wasmer".to_string(),
        }
    }
}

/// Pipeline-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub build: BuildConfig,
    pub deploy: DeployConfig,
    /// Source entries never copied into the build container.
    pub exclude: Vec<String>,
    /// Host directory where exported build outputs are written.
    pub work_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            deploy: DeployConfig::default(),
            exclude: vec![
                "target".to_string(),
                ".git".to_string(),
                ".fluentci".to_string(),
            ],
            work_dir: std::env::temp_dir().join("wasmer-pipeline"),
        }
    }
}

impl PipelineConfig {
    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, `wasmer-pipeline.kdl` in
    /// `src_dir` is used when present, and defaults otherwise.
    pub fn load(path: Option<&Path>, src_dir: &Path) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = src_dir.join(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    debug!(path = %candidate.display(), "No pipeline settings file, using defaults");
                    return Ok(Self::default());
                }
                candidate
            }
        };

        info!(path = %path.display(), "Loading pipeline settings");
        let content = std::fs::read_to_string(&path)?;
        parse_config(&content)
    }

    /// Apply overrides taken from the process environment.
    pub fn apply_env(&mut self, env: &PipelineEnv) {
        if let Some(version) = &env.cargo_wasix_version {
            debug!(version = %version, "Overriding cargo-wasix version from environment");
            self.build.cargo_wasix_version = version.clone();
        }
    }
}

/// Parse pipeline settings from KDL text.
pub fn parse_config(kdl: &str) -> ConfigResult<PipelineConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = PipelineConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "build" => parse_build(node, &mut config.build)?,
            "deploy" => parse_deploy(node, &mut config.deploy)?,
            "exclude" => {
                config.exclude = get_all_string_args(node);
            }
            "work-dir" => {
                let dir = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("work-dir path".to_string()))?;
                config.work_dir = PathBuf::from(dir);
            }
            other => {
                return Err(ConfigError::InvalidValue {
                    field: other.to_string(),
                    message: "unknown setting".to_string(),
                });
            }
        }
    }

    Ok(config)
}

fn parse_build(node: &KdlNode, build: &mut BuildConfig) -> ConfigResult<()> {
    for child in child_nodes(node) {
        let key = child.name().value();
        let value = required_string(child, key)?;
        match key {
            "image" => build.image = value,
            "rust-version" => build.rust_version = value,
            "cargo-wasix-version" => build.cargo_wasix_version = value,
            "wasix-release" => build.wasix_release = value,
            _ => return Err(unknown_setting("build", key)),
        }
    }
    Ok(())
}

fn parse_deploy(node: &KdlNode, deploy: &mut DeployConfig) -> ConfigResult<()> {
    for child in child_nodes(node) {
        let key = child.name().value();
        let value = required_string(child, key)?;
        match key {
            "image" => deploy.image = value,
            "installer-url" => deploy.installer_url = value,
            "wasmer-dir" => deploy.wasmer_dir = value,
            _ => return Err(unknown_setting("deploy", key)),
        }
    }
    Ok(())
}

fn unknown_setting(section: &str, key: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: format!("{}.{}", section, key),
        message: "unknown setting".to_string(),
    }
}

// Helper functions for extracting values from KDL nodes

fn child_nodes(node: &KdlNode) -> impl Iterator<Item = &KdlNode> {
    node.children().into_iter().flat_map(|c| c.nodes())
}

fn required_string(node: &KdlNode, field: &str) -> ConfigResult<String> {
    get_first_string_arg(node).ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        message: "expected a string value".to_string(),
    })
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}
