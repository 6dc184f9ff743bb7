//! Configuration for the Wasmer Edge pipeline.
//!
//! This crate handles:
//! - Pipeline settings (wasmer-pipeline.kdl)
//! - Environment read at the process boundary
//! - Host triple selection for the wasix toolchain
//! - CI workflow generation (GitHub Actions, CircleCI)

pub mod env;
pub mod error;
pub mod platform;
pub mod settings;
pub mod workflows;

pub use env::PipelineEnv;
pub use error::{ConfigError, ConfigResult};
pub use platform::host_triple;
pub use settings::{BuildConfig, DEFAULT_CONFIG_FILE, DeployConfig, PipelineConfig, parse_config};
pub use workflows::Provider;
