//! Container engines for the Wasmer Edge pipeline.
//!
//! Provides engine implementations for running container plans:
//! - Local Docker

pub mod docker;

pub use docker::DockerEngine;
pub use wasmer_pipeline_core::engine::{ContainerEngine, Platform};
