//! Core types and traits for the Wasmer Edge build-and-deploy pipeline.
//!
//! This crate contains:
//! - Resource identifiers and the error type
//! - Directory and secret handles, and the per-run handle session
//! - Source and credential resolution
//! - The container plan builder and the engine trait that runs it
//! - Job definitions and dispatch arguments

pub mod container;
pub mod directory;
pub mod engine;
pub mod error;
pub mod id;
pub mod job;
pub mod resolve;
pub mod secret;
pub mod session;

pub use container::{CacheMount, Container, DirectoryCopy, EnvVariable, Step};
pub use directory::{Directory, DirectoryId};
pub use engine::{ContainerEngine, Platform};
pub use error::{Error, Result};
pub use id::ResourceId;
pub use job::{BuildArgs, DeployArgs, Job, JobCall, JobOutput, RunOptions, RunState};
pub use resolve::{SourceRef, TokenRef, has_credential, resolve_credential, resolve_directory};
pub use secret::{Secret, SecretId};
pub use session::Session;
