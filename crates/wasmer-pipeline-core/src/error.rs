//! Error types for the pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("Job {0} not found")]
    JobNotFound(String),

    #[error(
        "Missing Wasmer token. Please provide a secret or set the WASMER_TOKEN environment variable."
    )]
    MissingCredential,

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
