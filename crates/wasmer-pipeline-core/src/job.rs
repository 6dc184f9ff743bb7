//! Job definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::directory::DirectoryId;
use crate::resolve::{SourceRef, TokenRef};
use crate::{Error, Result};

/// The jobs a pipeline can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Job {
    Build,
    Deploy,
}

impl Job {
    /// Every job, in default execution order.
    pub const ALL: [Job; 2] = [Job::Build, Job::Deploy];

    pub fn name(&self) -> &'static str {
        match self {
            Job::Build => "build",
            Job::Deploy => "deploy",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Job::Build => "Build the project (wasix)",
            Job::Deploy => "Deploy to Wasmer Edge",
        }
    }

    /// Build the call for this job from arguments shared by a selective run.
    pub fn call(&self, src: &SourceRef, token: Option<&TokenRef>, options: RunOptions) -> JobCall {
        match self {
            Job::Build => JobCall::Build(BuildArgs { src: src.clone() }),
            Job::Deploy => JobCall::Deploy(DeployArgs {
                src: src.clone(),
                token: token.cloned(),
                cache: options.cache,
            }),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Job {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Job::ALL
            .into_iter()
            .find(|job| job.name() == s)
            .ok_or_else(|| Error::JobNotFound(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArgs {
    pub src: SourceRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployArgs {
    pub src: SourceRef,
    /// Explicit credential; the environment value still wins when set.
    pub token: Option<TokenRef>,
    /// Mount the build-target cache volume and keep the source's `target`
    /// directory out of the copy.
    pub cache: bool,
}

/// A job together with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCall {
    Build(BuildArgs),
    Deploy(DeployArgs),
}

impl JobCall {
    pub fn job(&self) -> Job {
        match self {
            JobCall::Build(_) => Job::Build,
            JobCall::Deploy(_) => Job::Deploy,
        }
    }
}

/// What a job returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// A directory registered in the run's session.
    Directory(DirectoryId),
    /// Captured standard output.
    Text(String),
}

impl fmt::Display for JobOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutput::Directory(id) => write!(f, "{}", id),
            JobOutput::Text(text) => f.write_str(text),
        }
    }
}

/// Options shared by every job of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub cache: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { cache: true }
    }
}

/// State of a job within a run, or of the run itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed { message: String },
}

impl RunState {
    pub fn is_success(&self) -> bool {
        matches!(self, RunState::Succeeded)
    }
}
