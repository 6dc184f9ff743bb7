//! CI workflow generation.
//!
//! Emits workflow definitions that run this pipeline from a hosted runner
//! on every push to `main`.

use crate::ConfigResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// Command the generated workflows run.
pub const PIPELINE_COMMAND: &str = "wasmer-pipeline run";
/// Command installing the pipeline binary on the runner.
pub const INSTALL_COMMAND: &str = "cargo install --locked wasmer-pipeline-cli";

/// Supported CI providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Github,
    CircleCi,
}

impl Provider {
    /// Conventional location of the workflow file in a repository.
    pub fn default_path(&self) -> &'static str {
        match self {
            Provider::Github => ".github/workflows/deploy.yml",
            Provider::CircleCi => ".circleci/config.yml",
        }
    }
}

/// Render the workflow for a provider as YAML.
pub fn generate(provider: Provider) -> ConfigResult<String> {
    match provider {
        Provider::Github => Ok(serde_yml::to_string(&github_workflow())?),
        Provider::CircleCi => Ok(serde_yml::to_string(&circleci_config())?),
    }
}

// GitHub Actions

#[derive(Debug, Clone, Serialize)]
pub struct GithubWorkflow {
    pub name: String,
    pub on: GithubTriggers,
    pub jobs: BTreeMap<String, GithubJob>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GithubTriggers {
    pub push: BranchFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchFilter {
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GithubJob {
    #[serde(rename = "runs-on")]
    pub runs_on: String,
    pub steps: Vec<GithubStep>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GithubStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Workflow `Deploy`: on push to `main`, run the pipeline on `ubuntu-latest`.
pub fn github_workflow() -> GithubWorkflow {
    let deploy = GithubJob {
        runs_on: "ubuntu-latest".to_string(),
        steps: vec![
            GithubStep {
                uses: Some("actions/checkout@v4".to_string()),
                ..Default::default()
            },
            GithubStep {
                name: Some("Setup Rust".to_string()),
                uses: Some("dtolnay/rust-toolchain@stable".to_string()),
                ..Default::default()
            },
            GithubStep {
                name: Some("Install wasmer-pipeline".to_string()),
                run: Some(INSTALL_COMMAND.to_string()),
                ..Default::default()
            },
            GithubStep {
                name: Some("Run pipeline".to_string()),
                run: Some(PIPELINE_COMMAND.to_string()),
                env: BTreeMap::from([(
                    "WASMER_TOKEN".to_string(),
                    "${{ secrets.WASMER_TOKEN }}".to_string(),
                )]),
                ..Default::default()
            },
        ],
    };

    GithubWorkflow {
        name: "Deploy".to_string(),
        on: GithubTriggers {
            push: BranchFilter {
                branches: vec!["main".to_string()],
            },
        },
        jobs: BTreeMap::from([("deploy".to_string(), deploy)]),
    }
}

// CircleCI

#[derive(Debug, Clone, Serialize)]
pub struct CircleCiConfig {
    pub version: f32,
    pub jobs: BTreeMap<String, CircleCiJob>,
    pub workflows: BTreeMap<String, CircleCiWorkflow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircleCiJob {
    pub machine: CircleCiMachine,
    pub steps: Vec<CircleCiStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircleCiMachine {
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CircleCiStep {
    /// A built-in step such as `checkout`.
    Builtin(String),
    Run { run: CircleCiRun },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CircleCiRun {
    Command(String),
    Named { name: String, command: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CircleCiWorkflow {
    pub jobs: Vec<BTreeMap<String, CircleCiWorkflowJob>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircleCiWorkflowJob {
    /// Contexts providing environment variables; `wasmer` holds WASMER_TOKEN.
    pub context: Vec<String>,
}

fn run(command: &str) -> CircleCiStep {
    CircleCiStep::Run {
        run: CircleCiRun::Command(command.to_string()),
    }
}

/// Job `deploy` on a machine executor, run by workflow `pipeline` with the
/// `wasmer` context.
pub fn circleci_config() -> CircleCiConfig {
    let deploy = CircleCiJob {
        machine: CircleCiMachine {
            image: "ubuntu-2004:2023.07.1".to_string(),
        },
        steps: vec![
            CircleCiStep::Builtin("checkout".to_string()),
            run("sudo apt-get update && sudo apt-get install -y curl build-essential"),
            run("curl https://sh.rustup.rs -sSf | sh -s -- -y"),
            run(&format!("$HOME/.cargo/bin/{}", INSTALL_COMMAND)),
            CircleCiStep::Run {
                run: CircleCiRun::Named {
                    name: "Run pipeline".to_string(),
                    command: format!("$HOME/.cargo/bin/{}", PIPELINE_COMMAND),
                },
            },
        ],
    };

    CircleCiConfig {
        version: 2.1,
        jobs: BTreeMap::from([("deploy".to_string(), deploy)]),
        workflows: BTreeMap::from([(
            "pipeline".to_string(),
            CircleCiWorkflow {
                jobs: vec![BTreeMap::from([(
                    "deploy".to_string(),
                    CircleCiWorkflowJob {
                        context: vec!["wasmer".to_string()],
                    },
                )])],
            },
        )]),
    }
}
