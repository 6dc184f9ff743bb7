//! CLI command implementations.

pub mod run;

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use wasmer_pipeline_config::{Provider, parse_config, workflows};
use wasmer_pipeline_core::Job;

/// CI provider accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    Github,
    Circleci,
}

impl From<ProviderArg> for Provider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Github => Provider::Github,
            ProviderArg::Circleci => Provider::CircleCi,
        }
    }
}

pub fn jobs() {
    for job in Job::ALL {
        println!("{:<8} {}", job.name(), job.description());
    }
}

pub fn generate(provider: ProviderArg, output: Option<PathBuf>, write: bool) -> Result<()> {
    let provider = Provider::from(provider);
    let yaml = workflows::generate(provider).context("Failed to render workflow")?;

    let path = match (output, write) {
        (Some(path), _) => path,
        (None, true) => PathBuf::from(provider.default_path()),
        (None, false) => {
            print!("{}", yaml);
            return Ok(());
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, yaml)
        .with_context(|| format!("Failed to write workflow: {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn validate(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Configuration error in {}", path.display()))?;

    println!("Configuration is valid");
    println!("  build image:  {}", config.build.image);
    println!("  cargo-wasix:  {}", config.build.cargo_wasix_version);
    println!("  deploy image: {}", config.deploy.image);
    println!("  exclude:      {}", config.exclude.join(", "));
    Ok(())
}
