//! Pipeline and single-job execution commands.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use wasmer_pipeline_config::{PipelineConfig, PipelineEnv};
use wasmer_pipeline_core::{
    Error, Job, JobOutput, RunOptions, RunState, SourceRef, TokenRef, has_credential,
};
use wasmer_pipeline_executor::DockerEngine;
use wasmer_pipeline_scheduler::{JobRunner, PipelineDriver, PipelineEvent, select_jobs};

/// Fail when a deploy is planned without a credential.
///
/// Runs before connecting to Docker so a missing token is reported as such.
fn check_credential(env: &PipelineEnv, jobs: &[Job], token: Option<&TokenRef>) -> Result<()> {
    if jobs.contains(&Job::Deploy) && !has_credential(env.wasmer_token.as_deref(), token) {
        return Err(Error::MissingCredential.into());
    }
    Ok(())
}

fn runner(env: &PipelineEnv, config_path: Option<&Path>, src: &str) -> Result<JobRunner> {
    let mut config = PipelineConfig::load(config_path, Path::new(src))
        .context("Failed to load pipeline settings")?;
    config.apply_env(env);

    let engine = DockerEngine::new().context("Failed to connect to Docker")?;
    Ok(JobRunner::new(Arc::new(engine), config, env))
}

/// Run the default pipeline or the named jobs.
pub async fn run(
    env: &PipelineEnv,
    config_path: Option<&Path>,
    src: &str,
    cache: bool,
    jobs: Vec<String>,
) -> Result<()> {
    let selected = select_jobs(&jobs)?;
    check_credential(env, &selected, None)?;

    let (tx, rx) = mpsc::channel(16);
    let driver = PipelineDriver::new(runner(env, config_path, src)?).with_events(tx);
    let printer = tokio::spawn(print_events(rx));

    let result = driver
        .run(&SourceRef::from(src), &jobs, RunOptions { cache })
        .await;

    // Closing the sender ends the event stream.
    drop(driver);
    let _ = printer.await;

    let result = result.context("Pipeline failed")?;
    if let Some(output) = result.last() {
        println!("{}", output);
    }
    Ok(())
}

/// Build the project and print where the output was exported.
pub async fn build(
    env: &PipelineEnv,
    config_path: Option<&Path>,
    src: &str,
    args: Vec<String>,
) -> Result<()> {
    let runner = runner(env, config_path, src)?.with_build_args(args);
    let output = runner
        .build(&SourceRef::from(src))
        .await
        .context("Build failed")?;

    if let JobOutput::Directory(id) = &output {
        if let Some(dir) = runner.session().load_directory(id) {
            println!("Build output: {}", dir.path().display());
        }
    }
    Ok(())
}

/// Deploy the project and print the deploy command's output.
pub async fn deploy(
    env: &PipelineEnv,
    config_path: Option<&Path>,
    src: &str,
    token: Option<String>,
    cache: bool,
    args: Vec<String>,
) -> Result<()> {
    let token = token.map(TokenRef::from);
    check_credential(env, &[Job::Deploy], token.as_ref())?;

    let runner = runner(env, config_path, src)?.with_deploy_args(args);
    let output = runner
        .deploy(&SourceRef::from(src), token.as_ref(), cache)
        .await
        .context("Deploy failed")?;
    println!("{}", output);
    Ok(())
}

async fn print_events(mut rx: mpsc::Receiver<PipelineEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::JobState { job, state } => match state {
                RunState::Pending => println!("○ Job '{}' pending", job),
                RunState::Running => println!("▶ Job '{}' started", job),
                RunState::Succeeded => println!("✓ Job '{}' completed successfully\n", job),
                RunState::Failed { message } => println!("✗ Job '{}' failed: {}\n", job, message),
            },
            PipelineEvent::PipelineCompleted { state } => {
                if state.is_success() {
                    println!("--- Pipeline completed successfully ---");
                } else {
                    println!("--- Pipeline failed ---");
                }
            }
        }
    }
}
