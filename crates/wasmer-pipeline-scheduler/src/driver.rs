//! Pipeline driver - runs the default job sequence or a chosen subset.

use tokio::sync::mpsc;
use tracing::{debug, error, info};
use wasmer_pipeline_core::{Job, JobOutput, Result, RunOptions, RunState, SourceRef};

use crate::runner::JobRunner;

/// Event emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A job changed state. Every planned job is reported `Pending` before
    /// the first one starts.
    JobState { job: Job, state: RunState },
    PipelineCompleted { state: RunState },
}

/// Jobs a run executes: every job in default order when `names` is empty,
/// otherwise the named jobs in the given order.
///
/// Fails on the first unknown name.
pub fn select_jobs(names: &[String]) -> Result<Vec<Job>> {
    if names.is_empty() {
        return Ok(Job::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| name.parse::<Job>())
        .collect::<Result<Vec<_>>>()
        .inspect_err(|e| error!(error = %e, "Unknown job requested"))
}

/// Outputs of a successful pipeline run, in execution order.
#[derive(Debug, Default)]
pub struct PipelineResult {
    pub outputs: Vec<(Job, JobOutput)>,
}

impl PipelineResult {
    /// Output of the last job that ran.
    pub fn last(&self) -> Option<&JobOutput> {
        self.outputs.last().map(|(_, output)| output)
    }
}

/// Drives one pipeline run over a [`JobRunner`].
pub struct PipelineDriver {
    runner: JobRunner,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

impl PipelineDriver {
    pub fn new(runner: JobRunner) -> Self {
        Self {
            runner,
            events: None,
        }
    }

    /// Report progress on `tx` as jobs start and finish.
    pub fn with_events(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run the pipeline.
    ///
    /// With no job names, runs build then deploy. Otherwise every name is
    /// looked up before anything runs, then the jobs run in the given order
    /// with the same source and options. The first failing job stops the run.
    pub async fn run(
        &self,
        src: &SourceRef,
        jobs: &[String],
        options: RunOptions,
    ) -> Result<PipelineResult> {
        let selected = select_jobs(jobs)?;
        info!(jobs = ?selected, cache = options.cache, "Running pipeline");

        for job in &selected {
            self.transition(*job, RunState::Pending).await;
        }

        let mut result = PipelineResult::default();

        for job in selected {
            let call = job.call(src, None, options);
            self.transition(job, RunState::Running).await;

            match self.runner.dispatch(&call).await {
                Ok(output) => {
                    info!(job = %job, "Job completed successfully");
                    self.transition(job, RunState::Succeeded).await;
                    result.outputs.push((job, output));
                }
                Err(e) => {
                    error!(job = %job, error = %e, "Job failed");
                    let failed = RunState::Failed {
                        message: e.to_string(),
                    };
                    self.transition(job, failed.clone()).await;
                    self.emit(PipelineEvent::PipelineCompleted { state: failed })
                        .await;
                    return Err(e);
                }
            }
        }

        info!(jobs = result.outputs.len(), "Pipeline completed");
        self.emit(PipelineEvent::PipelineCompleted {
            state: RunState::Succeeded,
        })
        .await;

        Ok(result)
    }

    async fn transition(&self, job: Job, state: RunState) {
        debug!(job = %job, state = ?state, "Job state changed");
        self.emit(PipelineEvent::JobState { job, state }).await;
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingEngine;
    use std::sync::Arc;
    use wasmer_pipeline_config::{PipelineConfig, PipelineEnv};
    use wasmer_pipeline_core::Error;

    fn driver(engine: Arc<RecordingEngine>) -> PipelineDriver {
        let env = PipelineEnv {
            wasmer_token: Some("tok".to_string()),
            cargo_wasix_version: None,
        };
        let config = PipelineConfig {
            work_dir: "/tmp/wasmer-pipeline-test".into(),
            ..Default::default()
        };
        PipelineDriver::new(JobRunner::new(engine, config, &env))
    }

    fn names(jobs: &[&str]) -> Vec<String> {
        jobs.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_default_run_builds_then_deploys_with_cache() {
        let engine = Arc::new(RecordingEngine::new());
        let driver = driver(engine.clone());

        let result = driver
            .run(&SourceRef::default(), &[], RunOptions::default())
            .await
            .unwrap();

        assert_eq!(engine.pipelines(), vec!["build", "deploy"]);
        let jobs: Vec<Job> = result.outputs.iter().map(|(job, _)| *job).collect();
        assert_eq!(jobs, vec![Job::Build, Job::Deploy]);
        assert_eq!(
            result.last(),
            Some(&JobOutput::Text(RecordingEngine::STDOUT.to_string()))
        );

        let deploy = &engine.calls()[1].container;
        assert_eq!(deploy.directory_copies().next().unwrap().exclude, vec!["target"]);
    }

    #[tokio::test]
    async fn test_selected_jobs_run_in_given_order() {
        let engine = Arc::new(RecordingEngine::new());
        let driver = driver(engine.clone());

        driver
            .run(&SourceRef::default(), &names(&["deploy"]), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.pipelines(), vec!["deploy"]);

        driver
            .run(
                &SourceRef::default(),
                &names(&["deploy", "build"]),
                RunOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(engine.pipelines(), vec!["deploy", "deploy", "build"]);
    }

    #[tokio::test]
    async fn test_no_cache_applies_to_selected_deploy() {
        let engine = Arc::new(RecordingEngine::new());
        let driver = driver(engine.clone());

        driver
            .run(
                &SourceRef::default(),
                &names(&["deploy"]),
                RunOptions { cache: false },
            )
            .await
            .unwrap();

        let deploy = &engine.calls()[0].container;
        assert!(deploy.directory_copies().next().unwrap().exclude.is_empty());
        assert_eq!(deploy.cache_mounts().count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_job_fails_before_anything_runs() {
        let engine = Arc::new(RecordingEngine::new());
        let driver = driver(engine.clone());

        let err = driver
            .run(&SourceRef::default(), &names(&["nonexistent"]), RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::JobNotFound(name) if name == "nonexistent"));

        let err = driver
            .run(
                &SourceRef::default(),
                &names(&["build", "nonexistent"]),
                RunOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::JobNotFound(_)));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failing_job_stops_the_run() {
        let engine = Arc::new(RecordingEngine::failing("build"));
        let driver = driver(engine.clone());

        let err = driver
            .run(&SourceRef::default(), &[], RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed(_)));
        assert_eq!(engine.pipelines(), vec!["build"]);
    }

    #[tokio::test]
    async fn test_events_follow_job_lifecycle() {
        let engine = Arc::new(RecordingEngine::failing("deploy"));
        let (tx, mut rx) = mpsc::channel(16);
        let driver = driver(engine).with_events(tx);

        let _ = driver
            .run(&SourceRef::default(), &[], RunOptions::default())
            .await;
        drop(driver);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        let state = |job, state| PipelineEvent::JobState { job, state };
        assert_eq!(events.len(), 7);
        assert_eq!(events[0], state(Job::Build, RunState::Pending));
        assert_eq!(events[1], state(Job::Deploy, RunState::Pending));
        assert_eq!(events[2], state(Job::Build, RunState::Running));
        assert_eq!(events[3], state(Job::Build, RunState::Succeeded));
        assert_eq!(events[4], state(Job::Deploy, RunState::Running));
        assert!(matches!(
            &events[5],
            PipelineEvent::JobState { job: Job::Deploy, state: RunState::Failed { message } }
                if message.contains("exited with code")
        ));
        assert!(matches!(
            &events[6],
            PipelineEvent::PipelineCompleted { state: RunState::Failed { .. } }
        ));
    }

    #[tokio::test]
    async fn test_successful_run_completes_with_succeeded_state() {
        let engine = Arc::new(RecordingEngine::new());
        let (tx, mut rx) = mpsc::channel(16);
        let driver = driver(engine).with_events(tx);

        driver
            .run(&SourceRef::default(), &names(&["build"]), RunOptions::default())
            .await
            .unwrap();
        drop(driver);

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(PipelineEvent::PipelineCompleted {
                state: RunState::Succeeded
            })
        );
    }

    #[test]
    fn test_select_jobs() {
        assert_eq!(select_jobs(&[]).unwrap(), vec![Job::Build, Job::Deploy]);
        assert_eq!(
            select_jobs(&names(&["deploy", "build"])).unwrap(),
            vec![Job::Deploy, Job::Build]
        );
        assert!(matches!(
            select_jobs(&names(&["build", "nonexistent"])),
            Err(Error::JobNotFound(name)) if name == "nonexistent"
        ));
    }
}
