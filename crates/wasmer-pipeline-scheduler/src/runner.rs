//! Job runner - executes the build and deploy jobs.

use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};
use wasmer_pipeline_config::{PipelineConfig, PipelineEnv, host_triple};
use wasmer_pipeline_core::{
    ContainerEngine, Error, Job, JobCall, JobOutput, ResourceId, Result, Session, SourceRef,
    TokenRef, resolve_credential, resolve_directory,
};

use crate::recipe::{BUILD_OUTPUT, build_container, deploy_container};

/// Runs jobs against a container engine.
///
/// A runner owns the session of one pipeline run, so directories produced by
/// one job can be handed to the next by id.
pub struct JobRunner {
    engine: Arc<dyn ContainerEngine>,
    session: Arc<Session>,
    config: PipelineConfig,
    /// `WASMER_TOKEN` as read at the process boundary.
    env_token: Option<String>,
    /// Appended to `cargo wasix build --release`.
    build_args: Vec<String>,
    /// Appended to `wasmer deploy --non-interactive`.
    deploy_args: Vec<String>,
}

impl JobRunner {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: PipelineConfig, env: &PipelineEnv) -> Self {
        Self {
            engine,
            session: Arc::new(Session::new()),
            config,
            env_token: env.wasmer_token.clone(),
            build_args: Vec::new(),
            deploy_args: Vec::new(),
        }
    }

    /// Pass extra arguments to the build command.
    pub fn with_build_args(mut self, args: Vec<String>) -> Self {
        self.build_args = args;
        self
    }

    /// Pass extra arguments to the deploy command.
    pub fn with_deploy_args(mut self, args: Vec<String>) -> Self {
        self.deploy_args = args;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run a job with its arguments.
    pub async fn dispatch(&self, call: &JobCall) -> Result<JobOutput> {
        match call {
            JobCall::Build(args) => self.build(&args.src).await,
            JobCall::Deploy(args) => {
                self.deploy(&args.src, args.token.as_ref(), args.cache)
                    .await
            }
        }
    }

    /// Build the project for wasix and return the exported output directory.
    pub async fn build(&self, src: &SourceRef) -> Result<JobOutput> {
        let span = info_span!("job", name = %Job::Build);
        async {
            let context = resolve_directory(&self.session, src);

            let platform = self.engine.platform().await?;
            let triple = host_triple(&platform.os, &platform.arch)
                .map_err(|e| Error::UnsupportedPlatform(e.to_string()))?;
            info!(
                source = %context.path().display(),
                engine = self.engine.name(),
                triple = %triple,
                "Building project"
            );

            let ctr = build_container(
                &self.config.build,
                triple,
                &context,
                &self.config.exclude,
                &self.build_args,
            );
            let dest = self
                .config
                .work_dir
                .join(format!("build-{}", ResourceId::new()));

            let listing = self
                .engine
                .export_directory(&ctr, BUILD_OUTPUT, &dest)
                .await
                .inspect_err(|e| error!(error = %e, "Build failed"))?;
            info!("{}", listing.trim_end());

            let output = self.session.register_directory(dest);
            info!(id = %output.id(), path = %output.path().display(), "Build output exported");
            Ok(JobOutput::Directory(output.id()))
        }
        .instrument(span)
        .await
    }

    /// Deploy to Wasmer Edge and return the deploy command's output.
    ///
    /// Fails with [`Error::MissingCredential`] before touching the engine
    /// when no token can be resolved.
    pub async fn deploy(
        &self,
        src: &SourceRef,
        token: Option<&TokenRef>,
        cache: bool,
    ) -> Result<JobOutput> {
        let span = info_span!("job", name = %Job::Deploy);
        async {
            let context = resolve_directory(&self.session, src);
            let Some(secret) = resolve_credential(&self.session, self.env_token.as_deref(), token)
            else {
                error!("No deploy credential available");
                return Err(Error::MissingCredential);
            };

            info!(
                source = %context.path().display(),
                engine = self.engine.name(),
                cache,
                "Deploying to Wasmer Edge"
            );

            let ctr = deploy_container(
                &self.config.deploy,
                &context,
                &secret,
                cache,
                &self.deploy_args,
            );
            let stdout = self
                .engine
                .stdout(&ctr)
                .await
                .inspect_err(|e| error!(error = %e, "Deploy failed"))?;
            Ok(JobOutput::Text(stdout))
        }
        .instrument(span)
        .await
    }
}
