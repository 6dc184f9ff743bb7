//! Docker engine implementation.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use wasmer_pipeline_core::container::{Container, Step};
use wasmer_pipeline_core::engine::{ContainerEngine, Platform};
use wasmer_pipeline_core::{Error, ResourceId, Result};

/// Where copied host directories are mounted read-only inside the container.
const SOURCE_MOUNT_ROOT: &str = "/run/wasmer-pipeline/src";
/// Where the export destination is mounted inside the container.
const EXPORT_MOUNT: &str = "/run/wasmer-pipeline/export";

/// Engine running container plans against the local Docker daemon.
///
/// Each plan gets one long-lived container. Cache volumes, copied host
/// directories and the export destination are attached as binds when the
/// container is created; every command step then runs as a `docker exec`
/// with the environment and working directory accumulated so far.
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(engine_error)?;
        Ok(Self { docker })
    }

    fn container_name(pipeline: &str, run_id: &ResourceId) -> String {
        format!("wasmer-pipeline-{}-{}", pipeline, run_id)
    }

    async fn pull_image(&self, image: &str) {
        info!(image = %image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut pull_stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = pull_stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!(status = %status, "Pull progress");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Pull warning");
                }
            }
        }
    }

    /// Environment baked into the image, used to expand `$VAR` references.
    async fn image_env(&self, image: &str) -> Result<HashMap<String, String>> {
        let inspect = self
            .docker
            .inspect_image(image)
            .await
            .map_err(engine_error)?;

        Ok(inspect
            .config
            .and_then(|c| c.env)
            .unwrap_or_default()
            .iter()
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect())
    }

    async fn execute(&self, container: &Container, export: Option<(&str, &Path)>) -> Result<String> {
        if container.image().is_empty() {
            return Err(Error::InvalidInput(format!(
                "pipeline '{}' has no base image",
                container.pipeline()
            )));
        }

        let mut sources = Vec::new();
        for copy in container.directory_copies() {
            let source = std::fs::canonicalize(&copy.source).map_err(|e| {
                Error::InvalidInput(format!(
                    "source directory {}: {}",
                    copy.source.display(),
                    e
                ))
            })?;
            sources.push(source);
        }

        let export = match export {
            Some((path, dest)) => Some((path, ExportDir::prepare(dest)?)),
            None => None,
        };

        let result = self
            .run_plan(
                container,
                &sources,
                export.as_ref().map(|(path, dir)| (*path, dir.path())),
            )
            .await;

        if result.is_err() {
            if let Some((_, dir)) = export {
                dir.discard();
            }
        }

        result
    }

    async fn run_plan(
        &self,
        container: &Container,
        sources: &[PathBuf],
        export: Option<(&str, &Path)>,
    ) -> Result<String> {
        self.pull_image(container.image()).await;
        let image_env = self.image_env(container.image()).await?;

        let name = Self::container_name(container.pipeline(), &ResourceId::new());
        let config = Config {
            image: Some(container.image().to_string()),
            entrypoint: Some(vec!["sleep".to_string()]),
            cmd: Some(vec!["infinity".to_string()]),
            tty: Some(false),
            host_config: Some(HostConfig {
                binds: Some(binds(container, sources, export.map(|(_, dir)| dir))),
                ..Default::default()
            }),
            ..Default::default()
        };

        info!(container = %name, image = %container.image(), "Creating container");
        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to create container: {}", e)))?;

        let result = self
            .run_steps(&name, container, image_env, export.map(|(path, _)| path))
            .await;

        if let Err(e) = self.remove_container(&name).await {
            warn!(container = %name, error = %e, "Failed to remove container");
        }

        result
    }

    async fn run_steps(
        &self,
        name: &str,
        container: &Container,
        mut env: HashMap<String, String>,
        export: Option<&str>,
    ) -> Result<String> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to start container: {}", e)))?;

        let mut workdir: Option<String> = None;
        let mut stdout = String::new();
        let mut copy_index = 0;

        for step in container.steps() {
            debug!(pipeline = %container.pipeline(), step = %step, "Applying step");
            match step {
                Step::Exec(args) => {
                    stdout = self
                        .exec(name, args.clone(), &env, workdir.as_deref())
                        .await?;
                }
                Step::MountCache(mount) => {
                    debug!(volume = %mount.volume, path = %mount.path, "Cache volume mounted");
                }
                Step::Directory(copy) => {
                    let staging = format!("{}/{}", SOURCE_MOUNT_ROOT, copy_index);
                    copy_index += 1;
                    let script = copy_script(&staging, &copy.path, &copy.exclude);
                    self.exec(name, shell(script), &env, None).await?;
                }
                Step::Env(var) => {
                    let value = var.resolve(&env);
                    env.insert(var.name.clone(), value);
                }
                Step::SecretEnv { name: var, secret } => {
                    env.insert(var.clone(), secret.expose().to_string());
                }
                Step::Workdir(path) => {
                    workdir = Some(path.clone());
                }
            }
        }

        if let Some(path) = export {
            info!(path = %path, "Exporting directory");
            self.exec(name, shell(export_script(path)), &env, None)
                .await?;
        }

        Ok(stdout)
    }

    /// Run one command, failing on a non-zero exit code. Returns its stdout.
    async fn exec(
        &self,
        name: &str,
        cmd: Vec<String>,
        env: &HashMap<String, String>,
        workdir: Option<&str>,
    ) -> Result<String> {
        let command = cmd.join(" ");
        info!(container = %name, command = %command, "Running command");

        let env: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        let options = CreateExecOptions {
            cmd: Some(cmd),
            env: Some(env),
            working_dir: workdir.map(str::to_string),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(name, options)
            .await
            .map_err(engine_error)?;

        let mut stdout = String::new();
        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(engine_error)?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    match chunk.map_err(engine_error)? {
                        LogOutput::StdOut { message } | LogOutput::Console { message } => {
                            let text = String::from_utf8_lossy(&message);
                            for line in text.lines() {
                                info!(target: "wasmer_pipeline::container", "{}", line);
                            }
                            stdout.push_str(&text);
                        }
                        LogOutput::StdErr { message } => {
                            let text = String::from_utf8_lossy(&message);
                            for line in text.lines() {
                                info!(target: "wasmer_pipeline::container", stream = "stderr", "{}", line);
                            }
                        }
                        LogOutput::StdIn { .. } => {}
                    }
                }
            }
            StartExecResults::Detached => {
                return Err(Error::Internal("exec started detached".to_string()));
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(engine_error)?;

        match inspect.exit_code {
            Some(0) => Ok(stdout),
            Some(code) => Err(Error::ExecutionFailed(format!(
                "`{}` exited with code {}",
                command, code
            ))),
            None => Err(Error::ExecutionFailed(format!(
                "`{}` did not report an exit code",
                command
            ))),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(|e| Error::ExecutionFailed(format!("Failed to remove container: {}", e)))
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn platform(&self) -> Result<Platform> {
        let version = self.docker.version().await.map_err(engine_error)?;
        Ok(Platform::new(
            version.os.unwrap_or_else(|| "linux".to_string()),
            version.arch.unwrap_or_default(),
        ))
    }

    async fn stdout(&self, container: &Container) -> Result<String> {
        self.execute(container, None).await
    }

    async fn export_directory(
        &self,
        container: &Container,
        path: &str,
        dest: &Path,
    ) -> Result<String> {
        self.execute(container, Some((path, dest))).await
    }
}

/// Host directory an export is written to.
///
/// A directory created here is removed again when the plan fails, so failed
/// runs leave nothing behind. A directory that already existed is kept.
struct ExportDir {
    path: PathBuf,
    created: bool,
}

impl ExportDir {
    fn prepare(dest: &Path) -> Result<Self> {
        let created = !dest.exists();
        std::fs::create_dir_all(dest)?;
        Ok(Self {
            path: std::fs::canonicalize(dest)?,
            created,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn discard(self) {
        if !self.created {
            return;
        }
        debug!(path = %self.path.display(), "Removing export directory of failed plan");
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove export directory");
        }
    }
}

fn engine_error(e: bollard::errors::Error) -> Error {
    Error::Engine(e.to_string())
}

/// Bind specifications for a plan: cache volumes, then copied sources, then
/// the export destination.
fn binds(container: &Container, sources: &[PathBuf], export: Option<&Path>) -> Vec<String> {
    let mut binds: Vec<String> = container
        .cache_mounts()
        .map(|m| format!("{}:{}:rw", m.volume, m.path))
        .collect();

    binds.extend(
        sources
            .iter()
            .enumerate()
            .map(|(i, src)| format!("{}:{}/{}:ro", src.display(), SOURCE_MOUNT_ROOT, i)),
    );

    if let Some(dest) = export {
        binds.push(format!("{}:{}:rw", dest.display(), EXPORT_MOUNT));
    }

    binds
}

fn shell(script: String) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script]
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Copy `staging` into `dest`, leaving out the top-level `exclude` entries.
fn copy_script(staging: &str, dest: &str, exclude: &[String]) -> String {
    let excludes: String = exclude
        .iter()
        .map(|e| format!(" --exclude={}", quote(&format!("./{}", e))))
        .collect();
    format!(
        "mkdir -p {dest} && tar -C {src}{excludes} -cf - . | tar -C {dest} -xf -",
        dest = quote(dest),
        src = quote(staging),
        excludes = excludes,
    )
}

fn export_script(path: &str) -> String {
    format!("cp -a {}/. {}/", quote(path), EXPORT_MOUNT)
}


/// Integration tests that require Docker to be running.
/// Run with: cargo test -- --ignored
#[cfg(test)]
mod integration_tests {
    use super::*;
    use wasmer_pipeline_core::Session;

    #[tokio::test]
    #[ignore]
    async fn test_engine_creation() {
        let engine = DockerEngine::new();
        assert!(engine.is_ok(), "Should connect to Docker daemon");
        assert_eq!(engine.unwrap().name(), "docker");
    }

    #[tokio::test]
    #[ignore]
    async fn test_platform() {
        let engine = DockerEngine::new().unwrap();
        let platform = engine.platform().await.unwrap();
        assert_eq!(platform.os, "linux");
        assert!(!platform.arch.is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn test_stdout_is_last_command_output() {
        let engine = DockerEngine::new().unwrap();
        let ctr = Container::new("test")
            .from("alpine:latest")
            .with_exec(["echo", "first"])
            .with_exec(["echo", "second"]);

        let stdout = engine.stdout(&ctr).await.unwrap();
        assert_eq!(stdout.trim(), "second");
    }

    #[tokio::test]
    #[ignore]
    async fn test_failing_command_stops_plan() {
        let engine = DockerEngine::new().unwrap();
        let ctr = Container::new("test")
            .from("alpine:latest")
            .with_exec(["sh", "-c", "exit 42"])
            .with_exec(["echo", "unreachable"]);

        let err = engine.stdout(&ctr).await.unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed(msg) if msg.contains("42")));
    }

    #[tokio::test]
    #[ignore]
    async fn test_failed_export_leaves_no_directory() {
        let engine = DockerEngine::new().unwrap();
        let work = tempfile::tempdir().unwrap();
        let dest = work.path().join("build-out");
        let ctr = Container::new("test")
            .from("alpine:latest")
            .with_exec(["sh", "-c", "exit 1"]);

        let result = engine.export_directory(&ctr, "/tmp", &dest).await;
        assert!(result.is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    #[ignore]
    async fn test_environment_and_secrets() {
        let engine = DockerEngine::new().unwrap();
        let session = Session::new();
        let secret = session.set_secret("TOKEN", "hello_world");
        let ctr = Container::new("test")
            .from("alpine:latest")
            .with_env_variable("GREETING", "hi")
            .with_expanded_env_variable("PATH", "/opt/bin:$PATH")
            .with_secret_variable("TOKEN", &secret)
            .with_exec(["sh", "-c", "echo $GREETING $TOKEN $PATH"]);

        let stdout = engine.stdout(&ctr).await.unwrap();
        assert!(stdout.contains("hi hello_world /opt/bin:"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_directory_copy_and_export() {
        let engine = DockerEngine::new().unwrap();
        let session = Session::new();

        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("keep.txt"), "keep").unwrap();
        std::fs::create_dir(src.path().join("target")).unwrap();
        std::fs::write(src.path().join("target").join("skip.txt"), "skip").unwrap();
        let dir = session.host_directory(src.path());

        let out = tempfile::tempdir().unwrap();
        let ctr = Container::new("test")
            .from("alpine:latest")
            .with_directory("/app", &dir, &["target"])
            .with_workdir("/app")
            .with_exec(["ls"]);

        let stdout = engine
            .export_directory(&ctr, "/app", out.path())
            .await
            .unwrap();
        assert!(stdout.contains("keep.txt"));
        assert!(!stdout.contains("target"));
        assert!(out.path().join("keep.txt").exists());
        assert!(!out.path().join("target").exists());
    }
}
