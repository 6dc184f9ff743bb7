//! Engine double recording the plans it is asked to run.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use wasmer_pipeline_core::{Container, ContainerEngine, Error, Platform, Result};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub container: Container,
    pub export: Option<String>,
    pub dest: Option<PathBuf>,
}

pub struct RecordingEngine {
    platform: Platform,
    fail_pipeline: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingEngine {
    pub const STDOUT: &'static str = "App deployed";

    pub fn new() -> Self {
        Self::with_platform(Platform::new("linux", "amd64"))
    }

    pub fn with_platform(platform: Platform) -> Self {
        Self {
            platform,
            fail_pipeline: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Engine failing every plan of the named pipeline.
    pub fn failing(pipeline: &str) -> Self {
        Self {
            fail_pipeline: Some(pipeline.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Pipeline names of the recorded plans, in call order.
    pub fn pipelines(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.container.pipeline().to_string())
            .collect()
    }

    fn record(&self, container: &Container, export: Option<&str>, dest: Option<&Path>) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            container: container.clone(),
            export: export.map(str::to_string),
            dest: dest.map(Path::to_path_buf),
        });
        if self.fail_pipeline.as_deref() == Some(container.pipeline()) {
            return Err(Error::ExecutionFailed(format!(
                "`{}` exited with code 101",
                container.execs().last().map(|a| a.join(" ")).unwrap_or_default()
            )));
        }
        Ok(Self::STDOUT.to_string())
    }
}

#[async_trait]
impl ContainerEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn platform(&self) -> Result<Platform> {
        Ok(self.platform.clone())
    }

    async fn stdout(&self, container: &Container) -> Result<String> {
        self.record(container, None, None)
    }

    async fn export_directory(
        &self,
        container: &Container,
        path: &str,
        dest: &Path,
    ) -> Result<String> {
        self.record(container, Some(path), Some(dest))
    }
}
