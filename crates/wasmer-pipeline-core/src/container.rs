//! Container plans.
//!
//! A [`Container`] is an ordered list of steps applied on top of a base
//! image. Building one has no side effects; a [`crate::ContainerEngine`]
//! realizes it, running steps one at a time and stopping at the first
//! failing command.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::directory::Directory;
use crate::secret::Secret;

/// A named cache volume mounted at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMount {
    pub path: String,
    pub volume: String,
}

/// A host directory copied into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCopy {
    /// Destination path inside the container.
    pub path: String,
    /// Host directory to copy from.
    pub source: PathBuf,
    /// Top-level entries of the source that are not copied.
    pub exclude: Vec<String>,
}

/// An environment variable set for subsequent commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVariable {
    pub name: String,
    pub value: String,
    /// Expand `$VAR` and `${VAR}` references against the environment
    /// accumulated so far.
    pub expand: bool,
}

// Matches $VAR and ${VAR}
static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap()
});

impl EnvVariable {
    /// Value to set, given the environment accumulated before this step.
    ///
    /// Unknown references expand to the empty string, as a shell would.
    pub fn resolve(&self, env: &HashMap<String, String>) -> String {
        if !self.expand {
            return self.value.clone();
        }
        ENV_REF
            .replace_all(&self.value, |caps: &regex::Captures| {
                let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                env.get(name).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

/// One step of a container plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Exec(Vec<String>),
    MountCache(CacheMount),
    Directory(DirectoryCopy),
    Env(EnvVariable),
    SecretEnv { name: String, secret: Secret },
    Workdir(String),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Exec(args) => write!(f, "exec {}", args.join(" ")),
            Step::MountCache(mount) => write!(f, "mount cache {} at {}", mount.volume, mount.path),
            Step::Directory(copy) => write!(
                f,
                "copy {} to {} (exclude {:?})",
                copy.source.display(),
                copy.path,
                copy.exclude
            ),
            Step::Env(env) => write!(f, "env {}={}", env.name, env.value),
            Step::SecretEnv { name, .. } => write!(f, "secret env {}=***", name),
            Step::Workdir(path) => write!(f, "workdir {}", path),
        }
    }
}

/// A container plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pipeline: String,
    image: String,
    steps: Vec<Step>,
}

impl Container {
    /// Start an empty plan for the named pipeline (usually the job name).
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            image: String::new(),
            steps: Vec::new(),
        }
    }

    /// Base image.
    pub fn from(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_exec<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps
            .push(Step::Exec(args.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_mounted_cache(mut self, path: impl Into<String>, volume: impl Into<String>) -> Self {
        self.steps.push(Step::MountCache(CacheMount {
            path: path.into(),
            volume: volume.into(),
        }));
        self
    }

    pub fn with_directory<S: AsRef<str>>(
        mut self,
        path: impl Into<String>,
        source: &Directory,
        exclude: &[S],
    ) -> Self {
        self.steps.push(Step::Directory(DirectoryCopy {
            path: path.into(),
            source: source.path().to_path_buf(),
            exclude: exclude.iter().map(|e| e.as_ref().to_string()).collect(),
        }));
        self
    }

    pub fn with_env_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.steps.push(Step::Env(EnvVariable {
            name: name.into(),
            value: value.into(),
            expand: false,
        }));
        self
    }

    /// Like [`Container::with_env_variable`], expanding variable references
    /// in `value`.
    pub fn with_expanded_env_variable(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.steps.push(Step::Env(EnvVariable {
            name: name.into(),
            value: value.into(),
            expand: true,
        }));
        self
    }

    /// Set an environment variable from a secret. The value is never logged.
    pub fn with_secret_variable(mut self, name: impl Into<String>, secret: &Secret) -> Self {
        self.steps.push(Step::SecretEnv {
            name: name.into(),
            secret: secret.clone(),
        });
        self
    }

    pub fn with_workdir(mut self, path: impl Into<String>) -> Self {
        self.steps.push(Step::Workdir(path.into()));
        self
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Cache volumes the plan mounts, in declaration order.
    pub fn cache_mounts(&self) -> impl Iterator<Item = &CacheMount> {
        self.steps.iter().filter_map(|step| match step {
            Step::MountCache(mount) => Some(mount),
            _ => None,
        })
    }

    /// Host directories the plan copies in, in declaration order.
    pub fn directory_copies(&self) -> impl Iterator<Item = &DirectoryCopy> {
        self.steps.iter().filter_map(|step| match step {
            Step::Directory(copy) => Some(copy),
            _ => None,
        })
    }

    /// Commands the plan runs, in order.
    pub fn execs(&self) -> impl Iterator<Item = &[String]> {
        self.steps.iter().filter_map(|step| match step {
            Step::Exec(args) => Some(args.as_slice()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;

    #[test]
    fn test_builder_records_steps_in_order() {
        let session = Session::new();
        let src = session.host_directory("/src");
        let ctr = Container::new("build")
            .from("alpine")
            .with_exec(["apk", "add", "curl"])
            .with_mounted_cache("/app/target", "target-cache")
            .with_directory("/app", &src, &["target"])
            .with_workdir("/app");

        assert_eq!(ctr.pipeline(), "build");
        assert_eq!(ctr.image(), "alpine");
        assert_eq!(ctr.steps().len(), 4);
        assert!(matches!(ctr.steps()[0], Step::Exec(_)));
        assert_eq!(ctr.cache_mounts().count(), 1);

        let copy = ctr.directory_copies().next().unwrap();
        assert_eq!(copy.source, PathBuf::from("/src"));
        assert_eq!(copy.exclude, vec!["target"]);
    }

    #[test]
    fn test_env_expansion() {
        let env = HashMap::from([("PATH".to_string(), "/usr/bin:/bin".to_string())]);
        let expanded = EnvVariable {
            name: "PATH".to_string(),
            value: "/root/.wasmer/bin:$PATH".to_string(),
            expand: true,
        };
        assert_eq!(expanded.resolve(&env), "/root/.wasmer/bin:/usr/bin:/bin");

        let braced = EnvVariable {
            name: "X".to_string(),
            value: "${PATH}:${MISSING}".to_string(),
            expand: true,
        };
        assert_eq!(braced.resolve(&env), "/usr/bin:/bin:");

        let literal = EnvVariable {
            name: "X".to_string(),
            value: "$PATH".to_string(),
            expand: false,
        };
        assert_eq!(literal.resolve(&env), "$PATH");
    }

    #[test]
    fn test_secret_step_display_is_redacted() {
        let session = Session::new();
        let secret = session.set_secret("WASMER_TOKEN", "s3cr3t");
        let ctr = Container::new("deploy").with_secret_variable("WASMER_TOKEN", &secret);
        let rendered = ctr.steps()[0].to_string();
        assert!(rendered.contains("WASMER_TOKEN"));
        assert!(!rendered.contains("s3cr3t"));
    }
}
