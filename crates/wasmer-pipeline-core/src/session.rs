//! Per-run handle registry.
//!
//! A session lives for one pipeline run. Jobs hand directories and secrets to
//! each other through their identifiers, and the resolver looks identifiers up
//! here before falling back to treating input as a literal value.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::directory::{Directory, DirectoryId};
use crate::secret::{Secret, SecretId};

#[derive(Debug, Default)]
struct Handles {
    directories: HashMap<DirectoryId, Directory>,
    host_paths: HashMap<PathBuf, DirectoryId>,
    secrets: HashMap<SecretId, Secret>,
}

/// Handle registry shared by the jobs of one run.
#[derive(Debug, Default)]
pub struct Session {
    handles: RwLock<Handles>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously registered directory.
    pub fn load_directory(&self, id: &DirectoryId) -> Option<Directory> {
        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        handles.directories.get(id).cloned()
    }

    /// Directory rooted at a host path.
    ///
    /// The same path always yields the same directory within a session.
    pub fn host_directory(&self, path: impl Into<PathBuf>) -> Directory {
        let path = path.into();
        let mut handles = self.handles.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = handles
            .host_paths
            .get(&path)
            .and_then(|id| handles.directories.get(id))
        {
            return existing.clone();
        }

        let directory = Directory::new(path.clone());
        debug!(id = %directory.id(), path = %path.display(), "Registered host directory");
        handles.host_paths.insert(path, directory.id());
        handles
            .directories
            .insert(directory.id(), directory.clone());
        directory
    }

    /// Register a directory produced by a job, such as an exported build output.
    pub fn register_directory(&self, path: impl Into<PathBuf>) -> Directory {
        let directory = Directory::new(path);
        debug!(id = %directory.id(), path = %directory.path().display(), "Registered directory");
        let mut handles = self.handles.write().unwrap_or_else(PoisonError::into_inner);
        handles
            .directories
            .insert(directory.id(), directory.clone());
        directory
    }

    /// Wrap a value as a new named secret.
    pub fn set_secret(&self, name: &str, value: impl Into<String>) -> Secret {
        let secret = Secret::new(name, value);
        debug!(id = %secret.id(), name = %name, "Registered secret");
        let mut handles = self.handles.write().unwrap_or_else(PoisonError::into_inner);
        handles.secrets.insert(secret.id(), secret.clone());
        secret
    }

    /// Look up a previously registered secret.
    pub fn load_secret(&self, id: &SecretId) -> Option<Secret> {
        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        handles.secrets.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_directory_is_interned() {
        let session = Session::new();
        let a = session.host_directory("./project");
        let b = session.host_directory("./project");
        assert_eq!(a, b);
        assert_ne!(a.id(), session.host_directory("./other").id());
    }

    #[test]
    fn test_registered_directory_can_be_loaded() {
        let session = Session::new();
        let dir = session.register_directory("/tmp/out");
        assert_eq!(session.load_directory(&dir.id()), Some(dir));
        assert_eq!(session.load_directory(&DirectoryId::new()), None);
    }

    #[test]
    fn test_secret_lookup() {
        let session = Session::new();
        let secret = session.set_secret("WASMER_TOKEN", "abc");
        let loaded = session.load_secret(&secret.id()).unwrap();
        assert_eq!(loaded.expose(), "abc");
        assert!(session.load_secret(&SecretId::new()).is_none());
    }
}
