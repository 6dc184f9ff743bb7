//! Directory handles.

use std::path::{Path, PathBuf};

use crate::id::handle_id;

handle_id!(
    /// Opaque identifier of a directory registered in a [`crate::Session`].
    DirectoryId,
    "dir"
);

/// A directory available to the pipeline: either a host path the caller
/// pointed at, or the exported output of a container step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    id: DirectoryId,
    path: PathBuf,
}

impl Directory {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: DirectoryId::new(),
            path: path.into(),
        }
    }

    pub fn id(&self) -> DirectoryId {
        self.id
    }

    /// Host path backing this directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
