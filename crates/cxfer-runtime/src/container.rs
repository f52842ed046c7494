//! Container handle exposing the file transfer interface.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cxfer_common::error::{Result, TransferError, TransferErrorKind, TransferOp};
use cxfer_common::types::{ContainerId, MountSpec};

use crate::backend::ContainerBackend;

/// A running container provisioned as part of a cluster.
///
/// The handle is cheap to clone; all clones address the same container.
/// Its mounts are fixed when the container is created.
#[derive(Clone)]
pub struct Container {
    id: ContainerId,
    name: String,
    mounts: Vec<MountSpec>,
    backend: Arc<dyn ContainerBackend>,
}

impl Container {
    /// Wraps a container known to `backend`.
    #[must_use]
    pub fn new(
        id: ContainerId,
        name: String,
        mounts: Vec<MountSpec>,
        backend: Arc<dyn ContainerBackend>,
    ) -> Self {
        Self {
            id,
            name,
            mounts,
            backend,
        }
    }

    /// Backend-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> &ContainerId {
        &self.id
    }

    /// Unique container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind mounts of this container.
    #[must_use]
    pub fn mounts(&self) -> &[MountSpec] {
        &self.mounts
    }

    /// Creates or overwrites `path` inside the container with exactly
    /// `payload`.
    ///
    /// When `path` lies beneath a mount, the content is visible on the host
    /// side once this returns.
    ///
    /// # Errors
    ///
    /// Returns a classified transfer error if the path is not absolute, its
    /// parent is missing or not a directory, or the write is otherwise
    /// rejected; returns a backend error if the backend itself fails.
    pub fn write_file(&self, path: &str, payload: &[u8]) -> Result<()> {
        require_absolute(TransferOp::Write, path)?;
        self.backend.write_file(&self.id, path, payload)?;
        tracing::debug!(container = %self.name, path, bytes = payload.len(), "wrote file");
        Ok(())
    }

    /// Returns the exact current content of `path` inside the container.
    ///
    /// # Errors
    ///
    /// Returns a classified transfer error if the file is absent or
    /// unreadable; returns a backend error if the backend itself fails.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        require_absolute(TransferOp::Read, path)?;
        let data = self.backend.read_file(&self.id, path)?;
        tracing::debug!(container = %self.name, path, bytes = data.len(), "read file");
        Ok(data)
    }

    /// Returns the mount that serves `path`, if any.
    #[must_use]
    pub fn mount_for(&self, path: &str) -> Option<&MountSpec> {
        let path = Path::new(path);
        self.mounts
            .iter()
            .filter(|m| m.covers(path))
            .max_by_key(|m| m.container_path.components().count())
    }

    /// Maps a container path beneath a mount to its host-side location.
    #[must_use]
    pub fn host_path_for(&self, path: &str) -> Option<PathBuf> {
        self.mount_for(path)
            .and_then(|m| m.host_path_for(Path::new(path)))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mounts", &self.mounts)
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn require_absolute(op: TransferOp, path: &str) -> Result<()> {
    if path.starts_with('/') {
        return Ok(());
    }
    Err(TransferError::new(
        op,
        TransferErrorKind::Other,
        path,
        format!("{path}: container paths must be absolute"),
    )
    .into())
}
