//! Container backend abstraction.

pub mod docker;
pub mod local;

use std::sync::Arc;

use cxfer_common::config::{BackendKind, HarnessConfig};
use cxfer_common::error::Result;
use cxfer_common::types::{ContainerId, ContainerState, MountSpec};

/// Configuration for creating a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Unique container name.
    pub name: String,
    /// Image identifier.
    pub image: String,
    /// Bind mounts, fixed for the container's lifetime.
    pub mounts: Vec<MountSpec>,
}

/// Information about an existing container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Backend-assigned identifier.
    pub id: ContainerId,
    /// Unique container name.
    pub name: String,
    /// Current lifecycle state.
    pub state: ContainerState,
    /// Bind mounts the container was created with.
    pub mounts: Vec<MountSpec>,
}

/// A container engine able to provision containers and move files in and
/// out of them.
///
/// File transfer failures caused by the container's filesystem are returned
/// as [`cxfer_common::error::CxferError::Transfer`]; any other variant means
/// the backend itself failed.
pub trait ContainerBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Looks up a container by its unique name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    fn find(&self, name: &str) -> Result<Option<ContainerInfo>>;

    /// Creates a container from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be created.
    fn create(&self, config: &ContainerConfig) -> Result<ContainerId>;

    /// Starts a created or stopped container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    fn start(&self, id: &ContainerId) -> Result<()>;

    /// Resumes a paused container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is not paused or cannot be resumed.
    fn unpause(&self, id: &ContainerId) -> Result<()>;

    /// Removes a container and everything it owns, running or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Creates or overwrites `path` inside the container with `payload`.
    ///
    /// # Errors
    ///
    /// Returns a classified transfer error if the container's filesystem
    /// rejects the write, or a backend error otherwise.
    fn write_file(&self, id: &ContainerId, path: &str, payload: &[u8]) -> Result<()>;

    /// Reads the full content of `path` inside the container.
    ///
    /// # Errors
    ///
    /// Returns a classified transfer error if the file cannot be read, or a
    /// backend error otherwise.
    fn read_file(&self, id: &ContainerId, path: &str) -> Result<Vec<u8>>;

    /// Returns whether this backend is operational on the current host.
    fn is_available(&self) -> bool;
}

/// Creates the backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the Docker backend is selected but no `docker`
/// binary can be found.
pub fn backend_for(config: &HarnessConfig) -> Result<Arc<dyn ContainerBackend>> {
    Ok(match config.backend {
        BackendKind::Docker => Arc::new(docker::DockerBackend::locate()?),
        BackendKind::Local => Arc::new(local::LocalBackend::new(config.data_dir.clone())),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use cxfer_common::config::FailurePolicy;

    use super::*;

    #[test]
    fn local_backend_is_selected_from_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HarnessConfig {
            cluster_name: "t".into(),
            nfs_dir: PathBuf::from("/unused"),
            image: "img".into(),
            backend: BackendKind::Local,
            data_dir: dir.path().to_path_buf(),
            failure_policy: FailurePolicy::FailFast,
        };
        let backend = backend_for(&config).expect("backend");
        assert_eq!(backend.name(), "local");
        assert!(backend.is_available());
    }
}
