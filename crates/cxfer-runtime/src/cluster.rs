//! Get-or-create cluster acquisition and scoped teardown.
//!
//! A cluster is a named set of containers `<name>-1 .. <name>-N` sharing
//! the same image and mounts. Acquiring a name that already exists reuses
//! its containers instead of creating duplicates.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use cxfer_common::error::Result;
use cxfer_common::types::{ContainerId, ContainerState, MountSpec};

use crate::backend::{ContainerBackend, ContainerConfig};
use crate::container::Container;

/// What to acquire.
#[derive(Debug, Clone)]
pub struct ClusterSpec {
    /// Stable cluster name.
    pub name: String,
    /// Number of containers.
    pub node_count: usize,
    /// Mounts applied to every container.
    pub mounts: Vec<MountSpec>,
    /// Container image.
    pub image: String,
}

impl ClusterSpec {
    /// Name of the container at 1-based `index`.
    #[must_use]
    pub fn container_name(&self, index: usize) -> String {
        format!("{}-{index}", self.name)
    }
}

/// A set of provisioned containers.
pub struct Cluster {
    name: String,
    containers: Vec<Container>,
    backend: Arc<dyn ContainerBackend>,
}

impl Cluster {
    /// Gets the cluster named in `spec`, creating whatever is missing.
    ///
    /// Existing containers are reused as they are: stopped ones are started
    /// again, paused ones are unpaused, and dead ones are replaced. A reused
    /// container keeps the mounts it was created with.
    ///
    /// If any container cannot be provisioned, the containers this call
    /// created are removed before the error is returned; reused ones are
    /// left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot find, create, or start a
    /// container.
    pub fn acquire(backend: Arc<dyn ContainerBackend>, spec: &ClusterSpec) -> Result<Self> {
        tracing::info!(cluster = %spec.name, nodes = spec.node_count, backend = backend.name(), "acquiring cluster");
        let mut containers = Vec::with_capacity(spec.node_count);
        let mut created = Vec::new();
        for index in 1..=spec.node_count {
            match provision(&backend, spec, index, &mut created) {
                Ok(container) => containers.push(container),
                Err(e) => {
                    tracing::error!(cluster = %spec.name, index, error = %e, "cluster acquisition failed");
                    discard(backend.as_ref(), &created);
                    return Err(e);
                }
            }
        }
        Ok(Self {
            name: spec.name.clone(),
            containers,
            backend,
        })
    }

    /// Cluster name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provisioned containers, in index order.
    #[must_use]
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Removes every container of the cluster.
    ///
    /// All containers are attempted even if one fails; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the first removal error.
    pub fn release(self) -> Result<()> {
        tracing::info!(cluster = %self.name, "releasing cluster");
        let mut first_err = None;
        for container in &self.containers {
            if let Err(e) = self.backend.remove(container.id()) {
                tracing::warn!(name = %container.name(), error = %e, "failed to remove container");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Gets or creates the container at `index`, recording newly created ids
/// in `created` as soon as they exist.
fn provision(
    backend: &Arc<dyn ContainerBackend>,
    spec: &ClusterSpec,
    index: usize,
    created: &mut Vec<ContainerId>,
) -> Result<Container> {
    let name = spec.container_name(index);
    if let Some(info) = backend.find(&name)? {
        tracing::info!(name = %name, id = %info.id, state = %info.state, "found existing container");
        match info.state {
            ContainerState::Running => {}
            ContainerState::Paused => backend.unpause(&info.id)?,
            ContainerState::Created | ContainerState::Stopped | ContainerState::Restarting => {
                backend.start(&info.id)?;
            }
            ContainerState::Dead => {
                tracing::warn!(name = %name, id = %info.id, "replacing dead container");
                backend.remove(&info.id)?;
                return create(backend, spec, name, created);
            }
        }
        if info.mounts != spec.mounts {
            tracing::warn!(name = %name, "reused container has different mounts than requested");
        }
        return Ok(Container::new(info.id, name, info.mounts, Arc::clone(backend)));
    }
    create(backend, spec, name, created)
}

fn create(
    backend: &Arc<dyn ContainerBackend>,
    spec: &ClusterSpec,
    name: String,
    created: &mut Vec<ContainerId>,
) -> Result<Container> {
    let id = backend.create(&ContainerConfig {
        name: name.clone(),
        image: spec.image.clone(),
        mounts: spec.mounts.clone(),
    })?;
    created.push(id.clone());
    backend.start(&id)?;
    tracing::info!(name = %name, id = %id, "created container");
    Ok(Container::new(id, name, spec.mounts.clone(), Arc::clone(backend)))
}

/// Removes containers created by a failed acquisition, newest first.
fn discard(backend: &dyn ContainerBackend, created: &[ContainerId]) {
    for id in created.iter().rev() {
        match backend.remove(id) {
            Ok(()) => tracing::info!(id = %id, "removed partially provisioned container"),
            Err(e) => tracing::warn!(id = %id, error = %e, "failed to remove partially provisioned container"),
        }
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("name", &self.name)
            .field("containers", &self.containers)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// Releases the wrapped cluster when dropped.
///
/// Call [`ClusterGuard::release`] to observe teardown errors; on any other
/// exit path, including unwinding, the cluster is released on drop and
/// errors are logged.
#[derive(Debug)]
pub struct ClusterGuard {
    cluster: Option<Cluster>,
}

impl ClusterGuard {
    /// Takes ownership of an acquired cluster.
    #[must_use]
    pub const fn new(cluster: Cluster) -> Self {
        Self {
            cluster: Some(cluster),
        }
    }

    /// Releases the cluster now.
    ///
    /// # Errors
    ///
    /// Returns the first removal error.
    pub fn release(mut self) -> Result<()> {
        self.cluster.take().map_or(Ok(()), Cluster::release)
    }
}

impl Deref for ClusterGuard {
    type Target = Cluster;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Cluster {
        self.cluster
            .as_ref()
            .expect("cluster is present until released")
    }
}

impl Drop for ClusterGuard {
    fn drop(&mut self) {
        if let Some(cluster) = self.cluster.take() {
            if let Err(e) = cluster.release() {
                tracing::error!(error = %e, "cluster teardown failed");
            }
        }
    }
}
