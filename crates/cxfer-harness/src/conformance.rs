//! End-to-end conformance run: provision, execute, tear down.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use cxfer_common::config::HarnessConfig;
use cxfer_common::constants::{NFS_MOUNT_POINT, NODE_COUNT};
use cxfer_common::error::{CxferError, Result};
use cxfer_runtime::backend::ContainerBackend;
use cxfer_runtime::cluster::{Cluster, ClusterGuard, ClusterSpec};

use crate::case::standard_cases;
use crate::report::Report;
use crate::runner::{self, Event};

/// Describes the cluster a run acquires.
#[must_use]
pub fn cluster_spec(config: &HarnessConfig) -> ClusterSpec {
    ClusterSpec {
        name: config.cluster_name.clone(),
        node_count: NODE_COUNT,
        mounts: vec![config.nfs_mount()],
        image: config.image.clone(),
    }
}

/// Runs the standard conformance cases against a freshly acquired cluster.
///
/// The shared directory is created if absent. The cluster is released
/// after the cases, whether they passed, failed, or aborted with an error;
/// a failed release is recorded in the report rather than failing the run.
///
/// # Errors
///
/// Returns an error if the shared directory cannot be created, the cluster
/// cannot be acquired, or a backend failure aborts the cases.
pub fn run(
    config: &HarnessConfig,
    backend: Arc<dyn ContainerBackend>,
    interrupted: &AtomicBool,
    on_event: &mut dyn FnMut(&Event<'_>),
) -> Result<Report> {
    std::fs::create_dir_all(&config.nfs_dir).map_err(|e| CxferError::Io {
        path: config.nfs_dir.clone(),
        source: e,
    })?;

    let spec = cluster_spec(config);
    on_event(&Event::Provisioning {
        cluster: &spec.name,
    });
    let guard = ClusterGuard::new(Cluster::acquire(backend, &spec)?);
    let container = guard
        .containers()
        .first()
        .cloned()
        .ok_or_else(|| CxferError::NotFound {
            kind: "container in cluster",
            id: spec.name.clone(),
        })?;
    on_event(&Event::Provisioned {
        container: container.name(),
    });

    let cases = standard_cases(NFS_MOUNT_POINT);
    let outcome = runner::run_cases(
        &container,
        &cases,
        config.failure_policy,
        interrupted,
        on_event,
    );

    on_event(&Event::TearingDown {
        cluster: &spec.name,
    });
    let teardown = guard.release();

    let mut report = outcome?;
    if let Err(e) = teardown {
        tracing::error!(cluster = %spec.name, error = %e, "cluster teardown failed");
        report.teardown_error = Some(e.to_string());
    }
    tracing::info!(cluster = %spec.name, summary = %report, "conformance run finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use cxfer_common::config::{BackendKind, FailurePolicy};

    use super::*;

    #[test]
    fn cluster_spec_shares_nfs_dir() {
        let config = HarnessConfig {
            cluster_name: "alice-test-write-file".into(),
            nfs_dir: PathBuf::from("/work/nfs-dir"),
            image: "debian:stable-slim".into(),
            backend: BackendKind::Docker,
            data_dir: PathBuf::from("/unused"),
            failure_policy: FailurePolicy::FailFast,
        };
        let spec = cluster_spec(&config);
        assert_eq!(spec.node_count, 1);
        assert_eq!(spec.container_name(1), "alice-test-write-file-1");
        assert_eq!(spec.mounts.len(), 1);
        assert_eq!(spec.mounts[0].to_string(), "/work/nfs-dir:/nfsdir:rw");
    }
}
