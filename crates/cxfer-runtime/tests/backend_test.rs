//! Integration tests for the container backends.
//!
//! The local backend runs everywhere. The Docker tests need a reachable
//! daemon and are ignored by default; run them with `--ignored`.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::path::Path;
use std::sync::Arc;

use cxfer_common::error::TransferErrorKind;
use cxfer_common::types::{ContainerState, MountMode, MountSpec};
use cxfer_runtime::backend::docker::DockerBackend;
use cxfer_runtime::backend::local::LocalBackend;
use cxfer_runtime::backend::ContainerBackend;
use cxfer_runtime::cluster::{Cluster, ClusterGuard, ClusterSpec};

fn spec(name: &str, nfs: &Path, image: &str) -> ClusterSpec {
    std::fs::create_dir_all(nfs).expect("nfs dir");
    ClusterSpec {
        name: name.into(),
        node_count: 1,
        mounts: vec![MountSpec::new(nfs, "/nfsdir", MountMode::ReadWrite)],
        image: image.into(),
    }
}

/// Exercises the transfer contract shared by every backend.
fn check_transfer_contract(backend: Arc<dyn ContainerBackend>, spec: &ClusterSpec) {
    let guard = ClusterGuard::new(Cluster::acquire(Arc::clone(&backend), spec).expect("acquire"));
    let c = &guard.containers()[0];

    for size in [0_usize, 1, 11, 4096, 1024 * 1024] {
        let payload = vec![b'0'; size];
        for path in ["/tmp/sized", "/nfsdir/sized"] {
            c.write_file(path, &payload).expect("write");
            assert_eq!(c.read_file(path).expect("read"), payload, "{path} at {size} bytes");
        }
        let host = c.host_path_for("/nfsdir/sized").expect("host path");
        assert_eq!(std::fs::read(host).expect("host copy"), payload);
    }

    let err = c.write_file("/path/not/exist", b"bla").expect_err("missing parent");
    let transfer = err.as_transfer().expect("classified");
    assert_eq!(transfer.kind, TransferErrorKind::ParentNotFound);
    assert!(transfer.message_ends_with("No such file or directory"), "{transfer}");

    c.write_file("/tmp/file0", b"Short Write").expect("write");
    let err = c.write_file("/tmp/file0/bla", b"bla").expect_err("file parent");
    let transfer = err.as_transfer().expect("classified");
    assert_eq!(transfer.kind, TransferErrorKind::ParentNotADirectory);
    assert!(transfer.message_ends_with("Not a directory"), "{transfer}");

    let err = c.read_file("/tmp/never-written").expect_err("absent");
    assert_eq!(err.as_transfer().expect("classified").kind, TransferErrorKind::NotFound);

    let name = c.name().to_string();
    guard.release().expect("release");
    assert!(backend.find(&name).expect("find").is_none());
}

// ── Local backend ────────────────────────────────────────────────────

#[test]
fn local_backend_meets_transfer_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend: Arc<dyn ContainerBackend> = Arc::new(LocalBackend::new(dir.path().join("data")));
    check_transfer_contract(backend, &spec("local-contract", &dir.path().join("nfs"), "img"));
}

#[test]
fn local_state_survives_a_new_backend_instance() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("data");
    let s = spec("persist", &dir.path().join("nfs"), "img");

    let first = Cluster::acquire(Arc::new(LocalBackend::new(data.clone())), &s).expect("first");
    let id = first.containers()[0].id().clone();

    let backend = LocalBackend::new(data);
    let info = backend.find("persist-1").expect("find").expect("present");
    assert_eq!(info.id, id);
    assert_eq!(info.state, ContainerState::Running);
    assert_eq!(info.mounts, s.mounts);
}

#[test]
fn local_container_roots_are_isolated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend: Arc<dyn ContainerBackend> = Arc::new(LocalBackend::new(dir.path().join("data")));
    let mut s = spec("iso", &dir.path().join("nfs"), "img");
    s.node_count = 2;
    let cluster = Cluster::acquire(backend, &s).expect("acquire");
    let [a, b] = cluster.containers() else {
        panic!("expected two containers");
    };

    a.write_file("/tmp/only-a", b"a").expect("write");
    let err = b.read_file("/tmp/only-a").expect_err("isolated");
    assert_eq!(err.as_transfer().expect("classified").kind, TransferErrorKind::NotFound);

    a.write_file("/nfsdir/shared", b"both").expect("write");
    assert_eq!(b.read_file("/nfsdir/shared").expect("read"), b"both");
    cluster.release().expect("release");
}

// ── Docker backend ───────────────────────────────────────────────────

#[test]
#[ignore = "requires a docker daemon"]
fn docker_backend_meets_transfer_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = DockerBackend::locate().expect("docker on PATH");
    assert!(backend.is_available(), "docker daemon not reachable");
    let name = format!("cxfer-it-{}", std::process::id());
    check_transfer_contract(
        Arc::new(backend),
        &spec(&name, &dir.path().join("nfs"), "debian:stable-slim"),
    );
}
