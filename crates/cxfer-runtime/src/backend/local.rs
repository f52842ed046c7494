//! Directory-rooted container backend.
//!
//! Each container is a private root directory under the data directory.
//! Container paths resolve into that root, except paths beneath a mount
//! point, which resolve into the mount's host directory. File transfer uses
//! the host filesystem directly, so OS errors surface with their own errno.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use cxfer_common::constants::STATE_FILE_NAME;
use cxfer_common::error::{CxferError, Result, TransferError, TransferErrorKind, TransferOp};
use cxfer_common::types::{ContainerId, ContainerState, MountMode};
use nix::errno::Errno;

use super::{ContainerBackend, ContainerConfig, ContainerInfo};
use crate::state::{self, StateEntry, StateFile};

/// Directories every container root starts with.
const BASE_DIRS: &[&str] = &["tmp", "root", "etc", "var/tmp"];

/// Backend that emulates containers with plain directories.
pub struct LocalBackend {
    data_dir: PathBuf,
}

impl LocalBackend {
    /// Creates a backend keeping its state under `data_dir`.
    #[must_use]
    pub const fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE_NAME)
    }

    fn load(&self) -> Result<StateFile> {
        state::load_state(&self.state_path())
    }

    fn save(&self, state: &StateFile) -> Result<()> {
        state::save_state(&self.state_path(), state)
    }

    fn entry(&self, id: &ContainerId) -> Result<StateEntry> {
        self.load()?
            .by_id(id)
            .cloned()
            .ok_or_else(|| CxferError::NotFound {
                kind: "container",
                id: id.to_string(),
            })
    }

    fn running_entry(&self, id: &ContainerId) -> Result<StateEntry> {
        let entry = self.entry(id)?;
        if entry.state != ContainerState::Running {
            return Err(CxferError::InvalidState {
                resource: "container",
                id: id.to_string(),
                message: format!("is {}, not running", entry.state),
            });
        }
        Ok(entry)
    }

    /// Resolves a container path to its host location and access mode.
    ///
    /// A trailing `/` is carried over to the host path so the host
    /// filesystem applies its directory checks to the last component.
    fn resolve(entry: &StateEntry, op: TransferOp, path: &str) -> Result<(PathBuf, MountMode)> {
        let container_path = normalize(op, path)?;
        let mount = entry
            .mounts
            .iter()
            .filter(|m| m.covers(&container_path))
            .max_by_key(|m| m.container_path.components().count());
        let (mut host, mode) = match mount.and_then(|m| m.host_path_for(&container_path).map(|h| (h, m.mode))) {
            Some(resolved) => resolved,
            None => {
                let relative = container_path
                    .strip_prefix("/")
                    .unwrap_or(container_path.as_path());
                (entry.rootfs_path.join(relative), MountMode::ReadWrite)
            }
        };
        if path.len() > 1 && path.ends_with('/') {
            host.as_mut_os_string().push("/");
        }
        Ok((host, mode))
    }
}

impl ContainerBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn find(&self, name: &str) -> Result<Option<ContainerInfo>> {
        Ok(self.load()?.by_name(name).map(|e| ContainerInfo {
            id: e.id.clone(),
            name: e.name.clone(),
            state: e.state,
            mounts: e.mounts.clone(),
        }))
    }

    fn create(&self, config: &ContainerConfig) -> Result<ContainerId> {
        let mut state = self.load()?;
        if state.by_name(&config.name).is_some() {
            return Err(CxferError::InvalidState {
                resource: "container name",
                id: config.name.clone(),
                message: "already in use".into(),
            });
        }
        for mount in &config.mounts {
            if !mount.host_dir.is_dir() {
                return Err(CxferError::Config {
                    message: format!(
                        "mount source {} is not a directory",
                        mount.host_dir.display()
                    ),
                });
            }
        }

        let id = ContainerId::generate();
        let rootfs = self.data_dir.join("containers").join(id.as_str()).join("rootfs");
        let mount_points = config
            .mounts
            .iter()
            .filter_map(|m| m.container_path.strip_prefix("/").ok());
        for dir in BASE_DIRS.iter().map(Path::new).chain(mount_points) {
            let target = rootfs.join(dir);
            std::fs::create_dir_all(&target).map_err(|e| CxferError::Io {
                path: target.clone(),
                source: e,
            })?;
        }

        tracing::info!(id = %id, name = %config.name, rootfs = %rootfs.display(), "creating container (local)");
        state.containers.push(StateEntry {
            id: id.clone(),
            name: config.name.clone(),
            state: ContainerState::Created,
            image: config.image.clone(),
            rootfs_path: rootfs,
            mounts: config.mounts.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        self.save(&state)?;
        Ok(id)
    }

    fn start(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.load()?;
        let entry = state.by_id_mut(id).ok_or_else(|| CxferError::NotFound {
            kind: "container",
            id: id.to_string(),
        })?;
        entry.state = ContainerState::Running;
        tracing::info!(id = %id, "starting container (local)");
        self.save(&state)
    }

    fn unpause(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.load()?;
        let entry = state.by_id_mut(id).ok_or_else(|| CxferError::NotFound {
            kind: "container",
            id: id.to_string(),
        })?;
        if entry.state != ContainerState::Paused {
            return Err(CxferError::InvalidState {
                resource: "container",
                id: id.to_string(),
                message: format!("is {}, not paused", entry.state),
            });
        }
        entry.state = ContainerState::Running;
        tracing::info!(id = %id, "unpausing container (local)");
        self.save(&state)
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.load()?;
        let Some(entry) = state.by_id(id).cloned() else {
            return Err(CxferError::NotFound {
                kind: "container",
                id: id.to_string(),
            });
        };
        if let Some(container_dir) = entry.rootfs_path.parent() {
            if container_dir.exists() {
                std::fs::remove_dir_all(container_dir).map_err(|e| CxferError::Io {
                    path: container_dir.to_path_buf(),
                    source: e,
                })?;
            }
        }
        state.containers.retain(|e| e.id != *id);
        tracing::info!(id = %id, name = %entry.name, "removed container (local)");
        self.save(&state)
    }

    fn write_file(&self, id: &ContainerId, path: &str, payload: &[u8]) -> Result<()> {
        let entry = self.running_entry(id)?;
        let (host_path, mode) = Self::resolve(&entry, TransferOp::Write, path)?;
        if mode == MountMode::ReadOnly {
            return Err(TransferError::new(
                TransferOp::Write,
                TransferErrorKind::Other,
                path,
                format!("{path}: {}", Errno::EROFS.desc()),
            )
            .into());
        }
        tracing::debug!(id = %id, path, host = %host_path.display(), bytes = payload.len(), "writing file (local)");

        let classify = |e: std::io::Error| classify_io(TransferOp::Write, path, &e);
        let mut file = std::fs::File::create(&host_path).map_err(classify)?;
        file.write_all(payload).map_err(classify)?;
        file.sync_all().map_err(classify)?;
        Ok(())
    }

    fn read_file(&self, id: &ContainerId, path: &str) -> Result<Vec<u8>> {
        let entry = self.running_entry(id)?;
        let (host_path, _) = Self::resolve(&entry, TransferOp::Read, path)?;
        tracing::debug!(id = %id, path, host = %host_path.display(), "reading file (local)");
        std::fs::read(&host_path).map_err(|e| classify_io(TransferOp::Read, path, &e))
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Normalizes an absolute container path, rejecting `..` components.
fn normalize(op: TransferOp, path: &str) -> Result<PathBuf> {
    let invalid = |why: &str| -> CxferError {
        TransferError::new(op, TransferErrorKind::Other, path, format!("{path}: {why}")).into()
    };
    if !path.starts_with('/') {
        return Err(invalid("path must be absolute"));
    }
    let mut out = PathBuf::from("/");
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(invalid("path must not contain `..`"));
            }
        }
    }
    Ok(out)
}

/// Classifies a host I/O error by errno and renders `<path>: <strerror>`.
fn classify_io(op: TransferOp, path: &str, err: &std::io::Error) -> CxferError {
    let errno = err.raw_os_error().map(Errno::from_raw);
    let kind = match (op, errno) {
        (TransferOp::Write, Some(Errno::ENOENT)) => TransferErrorKind::ParentNotFound,
        (TransferOp::Read, Some(Errno::ENOENT)) => TransferErrorKind::NotFound,
        (_, Some(Errno::ENOTDIR)) => TransferErrorKind::ParentNotADirectory,
        _ => TransferErrorKind::Other,
    };
    let text = errno.map_or_else(|| err.to_string(), |e| e.desc().to_string());
    TransferError::new(op, kind, path, format!("{path}: {text}")).into()
}

#[cfg(test)]
mod tests {
    use cxfer_common::error::{NO_SUCH_FILE, NOT_A_DIRECTORY, READ_ONLY_FS};
    use cxfer_common::types::MountSpec;

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        backend: LocalBackend,
        nfs: PathBuf,
        id: ContainerId,
    }

    fn fixture(mode: MountMode) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let nfs = dir.path().join("nfs");
        std::fs::create_dir_all(&nfs).expect("nfs dir");
        let backend = LocalBackend::new(dir.path().join("data"));
        let id = backend
            .create(&ContainerConfig {
                name: "t-1".into(),
                image: "img".into(),
                mounts: vec![MountSpec::new(&nfs, "/nfsdir", mode)],
            })
            .expect("create");
        backend.start(&id).expect("start");
        Fixture {
            _dir: dir,
            backend,
            nfs,
            id,
        }
    }

    fn transfer_kind(err: &CxferError) -> TransferErrorKind {
        err.as_transfer().expect("transfer error").kind
    }

    #[test]
    fn round_trip_in_container_root() {
        let f = fixture(MountMode::ReadWrite);
        f.backend.write_file(&f.id, "/tmp/file0", b"Short Write").expect("write");
        let data = f.backend.read_file(&f.id, "/tmp/file0").expect("read");
        assert_eq!(data, b"Short Write");
        assert!(!f.nfs.join("file0").exists());
    }

    #[test]
    fn write_under_mount_is_visible_on_host() {
        let f = fixture(MountMode::ReadWrite);
        let payload = vec![b'0'; 4096];
        f.backend.write_file(&f.id, "/nfsdir/file1", &payload).expect("write");
        assert_eq!(std::fs::read(f.nfs.join("file1")).expect("host read"), payload);
    }

    #[test]
    fn overwrite_truncates_previous_content() {
        let f = fixture(MountMode::ReadWrite);
        f.backend.write_file(&f.id, "/tmp/f", &[b'x'; 100]).expect("write long");
        f.backend.write_file(&f.id, "/tmp/f", b"ab").expect("write short");
        assert_eq!(f.backend.read_file(&f.id, "/tmp/f").expect("read"), b"ab");
    }

    #[test]
    fn missing_parent_is_parent_not_found() {
        let f = fixture(MountMode::ReadWrite);
        let err = f
            .backend
            .write_file(&f.id, "/path/not/exist", b"bla")
            .expect_err("should fail");
        assert_eq!(transfer_kind(&err), TransferErrorKind::ParentNotFound);
        assert!(err.to_string().ends_with(NO_SUCH_FILE));
    }

    #[test]
    fn file_parent_is_not_a_directory() {
        let f = fixture(MountMode::ReadWrite);
        f.backend.write_file(&f.id, "/tmp/file0", b"Short Write").expect("write");
        let err = f
            .backend
            .write_file(&f.id, "/tmp/file0/bla", b"bla")
            .expect_err("should fail");
        assert_eq!(transfer_kind(&err), TransferErrorKind::ParentNotADirectory);
        assert!(err.to_string().ends_with(NOT_A_DIRECTORY));
    }

    #[test]
    fn reading_missing_file_is_not_found() {
        let f = fixture(MountMode::ReadWrite);
        let err = f.backend.read_file(&f.id, "/tmp/absent").expect_err("should fail");
        assert_eq!(transfer_kind(&err), TransferErrorKind::NotFound);
        assert!(err.to_string().ends_with(NO_SUCH_FILE));
    }

    #[test]
    fn read_only_mount_rejects_writes() {
        let f = fixture(MountMode::ReadOnly);
        let err = f
            .backend
            .write_file(&f.id, "/nfsdir/file0", b"x")
            .expect_err("should fail");
        assert_eq!(transfer_kind(&err), TransferErrorKind::Other);
        assert!(err.to_string().ends_with(READ_ONLY_FS));
    }

    #[test]
    fn parent_components_cannot_escape_root() {
        let f = fixture(MountMode::ReadWrite);
        let err = f
            .backend
            .write_file(&f.id, "/tmp/../../escape", b"x")
            .expect_err("should fail");
        assert_eq!(transfer_kind(&err), TransferErrorKind::Other);
    }

    #[test]
    fn relative_paths_are_rejected() {
        let f = fixture(MountMode::ReadWrite);
        let err = f.backend.write_file(&f.id, "tmp/file", b"x").expect_err("should fail");
        assert_eq!(transfer_kind(&err), TransferErrorKind::Other);
    }

    #[test]
    fn stopped_container_refuses_transfer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalBackend::new(dir.path().to_path_buf());
        let id = backend
            .create(&ContainerConfig {
                name: "idle-1".into(),
                image: "img".into(),
                mounts: vec![],
            })
            .expect("create");
        let err = backend.write_file(&id, "/tmp/x", b"x").expect_err("not running");
        assert!(matches!(err, CxferError::InvalidState { resource: "container", .. }));
        assert!(err.to_string().ends_with("is created, not running"));
    }

    #[test]
    fn find_returns_created_container() {
        let f = fixture(MountMode::ReadWrite);
        let info = f.backend.find("t-1").expect("find").expect("present");
        assert_eq!(info.id, f.id);
        assert_eq!(info.state, ContainerState::Running);
        assert_eq!(info.mounts.len(), 1);
        assert!(f.backend.find("t-2").expect("find").is_none());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let f = fixture(MountMode::ReadWrite);
        let result = f.backend.create(&ContainerConfig {
            name: "t-1".into(),
            image: "img".into(),
            mounts: vec![],
        });
        assert!(matches!(
            result,
            Err(CxferError::InvalidState { resource: "container name", ref id, .. }) if id == "t-1"
        ));
    }

    #[test]
    fn missing_mount_source_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = LocalBackend::new(dir.path().to_path_buf());
        let result = backend.create(&ContainerConfig {
            name: "m-1".into(),
            image: "img".into(),
            mounts: vec![MountSpec::new(
                dir.path().join("absent"),
                "/nfsdir",
                MountMode::ReadWrite,
            )],
        });
        assert!(matches!(result, Err(CxferError::Config { .. })));
    }

    #[test]
    fn remove_deletes_root_and_state() {
        let f = fixture(MountMode::ReadWrite);
        let rootfs = f.backend.entry(&f.id).expect("entry").rootfs_path;
        assert!(rootfs.exists());
        f.backend.remove(&f.id).expect("remove");
        assert!(!rootfs.exists());
        assert!(f.backend.find("t-1").expect("find").is_none());
        assert!(f.nfs.exists(), "host side of the mount survives removal");
    }

    #[test]
    fn trailing_slash_on_a_file_is_not_a_directory() {
        let f = fixture(MountMode::ReadWrite);
        f.backend.write_file(&f.id, "/tmp/file0", b"Short Write").expect("write");
        let err = f.backend.read_file(&f.id, "/tmp/file0/").expect_err("file is not a dir");
        assert_eq!(transfer_kind(&err), TransferErrorKind::ParentNotADirectory);
        assert!(err.to_string().ends_with(NOT_A_DIRECTORY));

        f.backend.write_file(&f.id, "/nfsdir/file0", b"x").expect("write");
        let err = f.backend.read_file(&f.id, "/nfsdir/file0/").expect_err("file is not a dir");
        assert_eq!(transfer_kind(&err), TransferErrorKind::ParentNotADirectory);
    }

    #[test]
    fn trailing_slash_does_not_create_a_regular_file() {
        let f = fixture(MountMode::ReadWrite);
        let err = f.backend.write_file(&f.id, "/tmp/newfile/", b"x").expect_err("trailing slash");
        assert_eq!(transfer_kind(&err), TransferErrorKind::Other);
        assert!(err.to_string().ends_with(Errno::EISDIR.desc()));
        let err = f.backend.read_file(&f.id, "/tmp/newfile").expect_err("nothing created");
        assert_eq!(transfer_kind(&err), TransferErrorKind::NotFound);
    }

    #[test]
    fn unpause_requires_a_paused_container() {
        let f = fixture(MountMode::ReadWrite);
        let err = f.backend.unpause(&f.id).expect_err("running");
        assert!(matches!(err, CxferError::InvalidState { .. }));

        let path = f.backend.state_path();
        let mut state = state::load_state(&path).expect("load");
        state.by_id_mut(&f.id).expect("entry").state = ContainerState::Paused;
        state::save_state(&path, &state).expect("save");

        f.backend.unpause(&f.id).expect("unpause");
        let info = f.backend.find("t-1").expect("find").expect("present");
        assert_eq!(info.state, ContainerState::Running);
    }
}
