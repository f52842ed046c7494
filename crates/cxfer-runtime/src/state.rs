//! Persistent state of the local backend.
//!
//! Maintains a JSON index of the containers the local backend has created,
//! so acquisition by name finds them again across runs.

use std::path::{Path, PathBuf};

use cxfer_common::error::{CxferError, Result};
use cxfer_common::types::{ContainerId, ContainerState, MountSpec};
use serde::{Deserialize, Serialize};

/// Persistent record of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Container identifier.
    pub id: ContainerId,
    /// Unique container name.
    pub name: String,
    /// Current lifecycle state.
    pub state: ContainerState,
    /// Image the container was created from.
    pub image: String,
    /// Host directory serving as the container's root filesystem.
    pub rootfs_path: PathBuf,
    /// Bind mounts fixed at creation.
    pub mounts: Vec<MountSpec>,
    /// ISO-8601 timestamp of creation.
    pub created_at: String,
}

/// Root of the state index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    /// All tracked containers.
    pub containers: Vec<StateEntry>,
}

impl StateFile {
    /// Finds a container by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&StateEntry> {
        self.containers.iter().find(|e| e.name == name)
    }

    /// Finds a container by ID.
    #[must_use]
    pub fn by_id(&self, id: &ContainerId) -> Option<&StateEntry> {
        self.containers.iter().find(|e| e.id == *id)
    }

    /// Finds a container by ID for modification.
    pub fn by_id_mut(&mut self, id: &ContainerId) -> Option<&mut StateEntry> {
        self.containers.iter_mut().find(|e| e.id == *id)
    }
}

/// Loads the state index from disk.
///
/// A missing file yields an empty index.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_state(path: &Path) -> Result<StateFile> {
    tracing::debug!(path = %path.display(), "loading state index");
    if !path.exists() {
        return Ok(StateFile::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| CxferError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Persists the state index to disk atomically.
///
/// The index is written to a sibling temporary file and renamed over the
/// previous one.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_state(path: &Path, state: &StateFile) -> Result<()> {
    tracing::debug!(path = %path.display(), containers = state.containers.len(), "saving state index");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CxferError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_vec_pretty(state)?;
    std::fs::write(&tmp, content).map_err(|e| CxferError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| CxferError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use cxfer_common::types::MountMode;

    use super::*;

    fn entry(name: &str) -> StateEntry {
        StateEntry {
            id: ContainerId::new(format!("id-{name}")),
            name: name.into(),
            state: ContainerState::Running,
            image: "debian:stable-slim".into(),
            rootfs_path: PathBuf::from("/var/lib/cxfer/containers/x/rootfs"),
            mounts: vec![MountSpec::new("/srv/nfs", "/nfsdir", MountMode::ReadWrite)],
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = load_state(&dir.path().join("state.json")).expect("load");
        assert!(state.containers.is_empty());
    }

    #[test]
    fn save_then_load_preserves_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");
        let state = StateFile {
            containers: vec![entry("a-1"), entry("b-1")],
        };
        save_state(&path, &state).expect("save");
        let loaded = load_state(&path).expect("load");
        assert_eq!(loaded, state);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").expect("write");
        assert!(matches!(
            load_state(&path),
            Err(CxferError::Serialization { .. })
        ));
    }

    #[test]
    fn lookup_by_name_and_id() {
        let mut state = StateFile {
            containers: vec![entry("a-1")],
        };
        assert!(state.by_name("a-1").is_some());
        assert!(state.by_name("a-2").is_none());
        let id = ContainerId::new("id-a-1");
        state.by_id_mut(&id).expect("entry").state = ContainerState::Stopped;
        assert_eq!(state.by_id(&id).expect("entry").state, ContainerState::Stopped);
    }
}
