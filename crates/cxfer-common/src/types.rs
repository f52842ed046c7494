//! Domain primitive types used across the cxfer workspace.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CxferError;

/// Unique identifier for a container instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a new container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a container as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerState {
    /// Created but not started.
    Created,
    /// Actively running.
    Running,
    /// Stopped; can be started again.
    Stopped,
    /// Frozen; must be unpaused rather than started.
    Paused,
    /// Being restarted by the engine's restart policy.
    Restarting,
    /// Failed removal or otherwise unrecoverable; can only be removed.
    Dead,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MountMode {
    /// Read-write.
    #[default]
    ReadWrite,
    /// Read-only.
    ReadOnly,
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadWrite => write!(f, "rw"),
            Self::ReadOnly => write!(f, "ro"),
        }
    }
}

impl FromStr for MountMode {
    type Err = CxferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rw" => Ok(Self::ReadWrite),
            "ro" => Ok(Self::ReadOnly),
            other => Err(CxferError::Config {
                message: format!("unknown mount mode `{other}` (expected rw or ro)"),
            }),
        }
    }
}

/// Binds a host directory to a path inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountSpec {
    /// Directory on the host.
    pub host_dir: PathBuf,
    /// Absolute mount point inside the container.
    pub container_path: PathBuf,
    /// Access mode.
    pub mode: MountMode,
}

impl MountSpec {
    /// Creates a mount specification.
    #[must_use]
    pub fn new(
        host_dir: impl Into<PathBuf>,
        container_path: impl Into<PathBuf>,
        mode: MountMode,
    ) -> Self {
        Self {
            host_dir: host_dir.into(),
            container_path: container_path.into(),
            mode,
        }
    }

    /// Returns whether `container_path` lies at or beneath this mount point.
    #[must_use]
    pub fn covers(&self, container_path: &Path) -> bool {
        container_path.starts_with(&self.container_path)
    }

    /// Maps a container path beneath this mount to its host-side location.
    ///
    /// Returns `None` if the path is not covered by the mount.
    #[must_use]
    pub fn host_path_for(&self, container_path: &Path) -> Option<PathBuf> {
        container_path
            .strip_prefix(&self.container_path)
            .ok()
            .map(|rest| self.host_dir.join(rest))
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.host_dir.display(),
            self.container_path.display(),
            self.mode
        )
    }
}

impl FromStr for MountSpec {
    type Err = CxferError;

    /// Parses `host:container[:mode]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CxferError::Config {
            message: format!("invalid mount `{s}` (expected host:container[:mode])"),
        };
        let parts: Vec<&str> = s.split(':').collect();
        let (host, container, mode) = match parts.as_slice() {
            [host, container] => (*host, *container, MountMode::default()),
            [host, container, mode] => (*host, *container, mode.parse()?),
            _ => return Err(invalid()),
        };
        if host.is_empty() || !container.starts_with('/') {
            return Err(invalid());
        }
        Ok(Self::new(host, container, mode))
    }
}

/// SHA-256 digest used to summarise payloads in reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Computes the digest of `data`.
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the hex-encoded hash string.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}
