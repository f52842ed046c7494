//! Run configuration, resolved once at startup.
//!
//! Nothing in the workspace consults the process environment after a
//! [`HarnessConfig`] has been built; it is passed by reference instead.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{CxferError, Result};
use crate::types::{MountMode, MountSpec};

/// Container backend driving the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// A Docker engine reached through the `docker` CLI.
    #[default]
    Docker,
    /// Directory-rooted containers on the local host.
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = CxferError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "local" => Ok(Self::Local),
            other => Err(CxferError::Config {
                message: format!("unknown backend `{other}` (expected docker or local)"),
            }),
        }
    }
}

/// What the harness does after a case fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop at the first failed case.
    #[default]
    FailFast,
    /// Run every case and report all outcomes.
    RunAll,
}

/// Configuration of one conformance run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Cluster name; acquisition is get-or-create by this name.
    pub cluster_name: String,
    /// Host directory shared into the container.
    pub nfs_dir: PathBuf,
    /// Container image identifier.
    pub image: String,
    /// Backend driving the cluster.
    pub backend: BackendKind,
    /// State directory of the local backend.
    pub data_dir: PathBuf,
    /// Behaviour after a failed case.
    pub failure_policy: FailurePolicy,
}

impl HarnessConfig {
    /// Builds a configuration from explicit arguments and an environment
    /// lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend variable holds an unknown value or the
    /// cluster name is empty.
    pub fn resolve(
        cluster_name: String,
        nfs_dir: PathBuf,
        image: String,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if cluster_name.trim().is_empty() {
            return Err(CxferError::Config {
                message: "cluster name must not be empty".into(),
            });
        }
        let backend = env(constants::ENV_BACKEND)
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| Ok(BackendKind::default()), |v| v.parse())?;
        let data_dir = env(constants::ENV_DATA_DIR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| env("HOME").map(|home| PathBuf::from(home).join(constants::USER_DATA_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from(constants::SYSTEM_DATA_DIR));

        Ok(Self {
            cluster_name,
            nfs_dir,
            image,
            backend,
            data_dir,
            failure_policy: FailurePolicy::default(),
        })
    }

    /// Returns the mount that shares `nfs_dir` into the container.
    #[must_use]
    pub fn nfs_mount(&self) -> MountSpec {
        MountSpec::new(
            self.nfs_dir.clone(),
            constants::NFS_MOUNT_POINT,
            MountMode::ReadWrite,
        )
    }
}
