//! System-wide constants and default values.

/// System-wide data directory used when no home directory is known.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/cxfer";

/// Name of the data directory created under `$HOME`.
pub const USER_DATA_DIR_NAME: &str = ".cxfer";

/// File name of the local backend's state index.
pub const STATE_FILE_NAME: &str = "state.json";

/// Suffix appended to the login user name to form the default cluster name.
pub const DEFAULT_CLUSTER_SUFFIX: &str = "test-write-file";

/// Default shared directory, relative to the invocation directory.
pub const DEFAULT_NFS_DIR: &str = "nfs-dir";

/// Default container image.
pub const DEFAULT_IMAGE: &str = "debian:stable-slim";

/// Mount point of the shared directory inside the container.
pub const NFS_MOUNT_POINT: &str = "/nfsdir";

/// Number of containers in the conformance cluster.
pub const NODE_COUNT: usize = 1;

/// Environment variable selecting the backend.
pub const ENV_BACKEND: &str = "CXFER_BACKEND";

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "CXFER_DATA_DIR";
