//! Command-line surface and configuration resolution.

pub mod run;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use cxfer_common::config::HarnessConfig;
use cxfer_common::constants::{DEFAULT_CLUSTER_SUFFIX, DEFAULT_IMAGE, DEFAULT_NFS_DIR};

/// Conformance test for container file transfer.
#[derive(Parser, Debug)]
#[command(name = "cxfer", version, about, long_about = None)]
pub struct Cli {
    /// Cluster name [default: <login user>-test-write-file].
    #[arg(long)]
    pub name: Option<String>,

    /// Host directory shared into the container [default: ./nfs-dir].
    #[arg(long)]
    pub nfsdir: Option<PathBuf>,

    /// Container image.
    #[arg(long, default_value = DEFAULT_IMAGE)]
    pub image: String,
}

/// Resolves the configuration and runs the conformance test.
///
/// # Errors
///
/// Returns an error if the configuration cannot be resolved or the run
/// does not pass.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli)?;
    run::execute(&config)
}

/// Builds the run configuration from the arguments and the process
/// environment. This is the only place ambient process state is read.
fn resolve_config(cli: Cli) -> anyhow::Result<HarnessConfig> {
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    let cluster_name = match cli.name {
        Some(name) => name,
        None => default_cluster_name(login_user()?.as_str()),
    };
    let nfs_dir = absolute_nfs_dir(&cwd, cli.nfsdir.as_deref());
    let config = HarnessConfig::resolve(cluster_name, nfs_dir, cli.image, |key| {
        std::env::var(key).ok()
    })?;
    tracing::debug!(?config, "resolved configuration");
    Ok(config)
}

fn default_cluster_name(user: &str) -> String {
    format!("{user}-{DEFAULT_CLUSTER_SUFFIX}")
}

/// Anchors the shared directory at `cwd` unless it is already absolute.
fn absolute_nfs_dir(cwd: &Path, nfsdir: Option<&Path>) -> PathBuf {
    cwd.join(nfsdir.unwrap_or_else(|| Path::new(DEFAULT_NFS_DIR)))
}

/// Name of the user running the process.
fn login_user() -> anyhow::Result<String> {
    let uid = nix::unistd::getuid();
    match nix::unistd::User::from_uid(uid) {
        Ok(Some(user)) => return Ok(user.name),
        Ok(None) => tracing::debug!(%uid, "uid has no passwd entry"),
        Err(e) => tracing::debug!(%uid, error = %e, "passwd lookup failed"),
    }
    std::env::var("USER")
        .ok()
        .filter(|u| !u.is_empty())
        .with_context(|| format!("cannot determine the login user for uid {uid}; pass --name"))
}
