//! Docker engine backend driven through the `docker` CLI.
//!
//! Files are moved by executing a writer or reader inside the container and
//! streaming the payload over the exec session's stdin or stdout. Failures
//! reported by those in-container tools are classified by the trailing text
//! of their stderr.

use std::path::PathBuf;

use cxfer_common::error::{CxferError, Result, TransferError, TransferOp};
use cxfer_common::types::{ContainerId, ContainerState, MountSpec};

use super::{ContainerBackend, ContainerConfig, ContainerInfo};
use crate::exec::{self, ExecOutput};

const DOCKER_BINARY: &str = "docker";

/// Block size for the in-container writer.
const WRITE_BLOCK_SIZE: usize = 64 * 1024;

/// `docker exec` exit codes meaning the command never ran.
const EXEC_NOT_RUNNABLE: [i32; 3] = [125, 126, 127];

/// Backend that manages containers on a Docker engine.
pub struct DockerBackend {
    docker: PathBuf,
}

impl DockerBackend {
    /// Creates a backend using the given `docker` binary.
    #[must_use]
    pub const fn new(docker: PathBuf) -> Self {
        Self { docker }
    }

    /// Creates a backend using the `docker` binary found on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if no `docker` binary is on `PATH`.
    pub fn locate() -> Result<Self> {
        let docker = which::which(DOCKER_BINARY).map_err(|e| CxferError::NotFound {
            kind: "binary",
            id: format!("{DOCKER_BINARY} ({e})"),
        })?;
        tracing::debug!(docker = %docker.display(), "located docker binary");
        Ok(Self::new(docker))
    }

    fn run(&self, args: &[String], stdin: Option<&[u8]>) -> Result<ExecOutput> {
        exec::run(&self.docker, args, stdin)
    }

    /// Runs a lifecycle command that must succeed.
    fn run_checked(&self, args: &[String]) -> Result<ExecOutput> {
        let out = self.run(args, None)?;
        if out.success() {
            Ok(out)
        } else {
            Err(self.command_failed(args, &out))
        }
    }

    fn command_failed(&self, args: &[String], out: &ExecOutput) -> CxferError {
        CxferError::Backend {
            command: format!("{} {}", self.docker.display(), args.join(" ")),
            message: out.stderr.trim_end().to_string(),
        }
    }

    /// Turns a failed transfer exec into a classified or backend error.
    fn transfer_failed(&self, op: TransferOp, path: &str, args: &[String], out: &ExecOutput) -> CxferError {
        if EXEC_NOT_RUNNABLE.contains(&out.exit_code) {
            return self.command_failed(args, out);
        }
        TransferError::from_message(op, path, &out.stderr).into()
    }
}

impl ContainerBackend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn find(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let args = inspect_args(name);
        let out = self.run(&args, None)?;
        if !out.success() {
            if out.stderr.contains("No such") {
                return Ok(None);
            }
            return Err(self.command_failed(&args, &out));
        }
        parse_inspect(name, &out.stdout_trimmed()).map(Some)
    }

    fn create(&self, config: &ContainerConfig) -> Result<ContainerId> {
        if let Some(mount) = config.mounts.iter().find(|m| m.host_dir.is_relative()) {
            return Err(CxferError::Config {
                message: format!("mount source {} must be absolute", mount.host_dir.display()),
            });
        }
        tracing::info!(name = %config.name, image = %config.image, "creating container (docker)");
        let out = self.run_checked(&create_args(config))?;
        Ok(ContainerId::new(out.stdout_trimmed()))
    }

    fn start(&self, id: &ContainerId) -> Result<()> {
        tracing::info!(id = %id, "starting container (docker)");
        let _ = self.run_checked(&["start".into(), id.to_string()])?;
        Ok(())
    }

    fn unpause(&self, id: &ContainerId) -> Result<()> {
        tracing::info!(id = %id, "unpausing container (docker)");
        let _ = self.run_checked(&["unpause".into(), id.to_string()])?;
        Ok(())
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        tracing::info!(id = %id, "removing container (docker)");
        let _ = self.run_checked(&["rm".into(), "-f".into(), "-v".into(), id.to_string()])?;
        Ok(())
    }

    fn write_file(&self, id: &ContainerId, path: &str, payload: &[u8]) -> Result<()> {
        tracing::debug!(id = %id, path, bytes = payload.len(), "writing file (docker)");
        let args = write_args(id, path);
        let out = self.run(&args, Some(payload))?;
        if out.success() {
            Ok(())
        } else {
            Err(self.transfer_failed(TransferOp::Write, path, &args, &out))
        }
    }

    fn read_file(&self, id: &ContainerId, path: &str) -> Result<Vec<u8>> {
        tracing::debug!(id = %id, path, "reading file (docker)");
        let args = read_args(id, path);
        let out = self.run(&args, None)?;
        if out.success() {
            Ok(out.stdout)
        } else {
            Err(self.transfer_failed(TransferOp::Read, path, &args, &out))
        }
    }

    fn is_available(&self) -> bool {
        self.run(&["version".into(), "--format".into(), "{{.Server.Version}}".into()], None)
            .is_ok_and(|out| out.success())
    }
}

fn inspect_args(name: &str) -> Vec<String> {
    vec![
        "inspect".into(),
        "--type".into(),
        "container".into(),
        "--format".into(),
        "{{.Id}} {{.State.Status}} {{json .HostConfig.Binds}}".into(),
        name.into(),
    ]
}

fn create_args(config: &ContainerConfig) -> Vec<String> {
    let mut args = vec![
        "create".into(),
        "--name".into(),
        config.name.clone(),
        "--hostname".into(),
        config.name.clone(),
    ];
    for mount in &config.mounts {
        args.push("-v".into());
        args.push(mount.to_string());
    }
    args.push(config.image.clone());
    // Keeps the container alive without depending on the image's entrypoint.
    args.extend(["tail", "-f", "/dev/null"].map(String::from));
    args
}

fn write_args(id: &ContainerId, path: &str) -> Vec<String> {
    vec![
        "exec".into(),
        "-i".into(),
        id.to_string(),
        "dd".into(),
        format!("of={path}"),
        format!("bs={WRITE_BLOCK_SIZE}"),
    ]
}

fn read_args(id: &ContainerId, path: &str) -> Vec<String> {
    vec!["exec".into(), id.to_string(), "cat".into(), path.into()]
}

/// Parses the `inspect` format line: `<id> <status> <binds-json>`.
fn parse_inspect(name: &str, line: &str) -> Result<ContainerInfo> {
    let malformed = || CxferError::Backend {
        command: format!("{DOCKER_BINARY} inspect {name}"),
        message: format!("unexpected inspect output: {line}"),
    };
    let mut fields = line.splitn(3, ' ');
    let (Some(id), Some(status)) = (fields.next(), fields.next()) else {
        return Err(malformed());
    };
    let binds: Option<Vec<String>> = serde_json::from_str(fields.next().unwrap_or("null"))?;
    let mounts = binds
        .unwrap_or_default()
        .iter()
        .map(|b| b.parse::<MountSpec>())
        .collect::<Result<Vec<_>>>()?;
    let state = match status {
        "running" => ContainerState::Running,
        "created" => ContainerState::Created,
        "exited" => ContainerState::Stopped,
        "paused" => ContainerState::Paused,
        "restarting" => ContainerState::Restarting,
        "dead" | "removing" => ContainerState::Dead,
        _ => return Err(malformed()),
    };
    Ok(ContainerInfo {
        id: ContainerId::new(id),
        name: name.into(),
        state,
        mounts,
    })
}
