//! Docker CLI adapter.
//!
//! Implements [`RuntimeClient`] by invoking the `docker` binary. Each method
//! is one blocking subprocess round trip; stderr is classified into the error
//! taxonomy so the state machine can distinguish an unreachable daemon from a
//! missing resource.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::policy::{NetworkMode, RuntimeSpec};
use crate::runtime::{ContainerConfig, ContainerStatus, Observation, RuntimeClient};

/// Client handle for a Docker daemon, addressed through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerClient {
    binary: String,
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerClient {
    /// Create a client invoking the given binary (normally `docker`, but
    /// e.g. `podman` speaks the same verbs).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run a docker command, capture output, and fail on non-zero exit with
    /// classified stderr.
    fn run(&self, args: &[&str]) -> Result<String> {
        let label = command_label(&self.binary, args);
        trace!(command = %label, "running runtime command");

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| spawn_error(&self.binary, e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(classify_failure(&label, stderr.trim()))
        }
    }

    /// Run a docker command with the caller's terminal attached, returning
    /// the exit code. Interrupt signals reach the child directly through the
    /// inherited terminal.
    fn run_interactive(&self, args: &[&str]) -> Result<i32> {
        let label = command_label(&self.binary, args);
        debug!(command = %label, "running interactive runtime command");

        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| spawn_error(&self.binary, e))?;

        Ok(status.code().unwrap_or(UNKNOWN_EXIT_CODE))
    }
}

/// Exit code reported when the child was killed by a signal and no code is
/// available.
const UNKNOWN_EXIT_CODE: i32 = 130;

impl RuntimeClient for DockerClient {
    fn build_image(&self, tag: &str, build_file: &Path, context: &Path) -> Result<()> {
        let build_file = build_file.to_string_lossy();
        let context = context.to_string_lossy();
        // Build output streams to the terminal; a silent multi-minute build
        // reads as a hang.
        let code = self.run_interactive(&["build", "-t", tag, "-f", &build_file, &context])?;
        if code == 0 {
            Ok(())
        } else {
            Err(Error::command_failed(
                format!("{} build", self.binary),
                format!("exit status {}", code),
            ))
        }
    }

    fn image_exists(&self, tag: &str) -> Result<bool> {
        match self.run(&["image", "inspect", "--format", "{{.Id}}", tag]) {
            Ok(_) => Ok(true),
            Err(Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn remove_image(&self, tag: &str) -> Result<()> {
        self.run(&["rmi", tag]).map(|_| ())
    }

    fn create_container(&self, spec: &RuntimeSpec) -> Result<()> {
        let volume = format!(
            "{}:{}",
            spec.mount.source.display(),
            spec.mount.target.display()
        );
        let workdir = spec.workdir.to_string_lossy();

        let mut args: Vec<&str> = vec![
            "create",
            "-it",
            "--name",
            &spec.container_name,
            "--network",
            spec.network.as_str(),
            "-v",
            &volume,
            "-w",
            &workdir,
            &spec.image,
        ];
        // Command goes through as an argv tail, never a shell string.
        args.extend(spec.command.iter().map(String::as_str));

        match self.run(&args) {
            Ok(_) => Ok(()),
            Err(Error::CommandFailed { reason, .. })
                if reason.to_lowercase().contains("already in use") =>
            {
                Err(Error::already_running(&spec.container_name))
            }
            Err(e) => Err(e),
        }
    }

    fn start_container(&self, name: &str) -> Result<i32> {
        self.run_interactive(&["start", "-ai", name])
    }

    fn attach(&self, name: &str) -> Result<i32> {
        self.run_interactive(&["attach", name])
    }

    fn stop_container(&self, name: &str, timeout: Duration) -> Result<()> {
        let secs = timeout.as_secs().to_string();
        self.run(&["stop", "-t", &secs, name]).map(|_| ())
    }

    fn remove_container(&self, name: &str, force: bool) -> Result<()> {
        if force {
            self.run(&["rm", "-f", name]).map(|_| ())
        } else {
            self.run(&["rm", name]).map(|_| ())
        }
    }

    fn inspect(&self, name: &str) -> Result<Observation> {
        let json = match self.run(&["inspect", "--format", "{{json .}}", name]) {
            Ok(json) => json,
            Err(Error::NotFound { .. }) => return Ok(Observation::absent()),
            Err(e) => return Err(e),
        };

        let detail: InspectDetail = serde_json::from_str(json.trim()).map_err(|e| {
            Error::command_failed(
                format!("{} inspect", self.binary),
                format!("unparseable inspect output: {}", e),
            )
        })?;

        Ok(detail.into_observation())
    }
}

// ============================================================================
// Inspect output
// ============================================================================

/// The slice of `docker inspect` output safecrate reconciles against.
#[derive(Debug, Deserialize)]
struct InspectDetail {
    #[serde(rename = "State")]
    state: InspectState,
    #[serde(rename = "HostConfig")]
    host_config: InspectHostConfig,
    #[serde(rename = "Config", default)]
    config: InspectConfig,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Running")]
    running: bool,
}

#[derive(Debug, Deserialize)]
struct InspectHostConfig {
    #[serde(rename = "NetworkMode", default)]
    network_mode: String,
}

#[derive(Debug, Default, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Cmd", default)]
    cmd: Option<Vec<String>>,
}

impl InspectDetail {
    fn into_observation(self) -> Observation {
        let status = if self.state.running {
            ContainerStatus::Running
        } else {
            ContainerStatus::Stopped
        };

        // An unrecognized mode (e.g. a user network) is reported as bridge:
        // the only policy safecrate enforces is none-vs-routable.
        let network =
            NetworkMode::parse(&self.host_config.network_mode).unwrap_or(NetworkMode::Bridge);

        Observation {
            status,
            config: Some(ContainerConfig {
                network,
                command: self.config.cmd.unwrap_or_default(),
            }),
        }
    }
}

// ============================================================================
// Error classification
// ============================================================================

/// Short display form of a runtime command, for error context.
fn command_label(binary: &str, args: &[&str]) -> String {
    match args.first() {
        Some(verb) => format!("{} {}", binary, verb),
        None => binary.to_string(),
    }
}

/// Classify a failure to spawn the runtime binary at all.
fn spawn_error(binary: &str, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::runtime_unavailable(format!(
            "'{}' not found in PATH: is the container runtime installed?",
            binary
        ))
    } else {
        Error::runtime_unavailable(format!("failed to execute '{}': {}", binary, e))
    }
}

/// Map runtime stderr onto the error taxonomy.
///
/// Docker has no machine-readable error channel on the CLI, so this matches
/// the stable stderr phrases the daemon and client have used for years.
fn classify_failure(command: &str, stderr: &str) -> Error {
    let lower = stderr.to_lowercase();

    if lower.contains("cannot connect to the docker daemon")
        || lower.contains("error during connect")
        || lower.contains("docker daemon is not running")
        || lower.contains("connection refused")
    {
        return Error::runtime_unavailable(stderr.to_string());
    }

    if lower.contains("no such container")
        || lower.contains("no such image")
        || lower.contains("no such object")
    {
        return Error::NotFound {
            kind: if lower.contains("image") {
                "image".to_string()
            } else {
                "container".to_string()
            },
            name: extract_name(stderr),
        };
    }

    Error::command_failed(command, stderr.to_string())
}

/// Pull the resource name out of a "no such ..." stderr line, best effort.
fn extract_name(stderr: &str) -> String {
    stderr
        .rsplit(&[':', ' '][..])
        .next()
        .unwrap_or(stderr)
        .trim()
        .to_string()
}
