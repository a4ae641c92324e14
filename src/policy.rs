//! Mount and policy resolution.
//!
//! Translates declared user intent ([`SessionSpec`]) plus a project identity
//! into the runtime-facing [`RuntimeSpec`]: exactly one bind mount, an explicit
//! network mode, and a verbatim command vector. Building a spec is pure; no
//! runtime calls happen here.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::identity::ProjectIdentity;

/// Fixed container-side mount point for the project directory.
///
/// The sandbox exposes exactly this path; nothing else from the host is
/// reachable inside the container.
pub const WORKSPACE_DIR: &str = "/workspace";

/// Default interactive command when no override is given.
pub const DEFAULT_COMMAND: &[&str] = &["nvim", "."];

/// Embedded default Dockerfile for the sandbox image.
const DEFAULT_DOCKERFILE: &str = include_str!("Dockerfile.template");

// ============================================================================
// Build source
// ============================================================================

/// Where the sandbox image definition comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BuildSource {
    /// The embedded Dockerfile template.
    #[default]
    Default,
    /// A user-supplied build file.
    Custom(PathBuf),
}

impl BuildSource {
    /// Validate the source and stage it as a file on disk for the runtime.
    ///
    /// The default template is written to a temp file that lives as long as
    /// the returned [`BuildFile`]. A custom path must exist and be a readable
    /// file, else [`Error::BuildSource`].
    pub fn stage(&self) -> Result<BuildFile> {
        match self {
            BuildSource::Default => {
                let file = tempfile::Builder::new()
                    .prefix("Dockerfile.safecrate.")
                    .tempfile()
                    .map_err(|e| {
                        Error::build_source(format!("staging default dockerfile: {}", e))
                    })?;
                std::fs::write(file.path(), DEFAULT_DOCKERFILE).map_err(|e| {
                    Error::build_source(format!("staging default dockerfile: {}", e))
                })?;
                Ok(BuildFile::Staged(file))
            }
            BuildSource::Custom(path) => {
                if !path.exists() {
                    return Err(Error::build_source(format!(
                        "build file not found: {}",
                        path.display()
                    )));
                }
                if !path.is_file() {
                    return Err(Error::build_source(format!(
                        "build file is not a regular file: {}",
                        path.display()
                    )));
                }
                // Readability check up front, so the failure names the file
                // instead of surfacing as an opaque build error later.
                std::fs::File::open(path).map_err(|e| {
                    Error::build_source(format!("build file unreadable: {}: {}", path.display(), e))
                })?;
                Ok(BuildFile::Custom(path.clone()))
            }
        }
    }
}

/// A build file staged on disk, ready to hand to the runtime.
///
/// Holds the temp file alive for the staged default template.
#[derive(Debug)]
pub enum BuildFile {
    /// Default template written to a temp file.
    Staged(tempfile::NamedTempFile),
    /// Validated user-supplied path.
    Custom(PathBuf),
}

impl BuildFile {
    /// Path to hand to the runtime's build call.
    pub fn path(&self) -> &Path {
        match self {
            BuildFile::Staged(file) => file.path(),
            BuildFile::Custom(path) => path,
        }
    }
}

// ============================================================================
// Session spec
// ============================================================================

/// Network policy for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkMode {
    /// Default bridged networking.
    #[default]
    Bridge,
    /// Full isolation: no interfaces beyond loopback, no route out.
    None,
}

impl NetworkMode {
    /// The runtime's name for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkMode::Bridge => "bridge",
            NetworkMode::None => "none",
        }
    }

    /// Parse the runtime's name back into a mode.
    ///
    /// The runtime reports "default" for containers created without an
    /// explicit network flag; treat it as bridge.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bridge" | "default" => Some(NetworkMode::Bridge),
            "none" => Some(NetworkMode::None),
            _ => None,
        }
    }
}

/// Declared intent for a session, built once per invocation from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    /// Network policy (bridged unless the user disabled networking).
    pub network: NetworkMode,
    /// Command override; `None` means the default interactive editor.
    pub command: Option<Vec<String>>,
    /// Whether the container persists after the foreground command exits.
    pub keep_alive: bool,
}

impl Default for SessionSpec {
    fn default() -> Self {
        Self {
            network: NetworkMode::Bridge,
            command: None,
            keep_alive: false,
        }
    }
}

impl SessionSpec {
    /// The effective command argv: the override verbatim, or the default
    /// interactive editor. Never interpolated into a shell string.
    pub fn effective_command(&self) -> Vec<String> {
        match &self.command {
            Some(argv) => argv.clone(),
            None => DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// Runtime spec
// ============================================================================

/// A single host-to-container bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountBinding {
    /// Canonicalized host path.
    pub source: PathBuf,
    /// Target path in the container.
    pub target: PathBuf,
}

/// Resolved, runtime-facing description of a container.
///
/// Immutable once built; the adapter executes it verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSpec {
    /// Image reference to create the container from.
    pub image: String,
    /// Container name (unique per identity within the runtime).
    pub container_name: String,
    /// The one and only bind mount.
    pub mount: MountBinding,
    /// Network mode.
    pub network: NetworkMode,
    /// Working directory inside the container.
    pub workdir: PathBuf,
    /// Command argv, passed as a vector (no shell interpolation).
    pub command: Vec<String>,
}

impl RuntimeSpec {
    /// Resolve an identity plus declared intent into a runtime spec.
    ///
    /// Pure: validates nothing on disk and performs no runtime calls. The
    /// mount is always the identity's canonical project path mapped to
    /// [`WORKSPACE_DIR`], which is what keeps unrelated host paths out of
    /// the sandbox.
    pub fn build(identity: &ProjectIdentity, spec: &SessionSpec) -> Self {
        Self {
            image: identity.image_tag().to_string(),
            container_name: identity.container_name().to_string(),
            mount: MountBinding {
                source: identity.project_path().to_path_buf(),
                target: PathBuf::from(WORKSPACE_DIR),
            },
            network: spec.network,
            workdir: PathBuf::from(WORKSPACE_DIR),
            command: spec.effective_command(),
        }
    }
}
