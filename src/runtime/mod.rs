//! Runtime client abstraction.
//!
//! The [`RuntimeClient`] trait is the only seam through which safecrate talks
//! to the external container runtime. The session state machine takes the
//! client as an explicit handle (never a global), so tests substitute a fake
//! runtime and the production binary passes a [`docker::DockerClient`].
//!
//! Error contract: calls that cannot reach the daemon at all fail with
//! [`Error::RuntimeUnavailable`](crate::error::Error::RuntimeUnavailable),
//! while a daemon that answers "no such container/image" fails with
//! [`Error::NotFound`](crate::error::Error::NotFound). The state machine
//! depends on that distinction to tell "nothing to reconcile" apart from
//! "cannot reconcile".

pub mod docker;

use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::policy::{NetworkMode, RuntimeSpec};

pub use docker::DockerClient;

/// Observed liveness of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// Container exists and is active.
    Running,
    /// Container exists but is inactive.
    Stopped,
    /// No container with this name.
    Absent,
}

/// Settings a container was created with, as reported by the runtime.
///
/// Used to detect configuration mismatches on resume/reopen: mounts and
/// network cannot change without recreating the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Network mode at creation time.
    pub network: NetworkMode,
    /// Command argv at creation time.
    pub command: Vec<String>,
}

/// Result of reconciling one container against the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Observed liveness.
    pub status: ContainerStatus,
    /// Created-with settings; `None` when the container is absent.
    pub config: Option<ContainerConfig>,
}

impl Observation {
    /// Observation for a container the runtime does not know.
    pub fn absent() -> Self {
        Self {
            status: ContainerStatus::Absent,
            config: None,
        }
    }
}

/// Narrow interface over the external container runtime.
///
/// Every call is a blocking round trip; nothing is cached between calls.
pub trait RuntimeClient {
    /// Build (or rebuild) an image from a build file, tagged `tag`.
    fn build_image(&self, tag: &str, build_file: &Path, context: &Path) -> Result<()>;

    /// Whether an image with this tag exists locally.
    fn image_exists(&self, tag: &str) -> Result<bool>;

    /// Remove a local image by tag.
    fn remove_image(&self, tag: &str) -> Result<()>;

    /// Create a container from a resolved spec without starting it.
    ///
    /// A name conflict with an existing container fails with
    /// [`Error::AlreadyRunning`](crate::error::Error::AlreadyRunning); the
    /// runtime's name uniqueness is the mutual-exclusion authority here.
    fn create_container(&self, spec: &RuntimeSpec) -> Result<()>;

    /// Start a created or stopped container in the foreground, attached to
    /// the caller's terminal. Blocks until the container's command exits and
    /// returns its exit code.
    fn start_container(&self, name: &str) -> Result<i32>;

    /// Attach the caller's terminal to an already-running container.
    /// Blocks until detach or exit and returns the exit code.
    fn attach(&self, name: &str) -> Result<i32>;

    /// Gracefully stop a running container, killing it after `timeout`.
    fn stop_container(&self, name: &str, timeout: Duration) -> Result<()>;

    /// Remove a container. With `force`, removes even a running container.
    fn remove_container(&self, name: &str, force: bool) -> Result<()>;

    /// Query the observed state of a container.
    ///
    /// An unknown name yields [`Observation::absent`], not an error; only an
    /// unreachable daemon is an error here.
    fn inspect(&self, name: &str) -> Result<Observation>;
}
