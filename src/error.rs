//! Error types for safecrate.
//!
//! # Error Message Style Guide
//!
//! All error messages follow a consistent format for clarity and actionability:
//!
//! - **Format**: `"<operation> failed: <reason>"` or `"<entity> not found: <identifier>"`
//! - **Case**: All lowercase (Rust convention for error messages)
//! - **Context**: Include relevant identifiers (container name, path, state) when available
//! - **Actionability**: Messages should tell the user which verb to run next
//!
//! Every error is terminal for the invoking command. The session manager never
//! retries automatically, with one exception: [`Error::RuntimeUnavailable`] may be
//! retried with bounded backoff, because transient daemon startup races are
//! expected. Retrying anything else (a name conflict, a missing container) could
//! mask a security-relevant misconfiguration.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using safecrate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in safecrate operations.
///
/// Error messages follow a consistent format. See module documentation for style guide.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Path & Identity Errors
    // ========================================================================
    /// Host path does not exist, is not a directory, or cannot be canonicalized.
    #[error("invalid project path: {}: {reason}", path.display())]
    InvalidPath {
        /// The offending host path as given by the user.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
    },

    // ========================================================================
    // Session Lifecycle Errors
    // ========================================================================
    /// Verb requires a prior `init` (no image exists for this identity).
    #[error("sandbox not initialized for {project}: run `safecrate init` first")]
    NotInitialized {
        /// Display form of the project path.
        project: String,
    },

    /// Verb requires an existing container (none found for this identity).
    #[error("no session found for {project}: run `safecrate open` first")]
    NoSession {
        /// Display form of the project path.
        project: String,
    },

    /// A container with this identity's name already exists and is running.
    #[error("session already running: {container}")]
    AlreadyRunning {
        /// Container name that conflicted.
        container: String,
    },

    /// Resume or reopen requested settings that differ from the ones the
    /// container was created with.
    #[error(
        "session settings mismatch for {container}: {detail} \
         (mounts and network are fixed at creation; run `safecrate remove` and `open` again)"
    )]
    ConfigurationMismatch {
        /// Container name whose recorded settings conflict.
        container: String,
        /// Which setting differs and how.
        detail: String,
    },

    // ========================================================================
    // Build Errors
    // ========================================================================
    /// Custom build file is missing or unreadable.
    #[error("build source failed: {reason}")]
    BuildSource {
        /// Why the build source was rejected.
        reason: String,
    },

    // ========================================================================
    // Runtime Adapter Errors
    // ========================================================================
    /// The container runtime daemon cannot be reached at all.
    #[error("container runtime unavailable: {reason}")]
    RuntimeUnavailable {
        /// The runtime's own description of the failure.
        reason: String,
    },

    /// The runtime reports a missing resource (container or image).
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Resource kind ("container" or "image").
        kind: String,
        /// Resource name that was not found.
        name: String,
    },

    /// A runtime command ran but reported failure.
    #[error("command '{command}' failed: {reason}")]
    CommandFailed {
        /// The runtime command that failed (e.g., "docker build").
        command: String,
        /// Error message or reason for failure.
        reason: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// IO error wrapper.
    #[error("io operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-initialized error.
    pub fn not_initialized(project: impl Into<String>) -> Self {
        Self::NotInitialized {
            project: project.into(),
        }
    }

    /// Create a no-session error.
    pub fn no_session(project: impl Into<String>) -> Self {
        Self::NoSession {
            project: project.into(),
        }
    }

    /// Create an already-running error.
    pub fn already_running(container: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            container: container.into(),
        }
    }

    /// Create a configuration mismatch error.
    pub fn configuration_mismatch(container: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ConfigurationMismatch {
            container: container.into(),
            detail: detail.into(),
        }
    }

    /// Create a build source error.
    pub fn build_source(reason: impl Into<String>) -> Self {
        Self::BuildSource {
            reason: reason.into(),
        }
    }

    /// Create a runtime unavailable error.
    pub fn runtime_unavailable(reason: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a container-not-found error.
    pub fn container_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "container".to_string(),
            name: name.into(),
        }
    }

    /// Create an image-not-found error.
    pub fn image_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "image".to_string(),
            name: name.into(),
        }
    }

    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error represents a transient daemon outage worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RuntimeUnavailable { .. })
    }
}
