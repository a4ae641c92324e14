//! safecrate - disposable container sandboxes for untrusted code
//!
//! safecrate is a library and CLI for opening, inspecting, and building
//! untrusted source code inside disposable, network-restrictable containers.
//! All tooling (editor, language server, compiler) runs inside the container;
//! only the project directory crosses the boundary.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │  safecrate CLI / Library                        │
//! ├─────────────────────────────────────────────────┤
//! │  Session state machine (SessionManager)         │
//! ├─────────────────────────────────────────────────┤
//! │  Identity + policy (ProjectIdentity, RuntimeSpec)│
//! ├─────────────────────────────────────────────────┤
//! │  Runtime client (RuntimeClient / DockerClient)  │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use safecrate::{BuildSource, DockerClient, ProjectIdentity, SessionManager, SessionSpec};
//!
//! let manager = SessionManager::new(DockerClient::default());
//! let identity = ProjectIdentity::resolve("/path/to/untrusted/project").unwrap();
//!
//! // Build the sandbox image, then open the project inside it.
//! manager.init(&identity, &BuildSource::Default).unwrap();
//! let exit = manager.open(&identity, &SessionSpec::default()).unwrap();
//!
//! println!("session exited with: {}", exit.exit_code);
//! ```
//!
//! # Guarantees
//!
//! - One image/container identity per canonical project path
//! - Exactly one bind mount: the project directory, nothing else
//! - `--no-network` means no route out, not just unpublished ports
//! - Command overrides pass as argv, never through a shell string
//! - State is reconciled from the runtime on every invocation, never cached

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod identity;
pub mod policy;
pub mod retry;
pub mod runtime;
pub mod session;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use identity::ProjectIdentity;
pub use policy::{BuildSource, MountBinding, NetworkMode, RuntimeSpec, SessionSpec};
pub use runtime::{ContainerStatus, DockerClient, Observation, RuntimeClient};
pub use session::{
    InitOutcome, OpenMode, RemoveOutcome, ResumeRequest, SessionExit, SessionManager, SessionState,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
