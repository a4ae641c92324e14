//! CLI command implementations.
//!
//! The command surface parses verbs and flags, hands everything to the
//! session manager, and formats results. The core never prints; all
//! user-facing text lives here.

pub mod commands;

use safecrate::{DockerClient, SessionManager};

/// Build the session manager the commands run against.
///
/// The runtime client is constructed here and passed down explicitly, so the
/// library never reaches for an ambient connection.
pub fn manager() -> SessionManager<DockerClient> {
    SessionManager::new(DockerClient::default())
}
