//! Project identity derivation.
//!
//! Each host project directory maps to exactly one image tag and one container
//! name. The mapping must be stable across processes and machines (so `resume`
//! finds the container that `open` created) and collision-free across distinct
//! paths (so two projects never share a sandbox).
//!
//! Derivation hashes the canonical path rather than sanitizing the path text:
//! two long paths that differ only in a truncated suffix must still get
//! distinct names.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Hex characters of the path digest kept in resource names.
///
/// 16 hex chars = 64 bits, comfortably collision-free for any realistic
/// number of project directories while keeping names short enough for
/// runtime resource-name limits.
const DIGEST_LEN: usize = 16;

/// Prefix for image repository names.
const IMAGE_PREFIX: &str = "safecrate";

/// Prefix for container names.
const CONTAINER_PREFIX: &str = "safecrate";

/// Deterministic identity binding a host directory to one image/container pair.
///
/// Constructed only through [`ProjectIdentity::resolve`], which canonicalizes
/// the path first: `./foo`, `/abs/foo`, and a symlink to `foo` all yield the
/// same identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    /// Canonicalized absolute project path.
    project_path: PathBuf,
    /// Image tag for this project's sandbox image.
    image_tag: String,
    /// Container name for this project's session.
    container_name: String,
}

impl ProjectIdentity {
    /// Resolve a host path to its project identity.
    ///
    /// Fails with [`Error::InvalidPath`] when the path does not exist, is not
    /// a directory, or cannot be canonicalized.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let canonical = path
            .canonicalize()
            .map_err(|e| Error::invalid_path(path, e.to_string()))?;

        if !canonical.is_dir() {
            return Err(Error::invalid_path(path, "not a directory"));
        }

        let digest = path_digest(&canonical);

        Ok(Self {
            image_tag: format!("{}/{}", IMAGE_PREFIX, digest),
            container_name: format!("{}-{}", CONTAINER_PREFIX, digest),
            project_path: canonical,
        })
    }

    /// Canonicalized absolute project path.
    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Image tag for this project's sandbox image.
    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }

    /// Container name for this project's session.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }
}

impl fmt::Display for ProjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.project_path.display())
    }
}

/// Hash a canonical path into a short lowercase-hex digest.
fn path_digest(canonical: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_os_str().as_encoded_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(DIGEST_LEN);
    for byte in digest.iter().take(DIGEST_LEN / 2) {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
