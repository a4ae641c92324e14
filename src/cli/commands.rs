//! Lifecycle verbs: init, open, resume, remove, status.
//!
//! Each verb resolves the project identity, invokes the session manager, and
//! prints the outcome. Exit-code mapping happens in `main`.

use std::path::PathBuf;

use clap::Args;

use safecrate::{
    BuildSource, InitOutcome, NetworkMode, OpenMode, ProjectIdentity, RemoveOutcome,
    ResumeRequest, SessionSpec,
};

// ============================================================================
// init
// ============================================================================

/// Build the sandbox image for a project.
///
/// Re-running init rebuilds the image in place, which is how you refresh the
/// tool versions inside the sandbox.
///
/// Examples:
///   safecrate init ~/src/untrusted-project
///   safecrate init ~/src/untrusted-project --dockerfile ./Dockerfile.audit
#[derive(Args, Debug)]
pub struct InitCmd {
    /// Project directory (default: current directory)
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Custom Dockerfile (overrides the built-in template)
    #[arg(long, value_name = "PATH")]
    pub dockerfile: Option<PathBuf>,
}

impl InitCmd {
    pub fn run(self) -> safecrate::Result<()> {
        let manager = crate::cli::manager();
        let identity = ProjectIdentity::resolve(&self.dir)?;

        let source = match self.dockerfile {
            Some(path) => BuildSource::Custom(path),
            None => BuildSource::Default,
        };

        match manager.init(&identity, &source)? {
            InitOutcome::Built => println!("Built sandbox image {}", identity.image_tag()),
            InitOutcome::Rebuilt => println!("Rebuilt sandbox image {}", identity.image_tag()),
        }

        println!();
        println!("WARNING: container isolation is not a full security boundary.");
        println!("For maximum safety run safecrate itself inside a VM.");
        println!();
        println!("Next: safecrate open {}", self.dir.display());

        Ok(())
    }
}

// ============================================================================
// open
// ============================================================================

/// Open a project in an isolated container.
///
/// Mounts the project directory at /workspace and runs the command in the
/// foreground. Run on an already-open project, it attaches to the existing
/// session instead of creating a second container.
///
/// Examples:
///   safecrate open ~/src/untrusted-project
///   safecrate open ~/src/untrusted-project --no-network --keep-container
///   safecrate open ~/src/untrusted-project --cmd bash
#[derive(Args, Debug)]
pub struct OpenCmd {
    /// Project directory to open
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Command to run inside the container (default: nvim .)
    #[arg(long, num_args = 1.., value_name = "COMMAND")]
    pub cmd: Option<Vec<String>>,

    /// Disable networking entirely (no route out of the container)
    #[arg(long)]
    pub no_network: bool,

    /// Keep the container after the command exits (enables `resume`)
    #[arg(long)]
    pub keep_container: bool,
}

impl OpenCmd {
    pub fn run(self) -> safecrate::Result<()> {
        let manager = crate::cli::manager();
        let identity = ProjectIdentity::resolve(&self.dir)?;

        let spec = SessionSpec {
            network: if self.no_network {
                NetworkMode::None
            } else {
                NetworkMode::Bridge
            },
            command: self.cmd,
            keep_alive: self.keep_container,
        };

        let exit = manager.open(&identity, &spec)?;

        match exit.mode {
            OpenMode::Attached => println!("Detached from running session."),
            _ if exit.removed => println!("Session ended; container removed."),
            _ => println!(
                "Session ended; container kept. Resume with: safecrate resume {}",
                self.dir.display()
            ),
        }

        std::process::exit(exit.exit_code);
    }
}

// ============================================================================
// resume
// ============================================================================

/// Resume a previously kept session.
///
/// Restarts the existing container with everything written inside it intact.
/// Mounts and network policy are fixed at creation time; requesting different
/// ones here fails instead of being ignored.
///
/// Examples:
///   safecrate resume ~/src/untrusted-project
#[derive(Args, Debug)]
pub struct ResumeCmd {
    /// Project directory whose session to resume
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Require the session to have networking disabled
    #[arg(long)]
    pub no_network: bool,

    /// Require the session's command override to match
    #[arg(long, num_args = 1.., value_name = "COMMAND")]
    pub cmd: Option<Vec<String>>,
}

impl ResumeCmd {
    pub fn run(self) -> safecrate::Result<()> {
        let manager = crate::cli::manager();
        let identity = ProjectIdentity::resolve(&self.dir)?;

        let request = ResumeRequest {
            network: self.no_network.then_some(NetworkMode::None),
            command: self.cmd,
        };

        let exit = manager.resume(&identity, &request)?;
        println!(
            "Session ended; container kept. Resume again with: safecrate resume {}",
            self.dir.display()
        );

        std::process::exit(exit.exit_code);
    }
}

// ============================================================================
// remove
// ============================================================================

/// Remove a project's container and sandbox image.
///
/// A running session is stopped first (gracefully, then killed after a
/// timeout). Use --force to skip the graceful stop.
///
/// Examples:
///   safecrate remove ~/src/untrusted-project
///   safecrate remove ~/src/untrusted-project --force
#[derive(Args, Debug)]
pub struct RemoveCmd {
    /// Project directory whose sandbox to remove
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Skip the graceful stop of a running session
    #[arg(long, short = 'f')]
    pub force: bool,
}

impl RemoveCmd {
    pub fn run(self) -> safecrate::Result<()> {
        let manager = crate::cli::manager();
        let identity = ProjectIdentity::resolve(&self.dir)?;

        match manager.remove(&identity, self.force)? {
            RemoveOutcome::Removed => {
                println!("Removed sandbox for {}", identity);
            }
            RemoveOutcome::NothingToRemove => {
                println!("No sandbox to remove for {}", identity);
            }
        }

        Ok(())
    }
}

// ============================================================================
// status
// ============================================================================

/// Show the sandbox state for a project.
///
/// Examples:
///   safecrate status ~/src/untrusted-project
#[derive(Args, Debug)]
pub struct StatusCmd {
    /// Project directory (default: current directory)
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,
}

impl StatusCmd {
    pub fn run(self) -> safecrate::Result<()> {
        let manager = crate::cli::manager();
        let identity = ProjectIdentity::resolve(&self.dir)?;

        let state = manager.status(&identity)?;
        println!("{:<12} {}", "project:", identity);
        println!("{:<12} {}", "image:", identity.image_tag());
        println!("{:<12} {}", "container:", identity.container_name());
        println!("{:<12} {}", "state:", state);

        Ok(())
    }
}
