//! Session lifecycle state machine.
//!
//! One logical session per project identity. The manager owns no state of its
//! own: before every transition it reconciles against the runtime, because the
//! authoritative state lives there and may change out-of-band (a manual
//! `docker stop` or `docker rm` between invocations). A locally remembered
//! "last known state" is never trusted — there isn't one.
//!
//! Transition map:
//!
//! ```text
//! init:    Absent -> Built            (re-running rebuilds in place, declared)
//! open:    Built|Stopped -> Running   (Absent fails NotInitialized;
//!                                      Running attaches, never duplicates)
//! resume:  Stopped -> Running         (no container fails NoSession)
//! remove:  Built|Running|Stopped -> Removed (stop before rm, never orphans)
//! ```
//!
//! Mutual exclusion between concurrent invocations is delegated to the
//! runtime's container-name uniqueness: a create race loses with
//! [`Error::AlreadyRunning`] instead of producing a second container.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::ProjectIdentity;
use crate::policy::{BuildSource, NetworkMode, RuntimeSpec, SessionSpec};
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::runtime::{ContainerConfig, ContainerStatus, RuntimeClient};

/// Default graceful-stop window before the runtime kills the container.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Reconciled lifecycle state for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No image, no container.
    Absent,
    /// Image exists, no container.
    Built,
    /// Container exists and is active.
    Running,
    /// Container exists but is inactive.
    Stopped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Absent => "absent",
            SessionState::Built => "built",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// How `init` completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// First build for this identity.
    Built,
    /// Image existed and was rebuilt in place (explicit refresh, not a no-op).
    Rebuilt,
}

/// How `open` reached a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Fresh container created from the image.
    Created,
    /// Attached to the already-running session.
    Attached,
    /// Existing stopped container restarted.
    Restarted,
}

/// Result of a foreground session (open or resume).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExit {
    /// How the session was entered.
    pub mode: OpenMode,
    /// Exit code of the container's foreground command.
    pub exit_code: i32,
    /// Whether the container was removed afterwards (keep-alive off).
    pub removed: bool,
}

/// How `remove` completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Container and/or image were removed.
    Removed,
    /// Neither a container nor an image existed for this identity.
    NothingToRemove,
}

/// Settings requested on `resume`.
///
/// `None` fields mean "no preference": the session keeps whatever it was
/// created with. A `Some` that differs from the created configuration is a
/// [`Error::ConfigurationMismatch`] — mounts and network are fixed at
/// creation time and silently ignoring the request would defeat the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeRequest {
    /// Requested network mode, if the user stated one.
    pub network: Option<NetworkMode>,
    /// Requested command override, if the user stated one.
    pub command: Option<Vec<String>>,
}

/// Drives lifecycle transitions for project identities.
///
/// Generic over the runtime client so tests run against a fake runtime; the
/// client handle is explicit, never ambient.
#[derive(Debug)]
pub struct SessionManager<C: RuntimeClient> {
    client: C,
    retry: RetryConfig,
    stop_timeout: Duration,
}

impl<C: RuntimeClient> SessionManager<C> {
    /// Create a manager over the given runtime client.
    pub fn new(client: C) -> Self {
        Self {
            client,
            retry: RetryConfig::for_daemon(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Override the graceful-stop window used by `remove`.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    // ========================================================================
    // Verbs
    // ========================================================================

    /// Build (or rebuild) the sandbox image for an identity.
    ///
    /// Idempotent as a declared refresh: when an image already exists the
    /// build runs again in place, and the outcome says so — the user may be
    /// updating the sandbox's tool versions, and a silent no-op would hide
    /// that nothing changed.
    pub fn init(&self, identity: &ProjectIdentity, source: &BuildSource) -> Result<InitOutcome> {
        let (state, _) = self.observe(identity)?;
        debug!(project = %identity, %state, "init requested");

        let build_file = source.stage()?;
        self.client.build_image(
            identity.image_tag(),
            build_file.path(),
            identity.project_path(),
        )?;

        let outcome = if state == SessionState::Absent {
            InitOutcome::Built
        } else {
            InitOutcome::Rebuilt
        };
        info!(project = %identity, image = identity.image_tag(), ?outcome, "image build finished");
        Ok(outcome)
    }

    /// Enter a running session for an identity, in the foreground.
    ///
    /// - `Absent`: fails with [`Error::NotInitialized`]; `open` never builds
    ///   implicitly, keeping `init` and `open` separately auditable.
    /// - `Built`: creates the container from the resolved spec and starts it.
    /// - `Stopped`: restarts the existing container, provided the requested
    ///   settings match the ones it was created with.
    /// - `Running`: attaches to the existing session. This is the supported
    ///   behavior for a second `open` on the same project; a duplicate
    ///   container is never created.
    ///
    /// With `keep_alive` off, the container is removed once the foreground
    /// command exits (including via interrupt).
    pub fn open(&self, identity: &ProjectIdentity, spec: &SessionSpec) -> Result<SessionExit> {
        let (state, created_with) = self.observe(identity)?;
        debug!(project = %identity, %state, "open requested");

        match state {
            SessionState::Absent => {
                Err(Error::not_initialized(identity.to_string()))
            }
            SessionState::Built => {
                let runtime_spec = RuntimeSpec::build(identity, spec);
                // A concurrent open for the same identity loses here with a
                // name conflict from the runtime.
                self.with_retry("create container", || {
                    self.client.create_container(&runtime_spec)
                })?;
                info!(container = identity.container_name(), "container created");

                let exit_code = self.client.start_container(identity.container_name())?;
                self.finish(identity, spec.keep_alive, OpenMode::Created, exit_code)
            }
            SessionState::Stopped => {
                self.check_settings(
                    identity,
                    created_with.as_ref(),
                    Some(spec.network),
                    spec.command.as_deref(),
                )?;
                let exit_code = self.client.start_container(identity.container_name())?;
                self.finish(identity, spec.keep_alive, OpenMode::Restarted, exit_code)
            }
            SessionState::Running => {
                self.check_settings(
                    identity,
                    created_with.as_ref(),
                    Some(spec.network),
                    spec.command.as_deref(),
                )?;
                info!(container = identity.container_name(), "attaching to running session");
                let exit_code = self.client.attach(identity.container_name())?;
                self.finish(identity, spec.keep_alive, OpenMode::Attached, exit_code)
            }
        }
    }

    /// Re-enter an existing session, preserving state written inside it.
    ///
    /// Requires a container for the identity; fails with [`Error::NoSession`]
    /// otherwise (including after an out-of-band removal). Never rebuilds the
    /// image or recreates the container. The container keeps the settings it
    /// was created with; the resumed session always persists on exit.
    pub fn resume(&self, identity: &ProjectIdentity, request: &ResumeRequest) -> Result<SessionExit> {
        let (state, created_with) = self.observe(identity)?;
        debug!(project = %identity, %state, "resume requested");

        match state {
            SessionState::Absent | SessionState::Built => {
                Err(Error::no_session(identity.to_string()))
            }
            SessionState::Stopped => {
                self.check_settings(
                    identity,
                    created_with.as_ref(),
                    request.network,
                    request.command.as_deref(),
                )?;
                let exit_code = self.client.start_container(identity.container_name())?;
                Ok(SessionExit {
                    mode: OpenMode::Restarted,
                    exit_code,
                    removed: false,
                })
            }
            SessionState::Running => {
                self.check_settings(
                    identity,
                    created_with.as_ref(),
                    request.network,
                    request.command.as_deref(),
                )?;
                let exit_code = self.client.attach(identity.container_name())?;
                Ok(SessionExit {
                    mode: OpenMode::Attached,
                    exit_code,
                    removed: false,
                })
            }
        }
    }

    /// Tear down a session: stop a running container, remove it, remove the
    /// image.
    ///
    /// A running container is stopped first (graceful window, then the
    /// runtime kills it); removal then forces, so a reported success never
    /// leaves an orphaned running container. With `force`, the graceful stop
    /// is skipped.
    pub fn remove(&self, identity: &ProjectIdentity, force: bool) -> Result<RemoveOutcome> {
        let (state, _) = self.observe(identity)?;
        debug!(project = %identity, %state, "remove requested");

        if state == SessionState::Absent {
            return Ok(RemoveOutcome::NothingToRemove);
        }

        if state == SessionState::Running && !force {
            self.with_retry("stop container", || {
                self.client
                    .stop_container(identity.container_name(), self.stop_timeout)
            })?;
        }

        if state != SessionState::Built {
            // Force here covers the window between our stop and the
            // runtime's bookkeeping; the container has already been asked
            // to stop (or force was requested).
            self.with_retry("remove container", || {
                self.client.remove_container(identity.container_name(), true)
            })?;
            info!(container = identity.container_name(), "container removed");
        }

        match self.client.remove_image(identity.image_tag()) {
            Ok(()) => info!(image = identity.image_tag(), "image removed"),
            Err(Error::NotFound { .. }) => {
                debug!(image = identity.image_tag(), "no image to remove")
            }
            Err(e) => return Err(e),
        }

        Ok(RemoveOutcome::Removed)
    }

    /// Report the reconciled state for an identity. Read-only.
    pub fn status(&self, identity: &ProjectIdentity) -> Result<SessionState> {
        let (state, _) = self.observe(identity)?;
        Ok(state)
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Re-derive the authoritative state from the runtime.
    fn observe(
        &self,
        identity: &ProjectIdentity,
    ) -> Result<(SessionState, Option<ContainerConfig>)> {
        let observation = self.with_retry("inspect container", || {
            self.client.inspect(identity.container_name())
        })?;

        match observation.status {
            ContainerStatus::Running => Ok((SessionState::Running, observation.config)),
            ContainerStatus::Stopped => Ok((SessionState::Stopped, observation.config)),
            ContainerStatus::Absent => {
                let built = self.with_retry("inspect image", || {
                    self.client.image_exists(identity.image_tag())
                })?;
                let state = if built {
                    SessionState::Built
                } else {
                    SessionState::Absent
                };
                Ok((state, None))
            }
        }
    }

    /// Fail with [`Error::ConfigurationMismatch`] when requested settings
    /// differ from the ones the container was created with.
    ///
    /// The mount never needs checking: the container name is derived from the
    /// canonical project path, so one identity can only ever carry its own
    /// mount.
    fn check_settings(
        &self,
        identity: &ProjectIdentity,
        created_with: Option<&ContainerConfig>,
        requested_network: Option<NetworkMode>,
        requested_command: Option<&[String]>,
    ) -> Result<()> {
        let Some(created) = created_with else {
            // Runtime did not report the created-with config; nothing to
            // compare against.
            warn!(container = identity.container_name(), "no recorded settings to reconcile");
            return Ok(());
        };

        if let Some(network) = requested_network {
            if network != created.network {
                return Err(Error::configuration_mismatch(
                    identity.container_name(),
                    format!(
                        "network was {}, requested {}",
                        created.network.as_str(),
                        network.as_str()
                    ),
                ));
            }
        }

        if let Some(command) = requested_command {
            if command != created.command.as_slice() {
                return Err(Error::configuration_mismatch(
                    identity.container_name(),
                    format!(
                        "command was `{}`, requested `{}`",
                        created.command.join(" "),
                        command.join(" ")
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Apply the keep-alive policy after a foreground session ends.
    fn finish(
        &self,
        identity: &ProjectIdentity,
        keep_alive: bool,
        mode: OpenMode,
        exit_code: i32,
    ) -> Result<SessionExit> {
        if keep_alive {
            debug!(container = identity.container_name(), "session kept for resume");
            return Ok(SessionExit {
                mode,
                exit_code,
                removed: false,
            });
        }

        // The command has exited; force covers a container still winding
        // down after an interrupt. A concurrent attachment may have cleaned
        // up first, so an already-gone container is fine.
        match self.with_retry("remove container", || {
            self.client.remove_container(identity.container_name(), true)
        }) {
            Ok(()) => info!(container = identity.container_name(), "session container removed"),
            Err(Error::NotFound { .. }) => {
                debug!(container = identity.container_name(), "container already removed")
            }
            Err(e) => return Err(e),
        }

        Ok(SessionExit {
            mode,
            exit_code,
            removed: true,
        })
    }

    fn with_retry<T>(&self, name: &str, op: impl FnMut() -> Result<T>) -> Result<T> {
        retry_with_backoff(&self.retry, name, op, Error::is_transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Observation;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;
    use tempfile::TempDir;

    // ========================================================================
    // Fake runtime
    // ========================================================================

    #[derive(Debug, Default)]
    struct FakeState {
        image_built: bool,
        container: Option<FakeContainer>,
        calls: Vec<String>,
        /// Errors injected ahead of the next calls, oldest first.
        inject: VecDeque<Error>,
        /// Simulates a create race: inspect reports absent even though a
        /// container exists, so the next create hits the name conflict.
        hide_from_inspect: bool,
    }

    #[derive(Debug, Clone)]
    struct FakeContainer {
        running: bool,
        spec: RuntimeSpec,
    }

    /// In-memory runtime standing in for the daemon.
    #[derive(Debug, Default)]
    struct FakeRuntime {
        state: RefCell<FakeState>,
    }

    impl FakeRuntime {
        fn with_image() -> Self {
            let fake = Self::default();
            fake.state.borrow_mut().image_built = true;
            fake
        }

        fn record(&self, call: &str) -> Result<()> {
            let mut state = self.state.borrow_mut();
            state.calls.push(call.to_string());
            match state.inject.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.state.borrow().calls.clone()
        }

        fn inject(&self, err: Error) {
            self.state.borrow_mut().inject.push_back(err);
        }

        fn container_config(&self) -> Option<ContainerConfig> {
            self.state.borrow().container.as_ref().map(|c| ContainerConfig {
                network: c.spec.network,
                command: c.spec.command.clone(),
            })
        }
    }

    impl RuntimeClient for FakeRuntime {
        fn build_image(&self, _tag: &str, _build_file: &Path, _context: &Path) -> Result<()> {
            self.record("build_image")?;
            self.state.borrow_mut().image_built = true;
            Ok(())
        }

        fn image_exists(&self, _tag: &str) -> Result<bool> {
            self.record("image_exists")?;
            Ok(self.state.borrow().image_built)
        }

        fn remove_image(&self, tag: &str) -> Result<()> {
            self.record("remove_image")?;
            let mut state = self.state.borrow_mut();
            if state.image_built {
                state.image_built = false;
                Ok(())
            } else {
                Err(Error::image_not_found(tag))
            }
        }

        fn create_container(&self, spec: &RuntimeSpec) -> Result<()> {
            self.record("create_container")?;
            let mut state = self.state.borrow_mut();
            if state.container.is_some() {
                return Err(Error::already_running(&spec.container_name));
            }
            state.container = Some(FakeContainer {
                running: false,
                spec: spec.clone(),
            });
            Ok(())
        }

        fn start_container(&self, name: &str) -> Result<i32> {
            self.record("start_container")?;
            let mut state = self.state.borrow_mut();
            match state.container.as_mut() {
                Some(container) => {
                    // Foreground session: runs and exits immediately.
                    container.running = false;
                    Ok(0)
                }
                None => Err(Error::container_not_found(name)),
            }
        }

        fn attach(&self, name: &str) -> Result<i32> {
            self.record("attach")?;
            match self.state.borrow().container.as_ref() {
                Some(_) => Ok(0),
                None => Err(Error::container_not_found(name)),
            }
        }

        fn stop_container(&self, name: &str, _timeout: Duration) -> Result<()> {
            self.record("stop_container")?;
            let mut state = self.state.borrow_mut();
            match state.container.as_mut() {
                Some(container) => {
                    container.running = false;
                    Ok(())
                }
                None => Err(Error::container_not_found(name)),
            }
        }

        fn remove_container(&self, name: &str, force: bool) -> Result<()> {
            self.record("remove_container")?;
            let mut state = self.state.borrow_mut();
            match state.container.take() {
                Some(container) => {
                    if container.running && !force {
                        state.container = Some(container);
                        return Err(Error::command_failed(
                            "docker rm",
                            "container is running",
                        ));
                    }
                    Ok(())
                }
                None => Err(Error::container_not_found(name)),
            }
        }

        fn inspect(&self, _name: &str) -> Result<Observation> {
            self.record("inspect")?;
            let state = self.state.borrow();
            if state.hide_from_inspect {
                return Ok(Observation::absent());
            }
            match state.container.as_ref() {
                Some(container) => Ok(Observation {
                    status: if container.running {
                        ContainerStatus::Running
                    } else {
                        ContainerStatus::Stopped
                    },
                    config: Some(ContainerConfig {
                        network: container.spec.network,
                        command: container.spec.command.clone(),
                    }),
                }),
                None => Ok(Observation::absent()),
            }
        }
    }

    fn identity() -> ProjectIdentity {
        let dir = TempDir::new().unwrap().keep();
        ProjectIdentity::resolve(&dir).unwrap()
    }

    fn manager(fake: FakeRuntime) -> SessionManager<FakeRuntime> {
        SessionManager::new(fake)
    }

    /// Put a container into the fake (running or stopped) as `open` would.
    fn seed_container(mgr: &SessionManager<FakeRuntime>, id: &ProjectIdentity, spec: &SessionSpec, running: bool) {
        let runtime_spec = RuntimeSpec::build(id, spec);
        mgr.client.create_container(&runtime_spec).unwrap();
        mgr.client.state.borrow_mut().container.as_mut().unwrap().running = running;
        mgr.client.state.borrow_mut().calls.clear();
    }

    // ========================================================================
    // init
    // ========================================================================

    #[test]
    fn test_init_on_absent_builds() {
        let mgr = manager(FakeRuntime::default());
        let id = identity();

        let outcome = mgr.init(&id, &BuildSource::Default).unwrap();
        assert_eq!(outcome, InitOutcome::Built);
        assert!(mgr.client.calls().contains(&"build_image".to_string()));
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Built);
    }

    #[test]
    fn test_init_again_is_declared_rebuild_not_noop() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();

        let outcome = mgr.init(&id, &BuildSource::Default).unwrap();
        assert_eq!(outcome, InitOutcome::Rebuilt);
        // The build really ran again.
        assert!(mgr.client.calls().contains(&"build_image".to_string()));
    }

    // ========================================================================
    // open
    // ========================================================================

    #[test]
    fn test_open_on_absent_fails_and_never_creates() {
        let mgr = manager(FakeRuntime::default());
        let id = identity();

        let err = mgr.open(&id, &SessionSpec::default()).unwrap_err();
        assert!(matches!(err, Error::NotInitialized { .. }));
        assert!(
            !mgr.client.calls().contains(&"create_container".to_string()),
            "open on absent must not create a container"
        );
    }

    #[test]
    fn test_open_on_built_creates_and_starts() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();

        let exit = mgr.open(&id, &SessionSpec::default()).unwrap();
        assert_eq!(exit.mode, OpenMode::Created);
        assert_eq!(exit.exit_code, 0);

        let calls = mgr.client.calls();
        let create_pos = calls.iter().position(|c| c == "create_container").unwrap();
        let start_pos = calls.iter().position(|c| c == "start_container").unwrap();
        assert!(create_pos < start_pos);
    }

    #[test]
    fn test_open_without_keep_alive_removes_container_on_exit() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();

        let exit = mgr.open(&id, &SessionSpec::default()).unwrap();
        assert!(exit.removed);
        assert!(mgr.client.state.borrow().container.is_none());

        // The session is gone: resume has nothing to find.
        let err = mgr.resume(&id, &ResumeRequest::default()).unwrap_err();
        assert!(matches!(err, Error::NoSession { .. }));
    }

    #[test]
    fn test_open_with_keep_alive_leaves_container() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        let spec = SessionSpec {
            keep_alive: true,
            ..Default::default()
        };

        let exit = mgr.open(&id, &spec).unwrap();
        assert!(!exit.removed);
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Stopped);
    }

    #[test]
    fn test_open_no_network_creates_isolated_container() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        let spec = SessionSpec {
            network: NetworkMode::None,
            keep_alive: true,
            ..Default::default()
        };

        mgr.open(&id, &spec).unwrap();
        let created = mgr.client.container_config().unwrap();
        assert_eq!(created.network, NetworkMode::None);
    }

    #[test]
    fn test_open_on_running_attaches_never_duplicates() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        let spec = SessionSpec {
            keep_alive: true,
            ..Default::default()
        };
        seed_container(&mgr, &id, &spec, true);

        let exit = mgr.open(&id, &spec).unwrap();
        assert_eq!(exit.mode, OpenMode::Attached);

        let calls = mgr.client.calls();
        assert!(calls.contains(&"attach".to_string()));
        assert!(
            !calls.contains(&"create_container".to_string()),
            "second open must not create a conflicting container"
        );
    }

    #[test]
    fn test_open_on_stopped_restarts_existing_container() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        let spec = SessionSpec {
            keep_alive: true,
            ..Default::default()
        };
        seed_container(&mgr, &id, &spec, false);

        let exit = mgr.open(&id, &spec).unwrap();
        assert_eq!(exit.mode, OpenMode::Restarted);
        assert!(!mgr.client.calls().contains(&"create_container".to_string()));
    }

    #[test]
    fn test_open_on_stopped_with_different_network_is_mismatch() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        let created = SessionSpec {
            network: NetworkMode::None,
            keep_alive: true,
            ..Default::default()
        };
        seed_container(&mgr, &id, &created, false);

        let requested = SessionSpec {
            network: NetworkMode::Bridge,
            keep_alive: true,
            ..Default::default()
        };
        let err = mgr.open(&id, &requested).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMismatch { .. }));
        assert!(err.to_string().contains("network"));
    }

    #[test]
    fn test_concurrent_create_conflict_surfaces_cleanly() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();

        // Another invocation won the race: a container already holds the
        // name, but our observe happened before it appeared.
        seed_container(
            &mgr,
            &id,
            &SessionSpec {
                keep_alive: true,
                ..Default::default()
            },
            false,
        );
        mgr.client.state.borrow_mut().hide_from_inspect = true;

        let err = mgr.open(&id, &SessionSpec::default()).unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning { .. }));
        // Exactly one container exists; the losing open created nothing.
        assert!(mgr.client.state.borrow().container.is_some());
    }

    // ========================================================================
    // resume
    // ========================================================================

    #[test]
    fn test_resume_on_stopped_restarts_without_rebuild_or_recreate() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        seed_container(
            &mgr,
            &id,
            &SessionSpec {
                keep_alive: true,
                ..Default::default()
            },
            false,
        );

        let exit = mgr.resume(&id, &ResumeRequest::default()).unwrap();
        assert_eq!(exit.mode, OpenMode::Restarted);
        assert!(!exit.removed, "resumed session persists on exit");

        let calls = mgr.client.calls();
        assert!(calls.contains(&"start_container".to_string()));
        assert!(!calls.contains(&"build_image".to_string()));
        assert!(!calls.contains(&"create_container".to_string()));
    }

    #[test]
    fn test_resume_without_container_is_no_session() {
        // Image built, but no container: resume steers to open.
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();

        let err = mgr.resume(&id, &ResumeRequest::default()).unwrap_err();
        assert!(matches!(err, Error::NoSession { .. }));
        assert!(err.to_string().contains("open"));
    }

    #[test]
    fn test_resume_after_out_of_band_removal_is_no_session() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        seed_container(
            &mgr,
            &id,
            &SessionSpec {
                keep_alive: true,
                ..Default::default()
            },
            false,
        );

        // Manual `docker rm` between invocations.
        mgr.client.state.borrow_mut().container = None;

        let err = mgr.resume(&id, &ResumeRequest::default()).unwrap_err();
        assert!(matches!(err, Error::NoSession { .. }));
    }

    #[test]
    fn test_resume_with_incompatible_network_is_mismatch() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        seed_container(
            &mgr,
            &id,
            &SessionSpec {
                network: NetworkMode::Bridge,
                keep_alive: true,
                ..Default::default()
            },
            false,
        );

        let request = ResumeRequest {
            network: Some(NetworkMode::None),
            command: None,
        };
        let err = mgr.resume(&id, &request).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMismatch { .. }));
        // The container was left untouched.
        assert!(!mgr.client.calls().contains(&"start_container".to_string()));
    }

    #[test]
    fn test_resume_with_matching_settings_succeeds() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        let created = SessionSpec {
            network: NetworkMode::None,
            command: Some(vec!["bash".to_string()]),
            keep_alive: true,
        };
        seed_container(&mgr, &id, &created, false);

        let request = ResumeRequest {
            network: Some(NetworkMode::None),
            command: Some(vec!["bash".to_string()]),
        };
        let exit = mgr.resume(&id, &request).unwrap();
        assert_eq!(exit.mode, OpenMode::Restarted);
    }

    #[test]
    fn test_resume_on_running_attaches() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        seed_container(
            &mgr,
            &id,
            &SessionSpec {
                keep_alive: true,
                ..Default::default()
            },
            true,
        );

        let exit = mgr.resume(&id, &ResumeRequest::default()).unwrap();
        assert_eq!(exit.mode, OpenMode::Attached);
    }

    // ========================================================================
    // remove
    // ========================================================================

    #[test]
    fn test_remove_on_running_stops_before_removing() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        seed_container(
            &mgr,
            &id,
            &SessionSpec {
                keep_alive: true,
                ..Default::default()
            },
            true,
        );

        let outcome = mgr.remove(&id, false).unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed);

        let calls = mgr.client.calls();
        let stop_pos = calls.iter().position(|c| c == "stop_container").unwrap();
        let rm_pos = calls.iter().position(|c| c == "remove_container").unwrap();
        assert!(stop_pos < rm_pos, "graceful stop must precede removal");

        // No lingering container or image.
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Absent);
    }

    #[test]
    fn test_remove_force_skips_graceful_stop() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();
        seed_container(
            &mgr,
            &id,
            &SessionSpec {
                keep_alive: true,
                ..Default::default()
            },
            true,
        );

        mgr.remove(&id, true).unwrap();
        let calls = mgr.client.calls();
        assert!(!calls.contains(&"stop_container".to_string()));
        assert!(calls.contains(&"remove_container".to_string()));
    }

    #[test]
    fn test_remove_on_built_removes_only_image() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();

        let outcome = mgr.remove(&id, false).unwrap();
        assert_eq!(outcome, RemoveOutcome::Removed);
        assert!(!mgr.client.calls().contains(&"remove_container".to_string()));
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Absent);
    }

    #[test]
    fn test_remove_on_absent_reports_nothing_to_remove() {
        let mgr = manager(FakeRuntime::default());
        let id = identity();

        let outcome = mgr.remove(&id, false).unwrap();
        assert_eq!(outcome, RemoveOutcome::NothingToRemove);
    }

    // ========================================================================
    // Reconciliation & retry
    // ========================================================================

    #[test]
    fn test_status_reflects_runtime_state() {
        let mgr = manager(FakeRuntime::default());
        let id = identity();
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Absent);

        mgr.client.state.borrow_mut().image_built = true;
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Built);

        seed_container(
            &mgr,
            &id,
            &SessionSpec {
                keep_alive: true,
                ..Default::default()
            },
            true,
        );
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Running);

        mgr.client.state.borrow_mut().container.as_mut().unwrap().running = false;
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Stopped);
    }

    #[test]
    fn test_transient_daemon_outage_is_retried() {
        let mgr = manager(FakeRuntime::with_image());
        let id = identity();

        // First inspect hits a daemon still starting up; the retry succeeds.
        mgr.client.inject(Error::runtime_unavailable("daemon starting"));
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Built);
    }

    #[test]
    fn test_semantic_errors_are_not_retried() {
        let mgr = manager(FakeRuntime::default());
        let id = identity();

        mgr.client
            .inject(Error::command_failed("docker inspect", "boom"));
        let err = mgr.status(&id).unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
        // One inspect call only: no retry for non-transient errors.
        let inspects = mgr
            .client
            .calls()
            .iter()
            .filter(|c| *c == "inspect")
            .count();
        assert_eq!(inspects, 1);
    }

    // ========================================================================
    // End-to-end scenario
    // ========================================================================

    #[test]
    fn test_fresh_project_lifecycle_scenario() {
        let mgr = manager(FakeRuntime::default());
        let id = identity();

        // Never seen before: init builds.
        assert_eq!(mgr.init(&id, &BuildSource::Default).unwrap(), InitOutcome::Built);
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Built);

        // open with network disabled: container created isolated, runs, and
        // (keep_alive = false) is removed after the foreground exits.
        let spec = SessionSpec {
            network: NetworkMode::None,
            ..Default::default()
        };
        let exit = mgr.open(&id, &spec).unwrap();
        assert_eq!(exit.mode, OpenMode::Created);
        assert!(exit.removed);
        assert_eq!(mgr.status(&id).unwrap(), SessionState::Built);

        // Nothing left to resume.
        let err = mgr.resume(&id, &ResumeRequest::default()).unwrap_err();
        assert!(matches!(err, Error::NoSession { .. }));
    }
}
