//! Table of running serve sessions, at most one per project.
//!
//! All mutation goes through `&mut self`, so the owner serializes start,
//! stop and exit reconciliation. Exit notices arrive on a channel and are
//! applied with [`SessionRegistry::wait_exit`] or
//! [`SessionRegistry::drain_exits`]. Presence in the table decides whether a
//! stop or an exit still has work to do; whichever comes second is a no-op.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ChangeKind, NoticeState, RegistryChange, Session, SessionError, SessionId, SessionState};
use crate::atlas::{ExitNotice, ExitReporter, ProcessLauncher};
use crate::project::{ProjectFile, ProjectKey};

type Observer = Box<dyn FnMut(&RegistryChange) + Send>;

pub struct SessionRegistry {
    sessions: BTreeMap<ProjectKey, Session>,
    exit_tx: mpsc::UnboundedSender<ExitNotice>,
    exit_rx: mpsc::UnboundedReceiver<ExitNotice>,
    observer: Option<Observer>,
    notices: NoticeState,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            sessions: BTreeMap::new(),
            exit_tx,
            exit_rx,
            observer: None,
            notices: NoticeState::default(),
        }
    }

    /// Register the callback fired synchronously after every table change.
    /// Replaces any previous observer.
    pub fn set_observer(&mut self, observer: impl FnMut(&RegistryChange) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Start a session for `project`.
    ///
    /// Fails with [`SessionError::AlreadyRunning`] if the project already has
    /// one, and with [`SessionError::LaunchFailed`] if the launcher rejects
    /// it; in both cases the table is unchanged.
    pub fn start<L>(
        &mut self,
        project: &ProjectFile,
        launcher: &L,
    ) -> Result<&Session, SessionError>
    where
        L: ProcessLauncher + ?Sized,
    {
        let key = project.key();
        if self.sessions.contains_key(&key) {
            return Err(SessionError::AlreadyRunning {
                path: project.path.clone(),
            });
        }

        let session_id = SessionId::default();
        let reporter = ExitReporter::new(key.clone(), session_id, self.exit_tx.clone());
        let launched = launcher.launch(project, reporter).map_err(|e| {
            warn!(path = %project.path.display(), "Launch failed: {e:#}");
            SessionError::LaunchFailed {
                path: project.path.clone(),
                reason: SessionError::reason_of(&e),
            }
        })?;

        info!(
            path = %project.path.display(),
            session_id = %session_id,
            pid = ?launched.pid,
            "Session started"
        );
        let session = Session::new(session_id, project.clone(), launched.pid, launched.stopper);
        self.sessions.insert(key.clone(), session);
        self.notify(ChangeKind::Started, project.path.clone(), session_id);

        Ok(&self.sessions[&key])
    }

    /// Stop the session for `key`, if any. Returns whether one was running.
    ///
    /// The entry is removed even when the stop handle fails; the failure is
    /// still returned as [`SessionError::StopFailed`].
    pub fn stop(&mut self, key: &ProjectKey) -> Result<bool, SessionError> {
        let Some(mut session) = self.sessions.remove(key) else {
            debug!(key = %key, "Stop requested for idle project");
            return Ok(false);
        };

        let result = session.stop();
        info!(path = %session.path().display(), session_id = %session.id, "Session stopped");
        self.notify(ChangeKind::Stopped, session.project.path.clone(), session.id);

        result.map(|()| true).map_err(|e| SessionError::StopFailed {
            path: session.project.path.clone(),
            reason: SessionError::reason_of(&e),
        })
    }

    /// Stop every session. Individual failures are logged and returned but
    /// never interrupt the sweep.
    pub fn stop_all(&mut self) -> Vec<SessionError> {
        let keys: Vec<ProjectKey> = self.sessions.keys().cloned().collect();
        let mut failures = Vec::new();
        for key in keys {
            if let Err(e) = self.stop(&key) {
                warn!("{e}");
                failures.push(e);
            }
        }
        failures
    }

    /// Stop every session, then start `project`. Stop failures are logged
    /// as in [`SessionRegistry::stop_all`] and do not block the start.
    pub fn switch_to<L>(
        &mut self,
        project: &ProjectFile,
        launcher: &L,
    ) -> Result<&Session, SessionError>
    where
        L: ProcessLauncher + ?Sized,
    {
        let failures = self.stop_all();
        if !failures.is_empty() {
            warn!(failed = failures.len(), "Some sessions failed to stop before switching");
        }
        self.start(project, launcher)
    }

    /// Apply an exit notice. Returns true if it removed a session; notices
    /// for sessions already gone (stopped, or replaced by a newer session)
    /// are ignored.
    pub fn reconcile_exit(&mut self, notice: &ExitNotice) -> bool {
        let current = self
            .sessions
            .get(&notice.key)
            .is_some_and(|s| s.id == notice.session_id);
        if !current {
            debug!(key = %notice.key, session_id = %notice.session_id, "Ignoring stale exit notice");
            return false;
        }

        let Some(session) = self.sessions.remove(&notice.key) else {
            return false;
        };
        info!(
            path = %session.path().display(),
            session_id = %session.id,
            code = ?notice.code,
            "Session exited"
        );
        self.notify(
            ChangeKind::Exited { code: notice.code },
            session.project.path.clone(),
            session.id,
        );
        true
    }

    /// Wait until a tracked session exits on its own, apply it, and return
    /// its notice. Stale notices are consumed along the way.
    ///
    /// Returns `None` right away when no sessions are tracked. The registry
    /// holds a sender itself, so the channel never closes while it lives.
    pub async fn wait_exit(&mut self) -> Option<ExitNotice> {
        while !self.sessions.is_empty() {
            let notice = self.exit_rx.recv().await?;
            if self.reconcile_exit(&notice) {
                return Some(notice);
            }
        }
        None
    }

    /// Apply every exit notice already delivered. Returns how many sessions
    /// were removed.
    pub fn drain_exits(&mut self) -> usize {
        let mut removed = 0;
        while let Ok(notice) = self.exit_rx.try_recv() {
            if self.reconcile_exit(&notice) {
                removed += 1;
            }
        }
        removed
    }

    pub fn get(&self, key: &ProjectKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn state(&self, key: &ProjectKey) -> SessionState {
        self.sessions
            .get(key)
            .map_or(SessionState::Idle, Session::state)
    }

    pub fn is_running(&self, key: &ProjectKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn notices_mut(&mut self) -> &mut NoticeState {
        &mut self.notices
    }

    fn notify(&mut self, kind: ChangeKind, path: PathBuf, session_id: SessionId) {
        let running = self.sessions.len();
        if let Some(observer) = self.observer.as_mut() {
            observer(&RegistryChange {
                kind,
                path,
                session_id,
                running,
            });
        }
    }
}
