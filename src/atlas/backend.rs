use anyhow::Result;
use tokio::sync::mpsc;
use tracing::debug;

use crate::project::{ProjectFile, ProjectKey};
use crate::session::SessionId;

/// Delivered once when a launched process exits on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitNotice {
    pub key: ProjectKey,
    pub session_id: SessionId,
    /// Exit code, or `None` when the process was killed by a signal or its
    /// host went away.
    pub code: Option<i32>,
}

/// One-shot handle a launcher uses to report that its process exited.
///
/// Consuming `report` makes a second report for the same session impossible.
#[derive(Debug)]
pub struct ExitReporter {
    key: ProjectKey,
    session_id: SessionId,
    tx: mpsc::UnboundedSender<ExitNotice>,
}

impl ExitReporter {
    pub(crate) fn new(
        key: ProjectKey,
        session_id: SessionId,
        tx: mpsc::UnboundedSender<ExitNotice>,
    ) -> Self {
        Self {
            key,
            session_id,
            tx,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn report(self, code: Option<i32>) {
        let notice = ExitNotice {
            key: self.key,
            session_id: self.session_id,
            code,
        };
        if self.tx.send(notice).is_err() {
            debug!(session_id = %self.session_id, "Exit reported after registry was dropped");
        }
    }
}

/// Capability to stop one launched process. Must tolerate being called after
/// the process already exited.
pub trait StopHandle: Send {
    fn stop(&mut self) -> Result<()>;
}

/// A process the launcher has started.
pub struct LaunchedProcess {
    pub pid: Option<u32>,
    pub stopper: Box<dyn StopHandle>,
}

/// Trait every process-control implementation provides. The session registry
/// interacts with running processes only through this trait.
///
/// A successful `launch` must eventually call [`ExitReporter::report`]
/// exactly once, unless the process was stopped through its [`StopHandle`]
/// first, in which case it must not report at all.
pub trait ProcessLauncher {
    fn launch(&self, project: &ProjectFile, exits: ExitReporter) -> Result<LaunchedProcess>;
}
