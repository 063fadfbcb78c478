pub mod error;
pub mod notices;
pub mod registry;

use std::fmt;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::atlas::StopHandle;
use crate::project::{ProjectFile, ProjectKey};

pub use error::SessionError;
pub use notices::{Notice, NoticeState};
pub use registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl Default for SessionId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a project currently has a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running {
        session_id: SessionId,
        pid: Option<u32>,
    },
}

impl SessionState {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Idle => "○",
            Self::Running { .. } => "●",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running { .. } => write!(f, "Running"),
        }
    }
}

/// One active serve process for a project.
pub struct Session {
    pub id: SessionId,
    /// The project as it was when the session started.
    pub project: ProjectFile,
    pub pid: Option<u32>,
    stopper: Box<dyn StopHandle>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        project: ProjectFile,
        pid: Option<u32>,
        stopper: Box<dyn StopHandle>,
    ) -> Self {
        Self {
            id,
            project,
            pid,
            stopper,
        }
    }

    pub fn key(&self) -> ProjectKey {
        self.project.key()
    }

    pub fn path(&self) -> &Path {
        &self.project.path
    }

    pub fn state(&self) -> SessionState {
        SessionState::Running {
            session_id: self.id,
            pid: self.pid,
        }
    }

    pub(crate) fn stop(&mut self) -> anyhow::Result<()> {
        self.stopper.stop()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("path", &self.project.path)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// What happened to the session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Started,
    Stopped,
    Exited { code: Option<i32> },
}

/// Passed to the registry observer after every table mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub session_id: SessionId,
    /// Sessions in the table after the change.
    pub running: usize,
}
