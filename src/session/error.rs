use std::path::PathBuf;

/// Failures surfaced by the session registry.
///
/// Stopping a project that has no session is not an error; `stop` reports it
/// as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{} is already being served", path.display())]
    AlreadyRunning { path: PathBuf },

    #[error("Failed to start serving {}: {reason}", path.display())]
    LaunchFailed { path: PathBuf, reason: String },

    #[error("Failed to stop serving {}: {reason}", path.display())]
    StopFailed { path: PathBuf, reason: String },
}

impl SessionError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::AlreadyRunning { path }
            | Self::LaunchFailed { path, .. }
            | Self::StopFailed { path, .. } => path,
        }
    }

    /// Render a collaborator error with its full context chain.
    pub(crate) fn reason_of(err: &anyhow::Error) -> String {
        format!("{err:#}")
    }
}
