use std::io::ErrorKind;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::{ExitReporter, LaunchedProcess, ProcessLauncher, StopHandle};
use crate::project::ProjectFile;

/// Program and leading arguments used to serve a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ServeCommand {
    fn default() -> Self {
        Self {
            program: "atlas".to_string(),
            args: vec!["serve".to_string()],
        }
    }
}

/// Build the argument list for serving `project`: the configured leading
/// arguments followed by the project file name. The process runs in the
/// project file's directory, so the bare name is enough.
pub fn build_serve_args(command: &ServeCommand, project: &ProjectFile) -> Vec<String> {
    let mut args = command.args.clone();
    args.push(project.name.clone());
    args
}

/// Launches the serve command as a child process it owns directly.
///
/// Output lines are logged and, when echo is on, printed to stdout prefixed
/// with the project file name.
///
/// Launching spawns tasks for output and exit, so it must happen inside a
/// tokio runtime; outside one the launch fails.
pub struct CliLauncher {
    command: ServeCommand,
    echo: bool,
}

impl CliLauncher {
    pub fn new(command: ServeCommand) -> Self {
        Self {
            command,
            echo: false,
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl ProcessLauncher for CliLauncher {
    fn launch(&self, project: &ProjectFile, exits: ExitReporter) -> Result<LaunchedProcess> {
        let runtime = Handle::try_current()
            .context("Serve processes can only be launched inside a tokio runtime")?;
        let cwd = project
            .path
            .parent()
            .context("Project file has no parent directory")?;
        if !cwd.is_dir() {
            bail!("Project directory {} does not exist", cwd.display());
        }

        let mut cmd = Command::new(&self.command.program);
        cmd.args(build_serve_args(&self.command, project))
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                bail!(
                    "Could not find '{}' on PATH. Is it installed?",
                    self.command.program
                );
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to start '{}'", self.command.program)
                })
            }
        };

        let pid = child.id();
        let label = project.name.clone();
        if let Some(stdout) = child.stdout.take() {
            runtime.spawn(forward_output(stdout, label.clone(), self.echo));
        }
        if let Some(stderr) = child.stderr.take() {
            runtime.spawn(forward_output(stderr, label.clone(), self.echo));
        }

        let token = CancellationToken::new();
        runtime.spawn(wait_for_exit(child, token.clone(), exits, label));
        debug!(path = %project.path.display(), ?pid, "Spawned serve process");

        Ok(LaunchedProcess {
            pid,
            stopper: Box::new(CancelStop { token }),
        })
    }
}

/// Stops a child by cancelling the token its wait task selects on.
struct CancelStop {
    token: CancellationToken,
}

impl StopHandle for CancelStop {
    fn stop(&mut self) -> Result<()> {
        self.token.cancel();
        Ok(())
    }
}

async fn forward_output<R>(stream: R, label: String, echo: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(target: "atlas_serve::output", project = %label, "{line}");
                if echo {
                    println!("[{label}] {line}");
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(project = %label, "Output stream error: {e}");
                break;
            }
        }
    }
}

async fn wait_for_exit(
    mut child: Child,
    token: CancellationToken,
    exits: ExitReporter,
    label: String,
) {
    let exited = tokio::select! {
        biased;
        () = token.cancelled() => None,
        status = child.wait() => Some(status),
    };

    match exited {
        // Stopped explicitly: the registry already dropped the session, so no report.
        None => {
            if let Err(e) = child.kill().await {
                warn!(project = %label, "Failed to kill serve process: {e}");
            }
            debug!(project = %label, "Serve process stopped");
        }
        Some(Ok(status)) => {
            info!(project = %label, code = ?status.code(), "Process exited");
            exits.report(status.code());
        }
        Some(Err(e)) => {
            warn!(project = %label, "Error waiting for serve process: {e}");
            exits.report(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_serves_with_atlas() {
        let command = ServeCommand::default();
        assert_eq!(command.program, "atlas");
        assert_eq!(command.args, vec!["serve"]);
    }

    #[test]
    fn serve_args_end_with_file_name() {
        let project = ProjectFile::new("/work/game/default.project.json5", "game");
        let args = build_serve_args(&ServeCommand::default(), &project);
        assert_eq!(args, vec!["serve", "default.project.json5"]);
    }

    #[test]
    fn serve_args_keep_configured_prefix() {
        let command = ServeCommand {
            program: "rojo".to_string(),
            args: vec!["serve".to_string(), "--port".to_string(), "34873".to_string()],
        };
        let project = ProjectFile::new("/work/game/place.project.json", "game");
        assert_eq!(
            build_serve_args(&command, &project),
            vec!["serve", "--port", "34873", "place.project.json"]
        );
    }

    #[test]
    fn cancel_stop_is_idempotent() {
        let token = CancellationToken::new();
        let mut stop = CancelStop {
            token: token.clone(),
        };
        stop.stop().unwrap();
        stop.stop().unwrap();
        assert!(token.is_cancelled());
    }
}
