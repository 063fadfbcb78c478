//! One-shot `atlas` subcommands run against a project file.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::info;

use crate::project::ProjectFile;
use crate::session::SessionRegistry;

/// Output file written by [`ToolAction::Sourcemap`], relative to the project.
pub const SOURCEMAP_FILE: &str = "sourcemap.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    /// Pull the current Studio place back into the project's files.
    Syncback,
    Sourcemap,
    /// Open the project in Roblox Studio.
    Studio,
}

impl ToolAction {
    fn subcommand(self) -> &'static str {
        match self {
            Self::Syncback => "syncback",
            Self::Sourcemap => "sourcemap",
            Self::Studio => "studio",
        }
    }
}

impl fmt::Display for ToolAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subcommand())
    }
}

/// Arguments for running `action` on `project`, after any leading arguments.
pub fn tool_args(action: ToolAction, project: &ProjectFile) -> Vec<String> {
    let mut args = vec![action.subcommand().to_string(), project.name.clone()];
    if action == ToolAction::Sourcemap {
        args.extend(["--output".to_string(), SOURCEMAP_FILE.to_string()]);
    }
    args
}

/// Runs `atlas` subcommands other than `serve`.
#[derive(Debug, Clone)]
pub struct AtlasTool {
    program: String,
    leading_args: Vec<String>,
}

impl AtlasTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the subcommand, e.g. a wrapper script's own flags.
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    /// Run `action` in the project's directory and return a message for the user.
    ///
    /// Sourcemap output is captured and any stderr counts as failure; the
    /// other actions share the terminal and fail on a nonzero exit.
    pub async fn run(&self, action: ToolAction, project: &ProjectFile) -> Result<String> {
        let cwd = project
            .path
            .parent()
            .context("Project file has no parent directory")?;
        let args = tool_args(action, project);

        match action {
            ToolAction::Sourcemap => {
                let output = self
                    .command(&args, cwd)
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(|e| self.spawn_error(e))?;
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !output.status.success() || !stderr.trim().is_empty() {
                    bail!("{} sourcemap failed: {}", self.program, stderr.trim());
                }
                let stdout = String::from_utf8_lossy(&output.stdout);
                if stdout.trim().is_empty() {
                    Ok(format!("Sourcemap generated at {SOURCEMAP_FILE}"))
                } else {
                    Ok(stdout.trim().to_string())
                }
            }
            ToolAction::Syncback | ToolAction::Studio => {
                let status = self.run_attached(&args, cwd).await?;
                Ok(format!("{} {action} finished ({status})", self.program))
            }
        }
    }

    /// Create a new project in `dir` with `<program> init`.
    pub async fn init(&self, dir: &Path) -> Result<String> {
        if !dir.is_dir() {
            bail!("{} is not a directory", dir.display());
        }
        let status = self.run_attached(&["init".to_string()], dir).await?;
        Ok(format!("Created a project in {} ({status})", dir.display()))
    }

    async fn run_attached(&self, args: &[String], cwd: &Path) -> Result<ExitStatus> {
        let status = self
            .command(args, cwd)
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !status.success() {
            bail!("'{} {}' exited with {status}", self.program, args.join(" "));
        }
        Ok(status)
    }

    fn command(&self, args: &[String], cwd: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args).args(args).current_dir(cwd);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> anyhow::Error {
        if e.kind() == ErrorKind::NotFound {
            anyhow::anyhow!("Could not find '{}' on PATH. Is it installed?", self.program)
        } else {
            anyhow::Error::new(e).context(format!("Failed to run '{}'", self.program))
        }
    }
}

/// Stop every serve session, then syncback `project`. A running serve
/// would overwrite the files syncback writes.
pub async fn syncback(
    registry: &mut SessionRegistry,
    tool: &AtlasTool,
    project: &ProjectFile,
) -> Result<String> {
    let stopped = registry.len();
    let failures = registry.stop_all();
    info!(stopped, failed = failures.len(), "Stopped sessions before syncback");
    tool.run(ToolAction::Syncback, project).await
}
