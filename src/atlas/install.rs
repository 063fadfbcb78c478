use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::project::{ProjectFile, ProjectKey};

/// How the serve binary on PATH was installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallType {
    Rokit,
    Global,
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rokit => write!(f, "Rokit"),
            Self::Global => write!(f, "global"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Install {
    pub version: String,
    pub install_type: InstallType,
    pub resolved_path: PathBuf,
}

impl Install {
    pub fn summary(&self) -> String {
        match self.install_type {
            InstallType::Global => format!("v{} is globally installed.", self.version),
            InstallType::Rokit => format!("v{} is managed by {}.", self.version, self.install_type),
        }
    }

    /// One-time suggestion to switch to a toolchain manager, for installs
    /// that are not managed by one.
    pub fn toolchain_notice(&self) -> Option<String> {
        match self.install_type {
            InstallType::Rokit => None,
            InstallType::Global => Some(format!(
                "{} Consider using Rokit to manage project-specific toolchains instead of {}.",
                self.summary(),
                self.resolved_path.display()
            )),
        }
    }
}

pub fn install_type_for(resolved_path: &Path) -> InstallType {
    if resolved_path.to_string_lossy().contains(".rokit") {
        InstallType::Rokit
    } else {
        InstallType::Global
    }
}

/// Version from `<program> --version` output such as `atlas 7.4.1`.
pub fn parse_version(stdout: &str) -> Option<String> {
    stdout.split_whitespace().nth(1).map(str::to_string)
}

/// Locate `program` on PATH and ask it for its version, running in `cwd` so
/// project-pinned toolchains resolve.
///
/// Returns `Ok(None)` when the program is not installed, or when a toolchain
/// manager shim reports that no version is pinned for this directory.
pub async fn detect_install(program: &str, cwd: &Path) -> Result<Option<Install>> {
    let resolved_path = match which::which(program) {
        Ok(path) => path,
        Err(e) => {
            debug!(program, "Not found on PATH: {e}");
            return Ok(None);
        }
    };

    let output = Command::new(program)
        .arg("--version")
        .current_dir(cwd)
        .output()
        .await
        .with_context(|| format!("Failed to run '{program} --version'"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("rokit") {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(anyhow!(
            "'{program} --version' at {} failed: {message}",
            resolved_path.display()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_version(&stdout).map(|version| Install {
        version,
        install_type: install_type_for(&resolved_path),
        resolved_path,
    }))
}

/// Install detected from each project's directory.
///
/// Toolchain managers pin versions per directory, so two projects can see
/// different versions, or one can see none at all.
#[derive(Debug, Clone, Default)]
pub struct InstallSurvey {
    program: String,
    results: Vec<(ProjectKey, Option<Install>)>,
    error: Option<String>,
}

impl InstallSurvey {
    pub fn new(program: impl Into<String>, results: Vec<(ProjectKey, Option<Install>)>) -> Self {
        Self {
            program: program.into(),
            results,
            error: None,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn install(&self, key: &ProjectKey) -> Option<&Install> {
        self.lookup(key).and_then(Option::as_ref)
    }

    /// False only when the project was checked and nothing was found.
    pub fn is_detected(&self, key: &ProjectKey) -> bool {
        self.lookup(key).map_or(true, Option::is_some)
    }

    pub fn installs(&self) -> impl Iterator<Item = &Install> {
        self.results.iter().filter_map(|(_, install)| install.as_ref())
    }

    pub fn versions(&self) -> BTreeSet<&str> {
        self.installs().map(|i| i.version.as_str()).collect()
    }

    /// Install type of the first project with an install.
    pub fn install_type(&self) -> Option<InstallType> {
        self.installs().next().map(|i| i.install_type)
    }

    pub fn is_mixed(&self) -> bool {
        let mut types = self.installs().map(|i| i.install_type);
        match types.next() {
            Some(first) => types.any(|t| t != first),
            None => false,
        }
    }

    /// Last lookup failure, if any project's check errored.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn detail(&self) -> String {
        let program = &self.program;
        match self.install_type() {
            None => format!("{program} is not installed."),
            Some(_) if self.is_mixed() => {
                format!("{program} install method differs by project file.")
            }
            Some(InstallType::Global) => format!("{program} is globally installed."),
            Some(InstallType::Rokit) => format!("{program} is managed by Rokit."),
        }
    }

    fn lookup(&self, key: &ProjectKey) -> Option<&Option<Install>> {
        self.results
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, install)| install)
    }
}

/// Look up `program` from each project's directory, once per directory.
///
/// A failing lookup counts as not detected for that project and is kept as
/// the survey's error.
pub async fn survey_installs(program: &str, projects: &[ProjectFile]) -> InstallSurvey {
    let mut survey = InstallSurvey::new(program, Vec::new());
    let mut by_dir: HashMap<PathBuf, Option<Install>> = HashMap::new();

    for project in projects {
        let Some(dir) = project.path.parent() else {
            continue;
        };
        let install = match by_dir.get(dir) {
            Some(cached) => cached.clone(),
            None => {
                let found = match detect_install(program, dir).await {
                    Ok(install) => install,
                    Err(e) => {
                        warn!(dir = %dir.display(), "{e:#}");
                        survey.error = Some(format!("{e:#}"));
                        None
                    }
                };
                by_dir.insert(dir.to_path_buf(), found.clone());
                found
            }
        };
        survey.results.push((project.key(), install));
    }
    survey
}
