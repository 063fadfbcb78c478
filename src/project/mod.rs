pub mod discovery;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

pub use discovery::discover_project_files;

/// Suffixes that mark a file as an Atlas project descriptor.
pub const PROJECT_FILE_SUFFIXES: [&str; 2] = [".project.json5", ".project.json"];

/// Whether path comparisons ignore case on this platform.
const CASE_INSENSITIVE_PATHS: bool = cfg!(any(windows, target_os = "macos"));

/// Canonical identity of a project file: forward-slash separators, and
/// lowercased on platforms whose filesystems compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProjectKey(String);

impl ProjectKey {
    pub fn from_path(path: &Path) -> Self {
        let normalized = normalize_separators(&normalize_lexically(path));
        if CASE_INSENSITIVE_PATHS {
            Self(normalized.to_lowercase())
        } else {
            Self(normalized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One discovered project descriptor. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    /// File name, e.g. `default.project.json5`.
    pub name: String,
    /// Name of the workspace folder the file was discovered under.
    pub workspace_folder_name: String,
    /// Absolute, lexically normalized location.
    pub path: PathBuf,
}

impl ProjectFile {
    pub fn new(path: impl AsRef<Path>, workspace_folder_name: impl Into<String>) -> Self {
        let path = normalize_lexically(path.as_ref());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            workspace_folder_name: workspace_folder_name.into(),
            path,
        }
    }

    pub fn key(&self) -> ProjectKey {
        ProjectKey::from_path(&self.path)
    }

    /// Path with forward-slash separators, for display.
    pub fn normalized_path(&self) -> String {
        normalize_separators(&self.path)
    }

    /// Non-empty path segments of [`Self::normalized_path`].
    pub fn segments(&self) -> Vec<String> {
        self.normalized_path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// A known root directory (an open workspace folder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    pub name: String,
    pub path: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            path: normalize_lexically(path.as_ref()),
        }
    }

    /// Root named after its final directory component.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = normalize_lexically(path.as_ref());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| normalize_separators(&path));
        Self { name, path }
    }

    /// Forward-slash path of `path` relative to this root, or `None` when
    /// `path` is not a strict descendant.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let root = path_segments(&self.path);
        let target = path_segments(path);
        if target.len() <= root.len() {
            return None;
        }
        let inside = root
            .iter()
            .zip(&target)
            .all(|(a, b)| same_segment(a, b));
        inside.then(|| target[root.len()..].join("/"))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.relative_path(path).is_some()
    }
}

/// Where a project file lives relative to the known roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Under a known root; `relative` excludes the root's own name.
    Workspace { root_name: String, relative: String },
    /// Outside every known root.
    External,
}

impl Location {
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External)
    }
}

/// Classify `file` against `roots`; the first containing root wins.
pub fn locate(file: &ProjectFile, roots: &[WorkspaceRoot]) -> Location {
    roots
        .iter()
        .find_map(|root| {
            root.relative_path(&file.path)
                .map(|relative| Location::Workspace {
                    root_name: root.name.clone(),
                    relative,
                })
        })
        .unwrap_or(Location::External)
}

pub fn is_external(file: &ProjectFile, roots: &[WorkspaceRoot]) -> bool {
    locate(file, roots).is_external()
}

/// `"external"` for projects outside every root, else the workspace folder name.
pub fn workspace_label(file: &ProjectFile, roots: &[WorkspaceRoot]) -> String {
    if is_external(file, roots) {
        "external".to_string()
    } else {
        file.workspace_folder_name.clone()
    }
}

pub fn is_project_file_name(name: &str) -> bool {
    PROJECT_FILE_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

pub fn normalize_separators(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn path_segments(path: &Path) -> Vec<String> {
    normalize_separators(&normalize_lexically(path))
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn same_segment(a: &str, b: &str) -> bool {
    if CASE_INSENSITIVE_PATHS {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}
