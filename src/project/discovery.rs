//! Enumerate project descriptors under the known roots.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::debug;

use super::{is_project_file_name, ProjectFile, ProjectKey, WorkspaceRoot};

/// Find project files directly inside each root and inside each additional
/// search path.
///
/// Relative additional paths are resolved against every root in turn;
/// absolute ones are attributed to the first root that contains them.
/// Duplicate paths are reported once (first occurrence wins). Directories
/// that cannot be read are skipped.
pub fn discover_project_files(
    roots: &[WorkspaceRoot],
    additional_paths: &[PathBuf],
) -> Result<Vec<ProjectFile>> {
    if roots.is_empty() {
        bail!("Open a workspace folder before searching for project files");
    }

    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for root in roots {
        search_directory(root, &root.path, &mut found, &mut seen);

        for additional in additional_paths {
            let (context, search_path) = if additional.is_absolute() {
                let owner = roots
                    .iter()
                    .find(|r| r.path == *additional || r.contains(additional))
                    .unwrap_or(root);
                (owner, additional.clone())
            } else {
                (root, root.path.join(additional))
            };
            search_directory(context, &search_path, &mut found, &mut seen);
        }
    }

    debug!(count = found.len(), "Discovered project files");
    Ok(found)
}

fn search_directory(
    root: &WorkspaceRoot,
    dir: &Path,
    found: &mut Vec<ProjectFile>,
    seen: &mut HashSet<ProjectKey>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), "Could not search directory: {e}");
            return;
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| is_project_file_name(name))
        .collect();
    names.sort();

    for name in names {
        let file = ProjectFile::new(dir.join(&name), root.name.clone());
        if seen.insert(file.key()) {
            found.push(file);
        }
    }
}
