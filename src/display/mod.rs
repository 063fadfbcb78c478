//! Display names for project files.
//!
//! [`resolve_display_names`] turns a set of discovered project files into
//! short, legible labels. Under [`DisplayPolicy::AsNeeded`] and
//! [`DisplayPolicy::Always`] labels that would collide are widened until they
//! are distinct; truncation is applied last.

pub mod truncate;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::project::{locate, Location, ProjectFile, ProjectKey, WorkspaceRoot};

pub use truncate::truncate_display_name;

/// Names longer than this are truncated unless configured otherwise.
pub const DEFAULT_MAX_DISPLAY_LENGTH: usize = 70;

/// Three-state display setting.
///
/// Drives how much of a project's path its label shows, and separately
/// whether a menu entry carries a full-path detail line.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayPolicy {
    /// Bare file name only. Labels may collide.
    Never,
    /// Bare file name unless it collides or the project is external.
    #[default]
    AsNeeded,
    /// Always the workspace-relative (or `parent/file` external) path.
    Always,
}

impl fmt::Display for DisplayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "never"),
            Self::AsNeeded => write!(f, "as-needed"),
            Self::Always => write!(f, "always"),
        }
    }
}

/// Resolved label for one project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDisplayInfo {
    /// Final label, possibly truncated.
    pub display_name: String,
    pub was_truncated: bool,
    /// Label before truncation, for tooltips and detail lines.
    pub original_name: String,
}

/// Labels keyed by project identity. Every resolved input has an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayNames(BTreeMap<ProjectKey, ProjectDisplayInfo>);

impl DisplayNames {
    pub fn get(&self, key: &ProjectKey) -> Option<&ProjectDisplayInfo> {
        self.0.get(key)
    }

    pub fn for_file(&self, file: &ProjectFile) -> Option<&ProjectDisplayInfo> {
        self.0.get(&file.key())
    }

    /// Resolved label for `file`, or its bare name if it was not resolved.
    pub fn label(&self, file: &ProjectFile) -> String {
        self.for_file(file)
            .map(|info| info.display_name.clone())
            .unwrap_or_else(|| file.name.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProjectKey, &ProjectDisplayInfo)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolve a label for every project file under `policy`, then truncate each
/// to `max_length` characters.
///
/// Files sharing a path are treated as one project; the first occurrence
/// wins. The result depends only on the arguments.
pub fn resolve_display_names(
    files: &[ProjectFile],
    roots: &[WorkspaceRoot],
    policy: DisplayPolicy,
    max_length: usize,
) -> DisplayNames {
    let candidates = unique_candidates(files, roots);
    let rendered = render(&candidates, policy);

    let names = candidates
        .iter()
        .zip(rendered)
        .map(|(candidate, name)| {
            (
                candidate.file.key(),
                truncate_display_name(&name, max_length),
            )
        })
        .collect();
    DisplayNames(names)
}

/// Smallest number of trailing segments, starting at two, that tells every
/// path in the group apart. `None` if even the full paths coincide.
pub fn disambiguation_depth(paths: &[&[String]]) -> Option<usize> {
    let max_depth = paths.iter().map(|p| p.len()).max()?;
    (2..=max_depth).find(|&depth| {
        let mut seen = HashSet::new();
        paths.iter().all(|p| seen.insert(suffix(p, depth)))
    })
}

struct Candidate<'a> {
    file: &'a ProjectFile,
    location: Location,
    segments: Vec<String>,
}

impl Candidate<'_> {
    /// Workspace-relative path, or `parent/file` for external projects.
    fn path_form(&self) -> String {
        match &self.location {
            Location::Workspace { relative, .. } => relative.clone(),
            Location::External => suffix(&self.segments, 2),
        }
    }

    fn qualified_form(&self) -> Option<String> {
        match &self.location {
            Location::Workspace {
                root_name,
                relative,
            } => Some(format!("{root_name}/{relative}")),
            Location::External => None,
        }
    }
}

fn unique_candidates<'a>(files: &'a [ProjectFile], roots: &[WorkspaceRoot]) -> Vec<Candidate<'a>> {
    let mut seen = HashSet::new();
    files
        .iter()
        .filter(|file| seen.insert(file.key()))
        .map(|file| Candidate {
            file,
            location: locate(file, roots),
            segments: file.segments(),
        })
        .collect()
}

fn render(candidates: &[Candidate<'_>], policy: DisplayPolicy) -> Vec<String> {
    match policy {
        DisplayPolicy::Never => candidates.iter().map(|c| c.file.name.clone()).collect(),
        DisplayPolicy::Always => {
            let mut rendered: Vec<String> = candidates.iter().map(Candidate::path_form).collect();
            disambiguate(candidates, &mut rendered);
            rendered
        }
        DisplayPolicy::AsNeeded => {
            let names: Vec<String> = candidates.iter().map(|c| c.file.name.clone()).collect();
            let colliding: HashSet<usize> = colliding_indices(&names).into_iter().collect();
            let mut rendered: Vec<String> = candidates
                .iter()
                .enumerate()
                .map(|(idx, c)| {
                    if c.location.is_external() || colliding.contains(&idx) {
                        c.path_form()
                    } else {
                        c.file.name.clone()
                    }
                })
                .collect();
            disambiguate(candidates, &mut rendered);
            rendered
        }
    }
}

/// Escalate colliding labels until all are distinct: external groups widen
/// their shared suffix, workspace entries gain their root name, and anything
/// still colliding falls back to its full path.
fn disambiguate(candidates: &[Candidate<'_>], rendered: &mut [String]) {
    widen_external_collisions(candidates, rendered);

    for idx in colliding_indices(rendered) {
        if let Some(qualified) = candidates[idx].qualified_form() {
            rendered[idx] = qualified;
        }
    }

    for idx in colliding_indices(rendered) {
        rendered[idx] = candidates[idx].file.normalized_path();
    }
}

fn widen_external_collisions(candidates: &[Candidate<'_>], rendered: &mut [String]) {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        if candidate.location.is_external() {
            groups
                .entry(suffix(&candidate.segments, 2))
                .or_default()
                .push(idx);
        }
    }

    for members in groups.values().filter(|members| members.len() > 1) {
        let paths: Vec<&[String]> = members
            .iter()
            .map(|&idx| candidates[idx].segments.as_slice())
            .collect();
        let depth = disambiguation_depth(&paths);
        for &idx in members {
            let segments = &candidates[idx].segments;
            rendered[idx] = match depth {
                Some(depth) => suffix(segments, depth),
                None => segments.join("/"),
            };
        }
    }
}

fn colliding_indices(names: &[String]) -> Vec<usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *counts.entry(name.as_str()).or_default() += 1;
    }
    names
        .iter()
        .enumerate()
        .filter(|(_, name)| counts[name.as_str()] > 1)
        .map(|(idx, _)| idx)
        .collect()
}

fn suffix(segments: &[String], depth: usize) -> String {
    segments[segments.len().saturating_sub(depth)..].join("/")
}
