//! Menu entries for running and idle projects.
//!
//! Running projects come first so they can be stopped, then every discovered
//! project that is idle. Labels are resolved over the union of both sets, so
//! a running project that has since left the discovery set still gets a
//! distinct name.

pub mod console;

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::atlas::InstallSurvey;
use crate::display::{resolve_display_names, DisplayNames, DisplayPolicy, ProjectDisplayInfo};
use crate::project::{
    is_external, normalize_separators, workspace_label, ProjectFile, ProjectKey, WorkspaceRoot,
};
use crate::session::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuAction {
    Start,
    Stop,
}

impl MenuAction {
    pub fn icon(self) -> &'static str {
        match self {
            Self::Start => "▶",
            Self::Stop => "■",
        }
    }
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub label: String,
    /// Workspace folder name, or `external`.
    pub description: String,
    /// Detail parts joined with ` • `.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// `None` when the serve tool was not detected for this project.
    pub action: Option<MenuAction>,
    /// Tool version detected from the project's directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Project file path with `/` separators.
    pub path: String,
    #[serde(skip)]
    pub key: ProjectKey,
}

impl fmt::Display for MenuEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = self.action.map_or("⚠", MenuAction::icon);
        write!(f, "{icon} {}  ({})", self.label, self.description)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n    {detail}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuSettings {
    pub display: DisplayPolicy,
    pub full_path: DisplayPolicy,
    pub max_length: usize,
}

/// Build the menu for `projects` given what `registry` is currently running.
///
/// Idle projects whose directory has no detected install get no action and
/// say so in their detail; when projects see different versions, each idle
/// entry shows its own.
pub fn build_menu(
    projects: &[ProjectFile],
    registry: &SessionRegistry,
    roots: &[WorkspaceRoot],
    settings: &MenuSettings,
    installs: &InstallSurvey,
) -> Vec<MenuEntry> {
    let running: Vec<&ProjectFile> = registry.sessions().map(|s| &s.project).collect();
    let names = menu_names(projects, &running, roots, settings);
    let show_versions = installs.versions().len() > 1;

    let stop_entries = running.iter().map(|project| {
        let mut entry = entry(project, &names, roots);
        entry.action = Some(MenuAction::Stop);
        entry.detail = join_detail(full_path_detail(
            project,
            names.for_file(project),
            roots,
            settings.full_path,
        ));
        entry
    });
    let start_entries = projects
        .iter()
        .filter(|project| !registry.is_running(&project.key()))
        .map(|project| {
            let mut entry = entry(project, &names, roots);
            let key = project.key();
            let mut parts = Vec::new();
            if !installs.is_detected(&key) {
                parts.push(format!(
                    "{} not detected in {}",
                    installs.program(),
                    entry.description
                ));
            } else {
                entry.action = Some(MenuAction::Start);
                entry.version = installs.install(&key).map(|i| i.version.clone());
                if show_versions {
                    parts.extend(entry.version.as_ref().map(|v| format!("v{v}")));
                }
            }
            parts.extend(full_path_detail(
                project,
                names.for_file(project),
                roots,
                settings.full_path,
            ));
            entry.detail = join_detail(parts);
            entry
        });

    let mut seen = std::collections::HashSet::new();
    stop_entries
        .chain(start_entries)
        .filter(|e| seen.insert(e.key.clone()))
        .collect()
}

/// Labels for discovered and running projects together.
pub fn menu_names(
    projects: &[ProjectFile],
    running: &[&ProjectFile],
    roots: &[WorkspaceRoot],
    settings: &MenuSettings,
) -> DisplayNames {
    let all: Vec<ProjectFile> = projects
        .iter()
        .chain(running.iter().copied())
        .cloned()
        .collect();
    resolve_display_names(&all, roots, settings.display, settings.max_length)
}

/// Detail line showing where a project lives, per the full-path setting.
///
/// Under `AsNeeded` external projects show their absolute path and workspace
/// projects show their untruncated label, only when it was truncated.
pub fn full_path_detail(
    project: &ProjectFile,
    info: Option<&ProjectDisplayInfo>,
    roots: &[WorkspaceRoot],
    policy: DisplayPolicy,
) -> Option<String> {
    let truncated = info.is_some_and(|i| i.was_truncated);
    let shown = match policy {
        DisplayPolicy::Never => None,
        DisplayPolicy::Always => Some(project.normalized_path()),
        DisplayPolicy::AsNeeded if is_external(project, roots) => Some(project.normalized_path()),
        DisplayPolicy::AsNeeded => info
            .filter(|_| truncated)
            .map(|i| i.original_name.clone()),
    };
    shown.map(|path| format!("Full path: {path}"))
}

/// Find the project a user selector refers to: a display label or its
/// untruncated form, then an exact path, then a file name shared by no
/// other project.
pub fn find_project<'a>(
    selector: &str,
    projects: &'a [ProjectFile],
    names: &DisplayNames,
) -> Option<&'a ProjectFile> {
    let by_label = projects.iter().find(|p| {
        names
            .for_file(p)
            .is_some_and(|i| i.display_name == selector || i.original_name == selector)
    });
    if by_label.is_some() {
        return by_label;
    }

    let key = ProjectKey::from_path(Path::new(selector));
    if let Some(project) = projects.iter().find(|p| p.key() == key) {
        return Some(project);
    }

    let mut by_name = projects.iter().filter(|p| p.name == selector);
    match (by_name.next(), by_name.next()) {
        (Some(project), None) => Some(project),
        _ => None,
    }
}

/// Entry with label and description filled in; no action or detail yet.
fn entry(
    project: &ProjectFile,
    names: &DisplayNames,
    roots: &[WorkspaceRoot],
) -> MenuEntry {
    MenuEntry {
        label: names.label(project),
        description: workspace_label(project, roots),
        detail: None,
        action: None,
        version: None,
        path: normalize_separators(&project.path),
        key: project.key(),
    }
}

fn join_detail(parts: impl IntoIterator<Item = String>) -> Option<String> {
    let parts: Vec<String> = parts.into_iter().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" • "))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::atlas::{
        ExitReporter, Install, InstallType, LaunchedProcess, ProcessLauncher, StopHandle,
    };

    struct Noop;

    impl StopHandle for Noop {
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl ProcessLauncher for Noop {
        fn launch(&self, _: &ProjectFile, _: ExitReporter) -> Result<LaunchedProcess> {
            Ok(LaunchedProcess {
                pid: None,
                stopper: Box::new(Noop),
            })
        }
    }

    fn roots() -> Vec<WorkspaceRoot> {
        vec![WorkspaceRoot::new("game", "/work/game")]
    }

    fn settings() -> MenuSettings {
        MenuSettings {
            display: DisplayPolicy::AsNeeded,
            full_path: DisplayPolicy::AsNeeded,
            max_length: 70,
        }
    }

    #[test]
    fn idle_projects_offer_start() {
        let projects = vec![
            ProjectFile::new("/work/game/default.project.json5", "game"),
            ProjectFile::new("/work/game/place.project.json", "game"),
        ];
        let registry = SessionRegistry::new();

        let menu = build_menu(&projects, &registry, &roots(), &settings(), &InstallSurvey::default());

        assert_eq!(menu.len(), 2);
        assert!(menu.iter().all(|e| e.action == Some(MenuAction::Start)));
        assert_eq!(menu[0].label, "default.project.json5");
        assert_eq!(menu[0].description, "game");
        assert_eq!(menu[0].detail, None);
    }

    #[test]
    fn running_projects_come_first_with_stop() {
        let projects = vec![
            ProjectFile::new("/work/game/default.project.json5", "game"),
            ProjectFile::new("/work/game/place.project.json", "game"),
        ];
        let mut registry = SessionRegistry::new();
        registry.start(&projects[1], &Noop).unwrap();

        let menu = build_menu(&projects, &registry, &roots(), &settings(), &InstallSurvey::default());

        assert_eq!(menu.len(), 2);
        assert_eq!(menu[0].action, Some(MenuAction::Stop));
        assert_eq!(menu[0].label, "place.project.json");
        assert_eq!(menu[1].action, Some(MenuAction::Start));
    }

    #[test]
    fn running_project_outside_discovery_still_listed_and_disambiguated() {
        let projects = vec![ProjectFile::new("/work/game/default.project.json5", "game")];
        let gone = ProjectFile::new("/work/game/old/default.project.json5", "game");
        let mut registry = SessionRegistry::new();
        registry.start(&gone, &Noop).unwrap();

        let menu = build_menu(&projects, &registry, &roots(), &settings(), &InstallSurvey::default());

        assert_eq!(menu.len(), 2);
        assert_eq!(menu[0].label, "old/default.project.json5");
        assert_eq!(menu[0].action, Some(MenuAction::Stop));
        assert_eq!(menu[1].label, "default.project.json5");
    }

    #[test]
    fn external_projects_get_full_path_detail() {
        let projects = vec![ProjectFile::new("/elsewhere/lib/lib.project.json", "game")];
        let menu = build_menu(&projects, &SessionRegistry::new(), &roots(), &settings(), &InstallSurvey::default());

        assert_eq!(menu[0].description, "external");
        assert_eq!(menu[0].label, "lib/lib.project.json");
        assert_eq!(
            menu[0].detail.as_deref(),
            Some("Full path: /elsewhere/lib/lib.project.json")
        );
    }

    #[test]
    fn truncated_workspace_label_shows_original_name() {
        let project = ProjectFile::new("/work/game/very/long/nested/path/to/project.json5", "game");
        let info = ProjectDisplayInfo {
            display_name: "...to/project.json5".to_string(),
            was_truncated: true,
            original_name: "very/long/nested/path/to/project.json5".to_string(),
        };

        let detail = full_path_detail(&project, Some(&info), &roots(), DisplayPolicy::AsNeeded);
        assert_eq!(
            detail.as_deref(),
            Some("Full path: very/long/nested/path/to/project.json5")
        );
        assert_eq!(
            full_path_detail(&project, Some(&info), &roots(), DisplayPolicy::Never),
            None
        );
        assert_eq!(
            full_path_detail(&project, Some(&info), &roots(), DisplayPolicy::Always).as_deref(),
            Some("Full path: /work/game/very/long/nested/path/to/project.json5")
        );
    }

    #[test]
    fn untruncated_workspace_project_has_no_detail_as_needed() {
        let project = ProjectFile::new("/work/game/default.project.json5", "game");
        let info = ProjectDisplayInfo {
            display_name: "default.project.json5".to_string(),
            was_truncated: false,
            original_name: "default.project.json5".to_string(),
        };
        assert_eq!(
            full_path_detail(&project, Some(&info), &roots(), DisplayPolicy::AsNeeded),
            None
        );
    }

    #[test]
    fn find_project_by_label_path_and_unique_name() {
        let projects = vec![
            ProjectFile::new("/work/game/a/default.project.json5", "game"),
            ProjectFile::new("/work/game/b/default.project.json5", "game"),
            ProjectFile::new("/work/game/place.project.json", "game"),
        ];
        let names = menu_names(&projects, &[], &roots(), &settings());

        assert_eq!(
            find_project("a/default.project.json5", &projects, &names),
            Some(&projects[0])
        );
        assert_eq!(
            find_project("/work/game/b/default.project.json5", &projects, &names),
            Some(&projects[1])
        );
        assert_eq!(
            find_project("place.project.json", &projects, &names),
            Some(&projects[2])
        );
        // Shared by two projects and not a label on its own.
        assert_eq!(find_project("default.project.json5", &projects, &names), None);
        assert_eq!(find_project("missing.project.json", &projects, &names), None);
    }

    #[test]
    fn entries_serialize_without_key() {
        let projects = vec![ProjectFile::new("/work/game/default.project.json5", "game")];
        let menu = build_menu(&projects, &SessionRegistry::new(), &roots(), &settings(), &InstallSurvey::default());
        let json = serde_json::to_value(&menu[0]).unwrap();

        assert_eq!(json["label"], "default.project.json5");
        assert_eq!(json["action"], "start");
        assert_eq!(json["path"], "/work/game/default.project.json5");
        assert!(json.get("key").is_none());
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn entry_display_includes_detail_line() {
        let entry = MenuEntry {
            label: "lib/lib.project.json".to_string(),
            description: "external".to_string(),
            detail: Some("Full path: /elsewhere/lib/lib.project.json".to_string()),
            action: Some(MenuAction::Start),
            version: None,
            path: "/elsewhere/lib/lib.project.json".to_string(),
            key: ProjectKey::from_path(Path::new("/elsewhere/lib/lib.project.json")),
        };
        assert_eq!(
            entry.to_string(),
            "▶ lib/lib.project.json  (external)\n    Full path: /elsewhere/lib/lib.project.json"
        );
    }

    fn rokit(version: &str) -> Option<Install> {
        Some(Install {
            version: version.to_string(),
            install_type: InstallType::Rokit,
            resolved_path: "/home/u/.rokit/bin/atlas".into(),
        })
    }

    #[test]
    fn undetected_project_has_no_action_and_says_where() {
        let projects = vec![
            ProjectFile::new("/work/game/default.project.json5", "game"),
            ProjectFile::new("/work/game/tools/tools.project.json", "game"),
        ];
        let installs = InstallSurvey::new(
            "atlas",
            vec![(projects[0].key(), rokit("7.4.1")), (projects[1].key(), None)],
        );

        let menu = build_menu(&projects, &SessionRegistry::new(), &roots(), &settings(), &installs);

        assert_eq!(menu[0].action, Some(MenuAction::Start));
        assert_eq!(menu[0].version.as_deref(), Some("7.4.1"));
        assert_eq!(menu[0].detail, None);
        assert_eq!(menu[1].action, None);
        assert_eq!(menu[1].version, None);
        assert_eq!(menu[1].detail.as_deref(), Some("atlas not detected in game"));
        assert!(menu[1].to_string().starts_with("⚠ tools.project.json  (game)"));
    }

    #[test]
    fn mixed_versions_are_shown_before_full_path() {
        let projects = vec![
            ProjectFile::new("/work/game/default.project.json5", "game"),
            ProjectFile::new("/elsewhere/lib/lib.project.json", "game"),
        ];
        let installs = InstallSurvey::new(
            "atlas",
            vec![(projects[0].key(), rokit("7.4.1")), (projects[1].key(), rokit("7.3.0"))],
        );

        let menu = build_menu(&projects, &SessionRegistry::new(), &roots(), &settings(), &installs);

        assert_eq!(menu[0].detail.as_deref(), Some("v7.4.1"));
        assert_eq!(
            menu[1].detail.as_deref(),
            Some("v7.3.0 • Full path: /elsewhere/lib/lib.project.json")
        );
        let json = serde_json::to_value(&menu[1]).unwrap();
        assert_eq!(json["version"], "7.3.0");
    }

    #[test]
    fn single_version_is_not_repeated_per_entry() {
        let projects = vec![ProjectFile::new("/work/game/default.project.json5", "game")];
        let installs = InstallSurvey::new("atlas", vec![(projects[0].key(), rokit("7.4.1"))]);

        let menu = build_menu(&projects, &SessionRegistry::new(), &roots(), &settings(), &installs);

        assert_eq!(menu[0].detail, None);
        assert_eq!(menu[0].version.as_deref(), Some("7.4.1"));
    }

    #[test]
    fn running_entries_keep_only_full_path_detail() {
        let projects = vec![ProjectFile::new("/elsewhere/lib/lib.project.json", "game")];
        let installs = InstallSurvey::new("atlas", vec![(projects[0].key(), None)]);
        let mut registry = SessionRegistry::new();
        registry.start(&projects[0], &Noop).unwrap();

        let menu = build_menu(&projects, &registry, &roots(), &settings(), &installs);

        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].action, Some(MenuAction::Stop));
        assert_eq!(
            menu[0].detail.as_deref(),
            Some("Full path: /elsewhere/lib/lib.project.json")
        );
    }
}
