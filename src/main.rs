use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use atlas_serve::atlas::{
    survey_installs, syncback, AtlasTool, CliLauncher, ExitNotice, InstallSurvey, ToolAction,
};
use atlas_serve::config::{load_config, Config};
use atlas_serve::display::DisplayPolicy;
use atlas_serve::menu::console::{parse_command, ConsoleCommand, CONSOLE_HELP};
use atlas_serve::menu::{build_menu, find_project, menu_names, MenuEntry, MenuSettings};
use atlas_serve::paths;
use atlas_serve::project::{
    discover_project_files, is_project_file_name, workspace_label, ProjectFile, WorkspaceRoot,
};
use atlas_serve::session::{ChangeKind, Notice, SessionRegistry};

#[derive(Debug, Parser)]
#[command(name = "atlas-serve", version = env!("ATLAS_SERVE_VERSION"), about)]
struct Cli {
    /// Workspace folder to search for project files (repeatable; default: current directory)
    #[arg(long = "root", value_name = "DIR", global = true)]
    roots: Vec<PathBuf>,

    /// How much of each project's path to show
    #[arg(long, value_enum, global = true)]
    display: Option<DisplayPolicy>,

    /// When to add a full-path detail line
    #[arg(long, value_enum, global = true)]
    full_path: Option<DisplayPolicy>,

    /// Truncate labels longer than this many characters
    #[arg(long, value_name = "N", global = true)]
    max_length: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List discovered projects
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve one or more projects until they exit or Ctrl-C
    Serve {
        /// Project label, file name, or path
        #[arg(required_unless_present = "interactive")]
        projects: Vec<String>,

        /// Don't echo serve output to stdout
        #[arg(long, short)]
        quiet: bool,

        /// Read start/stop/switch commands from stdin while serving
        #[arg(long, short)]
        interactive: bool,
    },
    /// Write a project's Studio place back into its files
    Syncback(ProjectArg),
    /// Generate sourcemap.json next to a project file
    Sourcemap(ProjectArg),
    /// Open a project in Studio
    Studio(ProjectArg),
    /// Create a new project in a folder with no project files
    Init {
        /// Folder to create the project in (default: first root)
        dir: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct ProjectArg {
    /// Project label, file name, or path
    project: String,
}

/// Settings resolved from the config file and command-line flags.
struct Context {
    config: Config,
    roots: Vec<WorkspaceRoot>,
    settings: MenuSettings,
}

impl Context {
    fn resolve(cli: &Cli) -> Result<Self> {
        let config = load_config();
        let root_paths = if cli.roots.is_empty() {
            vec![std::env::current_dir().context("Failed to read current directory")?]
        } else {
            cli.roots.clone()
        };
        let roots = root_paths
            .iter()
            .map(|p| {
                std::path::absolute(p)
                    .map(WorkspaceRoot::from_path)
                    .with_context(|| format!("Invalid root {}", p.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        let settings = MenuSettings {
            display: cli.display.unwrap_or(config.project_path_display),
            full_path: cli.full_path.unwrap_or(config.show_full_path),
            max_length: cli.max_length.unwrap_or(config.max_display_length),
        };
        Ok(Self {
            config,
            roots,
            settings,
        })
    }

    fn discover(&self) -> Result<Vec<ProjectFile>> {
        discover_project_files(&self.roots, &self.config.additional_project_paths)
    }

    fn tool(&self) -> AtlasTool {
        AtlasTool::new(self.config.command.clone())
    }

    /// Resolve a selector against `projects`, then against files on disk.
    fn select(&self, selector: &str, projects: &[ProjectFile]) -> Result<ProjectFile> {
        let names = menu_names(projects, &[], &self.roots, &self.settings);
        match find_project(selector, projects, &names) {
            Some(project) => Ok(project.clone()),
            None => project_from_path(selector, &self.roots)
                .with_context(|| format!("No project matches '{selector}'")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging();

    let ctx = Context::resolve(&cli)?;
    match &cli.command {
        Command::List { json } => list(&ctx, *json).await,
        Command::Serve {
            projects,
            quiet,
            interactive,
        } => serve(&ctx, projects, *quiet, *interactive).await,
        Command::Syncback(arg) => run_tool(&ctx, ToolAction::Syncback, &arg.project).await,
        Command::Sourcemap(arg) => run_tool(&ctx, ToolAction::Sourcemap, &arg.project).await,
        Command::Studio(arg) => run_tool(&ctx, ToolAction::Studio, &arg.project).await,
        Command::Init { dir } => init(&ctx, dir.as_deref()).await,
    }
}

/// Log to stderr and to a daily file under the log directory. The returned
/// guard flushes the file writer when dropped.
fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let log_dir = paths::log_directory().filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "atlas-serve.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

async fn list(ctx: &Context, json: bool) -> Result<()> {
    let projects = ctx.discover()?;
    let mut registry = SessionRegistry::new();
    let installs = survey_installs(&ctx.config.command, &projects).await;
    let menu = build_menu(&projects, &registry, &ctx.roots, &ctx.settings, &installs);

    if json {
        let output = serde_json::json!({
            "install": installs.detail(),
            "versions": installs.versions(),
            "projects": menu,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    show_toolchain_notice(&mut registry, &installs);
    print_menu(&menu, &installs);
    Ok(())
}

fn print_menu(menu: &[MenuEntry], installs: &InstallSurvey) {
    println!("{}", installs.detail());
    if menu.is_empty() {
        println!("This workspace contains no project files. Run 'atlas-serve init' to create one.");
    }
    for entry in menu {
        println!("{entry}");
    }
}

/// Suggest a toolchain manager once per registry, for the first unmanaged
/// install found.
fn show_toolchain_notice(registry: &mut SessionRegistry, installs: &InstallSurvey) {
    let Some(notice) = installs.installs().find_map(|i| i.toolchain_notice()) else {
        return;
    };
    if registry.notices_mut().should_show(Notice::ToolchainManager) {
        println!("{notice}");
    }
}

async fn run_tool(ctx: &Context, action: ToolAction, selector: &str) -> Result<()> {
    let projects = ctx.discover()?;
    let project = ctx.select(selector, &projects)?;
    let message = ctx.tool().run(action, &project).await?;
    println!("{message}");
    Ok(())
}

async fn init(ctx: &Context, dir: Option<&Path>) -> Result<()> {
    let dir = match dir {
        Some(dir) => std::path::absolute(dir)
            .with_context(|| format!("Invalid directory {}", dir.display()))?,
        None => ctx
            .roots
            .first()
            .map(|root| root.path.clone())
            .context("No workspace folder to create a project in")?,
    };
    let existing = discover_project_files(&[WorkspaceRoot::from_path(&dir)], &[])?;
    if !existing.is_empty() {
        bail!(
            "{} already contains {} project file(s)",
            dir.display(),
            existing.len()
        );
    }
    let message = ctx.tool().init(&dir).await?;
    println!("{message}");
    Ok(())
}

/// Failures counted over a serve run, turned into the exit status.
#[derive(Debug, Default, PartialEq, Eq)]
struct ServeOutcome {
    failed_starts: usize,
    failed_exits: usize,
    failed_stops: usize,
}

impl ServeOutcome {
    fn record_exit(&mut self, notice: &ExitNotice) {
        if notice.code != Some(0) {
            self.failed_exits += 1;
        }
    }

    fn into_result(self) -> Result<()> {
        if self == Self::default() {
            return Ok(());
        }
        let mut problems = Vec::new();
        if self.failed_starts > 0 {
            problems.push(format!("{} failed to start", self.failed_starts));
        }
        if self.failed_exits > 0 {
            problems.push(format!("{} exited with an error", self.failed_exits));
        }
        if self.failed_stops > 0 {
            problems.push(format!("{} failed to stop", self.failed_stops));
        }
        bail!("Serve sessions: {}", problems.join(", "))
    }
}

/// What a serve run can start, stop, and run tools on.
struct Console<'a> {
    ctx: &'a Context,
    projects: Vec<ProjectFile>,
    installs: InstallSurvey,
    launcher: CliLauncher,
    tool: AtlasTool,
}

enum Flow {
    Continue,
    Quit,
}

impl Console<'_> {
    /// Selector lookup over discovered projects plus anything running.
    fn find(&self, registry: &SessionRegistry, selector: &str) -> Result<ProjectFile> {
        let mut known = self.projects.clone();
        for session in registry.sessions() {
            if !known.iter().any(|p| p.key() == session.project.key()) {
                known.push(session.project.clone());
            }
        }
        self.ctx.select(selector, &known)
    }

    fn ensure_detected(&self, project: &ProjectFile) -> Result<()> {
        if !self.installs.is_detected(&project.key()) {
            bail!(
                "{} not detected in {}",
                self.installs.program(),
                workspace_label(project, &self.ctx.roots)
            );
        }
        Ok(())
    }

    fn start(&self, registry: &mut SessionRegistry, project: &ProjectFile) -> Result<()> {
        self.ensure_detected(project)?;
        registry.start(project, &self.launcher)?;
        Ok(())
    }

    fn print_menu(&self, registry: &SessionRegistry) {
        let menu = build_menu(
            &self.projects,
            registry,
            &self.ctx.roots,
            &self.ctx.settings,
            &self.installs,
        );
        print_menu(&menu, &self.installs);
    }

    async fn run(&self, registry: &mut SessionRegistry, command: ConsoleCommand) -> Result<Flow> {
        match command {
            ConsoleCommand::List => self.print_menu(registry),
            ConsoleCommand::Help => println!("{CONSOLE_HELP}"),
            ConsoleCommand::Quit => return Ok(Flow::Quit),
            ConsoleCommand::Start(selector) => {
                let project = self.find(registry, &selector)?;
                self.start(registry, &project)?;
            }
            ConsoleCommand::Stop(selector) => {
                let project = self.find(registry, &selector)?;
                if !registry.stop(&project.key())? {
                    println!("{} is not being served", project.path.display());
                }
            }
            ConsoleCommand::Switch(selector) => {
                let project = self.find(registry, &selector)?;
                self.ensure_detected(&project)?;
                registry.switch_to(&project, &self.launcher)?;
            }
            ConsoleCommand::StopAll => {
                let failures = registry.stop_all();
                if !failures.is_empty() {
                    bail!("{} session(s) failed to stop", failures.len());
                }
            }
            ConsoleCommand::Tool(action, selector) => {
                let project = self.find(registry, &selector)?;
                let message = match action {
                    ToolAction::Syncback => syncback(registry, &self.tool, &project).await?,
                    _ => self.tool.run(action, &project).await?,
                };
                println!("{message}");
            }
        }
        Ok(Flow::Continue)
    }
}

type ConsoleInput = Lines<BufReader<Stdin>>;

async fn next_line(input: &mut Option<ConsoleInput>) -> std::io::Result<Option<String>> {
    match input {
        Some(lines) => lines.next_line().await,
        None => Ok(None),
    }
}

async fn serve(ctx: &Context, selectors: &[String], quiet: bool, interactive: bool) -> Result<()> {
    let projects = ctx.discover()?;
    let selected = selectors
        .iter()
        .map(|selector| ctx.select(selector, &projects))
        .collect::<Result<Vec<_>>>()?;

    let mut registry = SessionRegistry::new();
    registry.set_observer(|change| match change.kind {
        ChangeKind::Started => println!("Serving {}", change.path.display()),
        ChangeKind::Stopped => println!("Stopped {}", change.path.display()),
        ChangeKind::Exited { code } => match code {
            Some(code) => println!("{} exited with code {code}", change.path.display()),
            None => println!("{} was terminated", change.path.display()),
        },
    });

    let mut surveyed = if interactive { projects.clone() } else { Vec::new() };
    surveyed.extend(selected.iter().cloned());
    let installs = survey_installs(&ctx.config.command, &surveyed).await;
    info!("{}", installs.detail());
    show_toolchain_notice(&mut registry, &installs);

    let console = Console {
        ctx,
        projects,
        installs,
        launcher: CliLauncher::new(ctx.config.serve_command()).with_echo(!quiet),
        tool: ctx.tool(),
    };

    let mut outcome = ServeOutcome::default();
    for project in &selected {
        if let Err(e) = console.start(&mut registry, project) {
            error!("{e:#}");
            outcome.failed_starts += 1;
        }
    }

    let mut input: Option<ConsoleInput> =
        interactive.then(|| BufReader::new(tokio::io::stdin()).lines());
    if interactive {
        println!("{CONSOLE_HELP}");
    }

    enum Event {
        Exited(ExitNotice),
        Input(std::io::Result<Option<String>>),
        Interrupted(std::io::Result<()>),
    }

    loop {
        if input.is_none() && registry.is_empty() {
            break;
        }

        let event = tokio::select! {
            Some(notice) = registry.wait_exit(), if !registry.is_empty() => Event::Exited(notice),
            line = next_line(&mut input), if input.is_some() => Event::Input(line),
            result = tokio::signal::ctrl_c() => Event::Interrupted(result),
        };

        match event {
            Event::Exited(notice) => outcome.record_exit(&notice),
            Event::Input(Ok(Some(line))) => {
                let command = match parse_command(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                match console.run(&mut registry, command).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => {
                        outcome.failed_stops += registry.stop_all().len();
                        break;
                    }
                    Err(e) => println!("{e:#}"),
                }
            }
            Event::Input(Ok(None)) => {
                info!(running = registry.len(), "Console input closed");
                input = None;
            }
            Event::Input(Err(e)) => return Err(e).context("Failed to read console input"),
            Event::Interrupted(result) => {
                result.context("Failed to listen for Ctrl-C")?;
                info!(running = registry.len(), "Interrupted, stopping all sessions");
                outcome.failed_stops += registry.stop_all().len();
                break;
            }
        }
    }

    outcome.into_result()
}

/// A selector naming a project file on disk that discovery did not find.
fn project_from_path(selector: &str, roots: &[WorkspaceRoot]) -> Option<ProjectFile> {
    let path = std::path::absolute(Path::new(selector)).ok()?;
    let name = path.file_name()?.to_str()?;
    if !is_project_file_name(name) || !path.is_file() {
        return None;
    }
    let owner = roots
        .iter()
        .find(|root| root.contains(&path))
        .or_else(|| roots.first())?;
    Some(ProjectFile::new(&path, owner.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_serve::project::ProjectKey;
    use atlas_serve::session::SessionId;

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "atlas-serve",
            "list",
            "--json",
            "--root",
            "/work/a",
            "--root",
            "/work/b",
            "--display",
            "always",
            "--max-length",
            "40",
        ])
        .unwrap();

        assert_eq!(cli.roots, vec![PathBuf::from("/work/a"), PathBuf::from("/work/b")]);
        assert_eq!(cli.display, Some(DisplayPolicy::Always));
        assert_eq!(cli.max_length, Some(40));
        assert!(matches!(cli.command, Command::List { json: true }));
    }

    #[test]
    fn serve_requires_a_project_unless_interactive() {
        assert!(Cli::try_parse_from(["atlas-serve", "serve"]).is_err());
        let cli = Cli::try_parse_from(["atlas-serve", "serve", "-q", "default.project.json5"])
            .unwrap();
        match cli.command {
            Command::Serve {
                projects,
                quiet,
                interactive,
            } => {
                assert_eq!(projects, vec!["default.project.json5"]);
                assert!(quiet);
                assert!(!interactive);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["atlas-serve", "serve", "-i"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Serve { ref projects, interactive: true, .. } if projects.is_empty()
        ));
    }

    #[test]
    fn tool_subcommands_take_one_project() {
        let cli = Cli::try_parse_from(["atlas-serve", "sourcemap", "place.project.json"]).unwrap();
        assert!(matches!(cli.command, Command::Sourcemap(ref arg) if arg.project == "place.project.json"));
        assert!(Cli::try_parse_from(["atlas-serve", "syncback"]).is_err());

        let cli = Cli::try_parse_from(["atlas-serve", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init { dir: None }));
    }

    #[test]
    fn display_policy_flag_uses_kebab_case() {
        let cli =
            Cli::try_parse_from(["atlas-serve", "--full-path", "as-needed", "list"]).unwrap();
        assert_eq!(cli.full_path, Some(DisplayPolicy::AsNeeded));
    }

    fn exit(code: Option<i32>) -> ExitNotice {
        ExitNotice {
            key: ProjectKey::from_path(Path::new("/work/game/default.project.json5")),
            session_id: SessionId::default(),
            code,
        }
    }

    #[test]
    fn serve_outcome_fails_on_any_failure() {
        assert!(ServeOutcome::default().into_result().is_ok());

        let mut clean = ServeOutcome::default();
        clean.record_exit(&exit(Some(0)));
        assert!(clean.into_result().is_ok());

        let mut outcome = ServeOutcome {
            failed_starts: 1,
            ..Default::default()
        };
        outcome.record_exit(&exit(Some(2)));
        outcome.record_exit(&exit(None));
        let err = outcome.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Serve sessions: 1 failed to start, 2 exited with an error"
        );
    }

    #[test]
    fn project_from_path_accepts_existing_project_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let file = temp_dir.path().join("place.project.json");
        std::fs::write(&file, "{}").unwrap();
        let roots = vec![WorkspaceRoot::new("ws", temp_dir.path())];

        let project = project_from_path(file.to_str().unwrap(), &roots).unwrap();
        assert_eq!(project.name, "place.project.json");
        assert_eq!(project.workspace_folder_name, "ws");

        let other = temp_dir.path().join("notes.txt");
        std::fs::write(&other, "").unwrap();
        assert!(project_from_path(other.to_str().unwrap(), &roots).is_none());
    }
}
