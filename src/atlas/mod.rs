//! The external `atlas` tool: launching serve processes, one-shot
//! subcommands, and probing the install.

pub mod backend;
pub mod install;
pub mod process;
pub mod tool;

pub use backend::{ExitNotice, ExitReporter, LaunchedProcess, ProcessLauncher, StopHandle};
pub use install::{detect_install, survey_installs, Install, InstallSurvey, InstallType};
pub use process::{build_serve_args, CliLauncher, ServeCommand};
pub use tool::{syncback, AtlasTool, ToolAction};
