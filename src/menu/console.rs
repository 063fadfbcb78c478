//! Line commands read while `serve --interactive` is running.

use crate::atlas::ToolAction;

pub const CONSOLE_HELP: &str = "\
Commands:
  list                 show projects and what is running
  start <project>      serve a project
  stop <project>       stop serving a project
  switch <project>     stop everything, then serve a project
  stop-all             stop every session
  syncback <project>   stop everything, then syncback a project
  sourcemap <project>  write sourcemap.json next to a project
  studio <project>     open a project in Studio
  help                 show this help
  quit                 stop everything and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Start(String),
    Stop(String),
    /// Stop every session, then start this one.
    Switch(String),
    StopAll,
    Tool(ToolAction, String),
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("Unknown command '{0}'. Type 'help' for a list of commands.")]
    Unknown(String),

    #[error("'{0}' needs a project")]
    MissingProject(&'static str),

    #[error("'{0}' takes no arguments")]
    UnexpectedArgument(&'static str),
}

/// Parse one console line. Blank lines yield `Ok(None)`.
///
/// The project selector is the rest of the line, so labels and paths with
/// spaces need no quoting.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "list" | "ls" => no_args("list", rest, ConsoleCommand::List)?,
        "stop-all" => no_args("stop-all", rest, ConsoleCommand::StopAll)?,
        "help" | "?" => no_args("help", rest, ConsoleCommand::Help)?,
        "quit" | "exit" => no_args("quit", rest, ConsoleCommand::Quit)?,
        "start" => ConsoleCommand::Start(selector("start", rest)?),
        "stop" => ConsoleCommand::Stop(selector("stop", rest)?),
        "switch" => ConsoleCommand::Switch(selector("switch", rest)?),
        "syncback" => ConsoleCommand::Tool(ToolAction::Syncback, selector("syncback", rest)?),
        "sourcemap" => ConsoleCommand::Tool(ToolAction::Sourcemap, selector("sourcemap", rest)?),
        "studio" => ConsoleCommand::Tool(ToolAction::Studio, selector("studio", rest)?),
        other => return Err(ConsoleError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn no_args(
    name: &'static str,
    rest: &str,
    command: ConsoleCommand,
) -> Result<ConsoleCommand, ConsoleError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ConsoleError::UnexpectedArgument(name))
    }
}

fn selector(name: &'static str, rest: &str) -> Result<String, ConsoleError> {
    if rest.is_empty() {
        Err(ConsoleError::MissingProject(name))
    } else {
        Ok(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("   \t"), Ok(None));
    }

    #[test]
    fn selector_keeps_inner_spaces() {
        assert_eq!(
            parse_command("  switch my game/default.project.json5 "),
            Ok(Some(ConsoleCommand::Switch(
                "my game/default.project.json5".to_string()
            )))
        );
    }

    #[test]
    fn tool_commands_map_to_actions() {
        assert_eq!(
            parse_command("sourcemap place.project.json"),
            Ok(Some(ConsoleCommand::Tool(
                ToolAction::Sourcemap,
                "place.project.json".to_string()
            )))
        );
        assert_eq!(
            parse_command("syncback a"),
            Ok(Some(ConsoleCommand::Tool(ToolAction::Syncback, "a".to_string())))
        );
        assert_eq!(
            parse_command("studio a"),
            Ok(Some(ConsoleCommand::Tool(ToolAction::Studio, "a".to_string())))
        );
    }

    #[test]
    fn argument_errors_name_the_command() {
        assert_eq!(parse_command("stop"), Err(ConsoleError::MissingProject("stop")));
        assert_eq!(
            parse_command("stop-all now"),
            Err(ConsoleError::UnexpectedArgument("stop-all"))
        );
        let err = parse_command("serve x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown command 'serve'. Type 'help' for a list of commands."
        );
    }

    #[test]
    fn aliases() {
        assert_eq!(parse_command("ls"), Ok(Some(ConsoleCommand::List)));
        assert_eq!(parse_command("exit"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(parse_command("?"), Ok(Some(ConsoleCommand::Help)));
    }
}
