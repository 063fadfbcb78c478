//! User configuration from `config.toml`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::atlas::ServeCommand;
use crate::display::{DisplayPolicy, DEFAULT_MAX_DISPLAY_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// How much of a project's path its label shows.
    pub project_path_display: DisplayPolicy,
    /// When a menu entry carries a full-path detail line.
    pub show_full_path: DisplayPolicy,
    /// Extra directories searched for project files, relative to each root
    /// unless absolute.
    pub additional_project_paths: Vec<PathBuf>,
    pub max_display_length: usize,
    pub command: String,
    pub serve_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let serve = ServeCommand::default();
        Self {
            project_path_display: DisplayPolicy::default(),
            show_full_path: DisplayPolicy::default(),
            additional_project_paths: Vec::new(),
            max_display_length: DEFAULT_MAX_DISPLAY_LENGTH,
            command: serve.program,
            serve_args: serve.args,
        }
    }
}

impl Config {
    pub fn serve_command(&self) -> ServeCommand {
        ServeCommand {
            program: self.command.clone(),
            args: self.serve_args.clone(),
        }
    }
}

pub fn parse_config(contents: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(contents)
}

/// Load the config file. Returns defaults if it doesn't exist or can't be parsed.
pub fn load_config() -> Config {
    let Some(path) = crate::paths::config_file() else {
        return Config::default();
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!("No config at {}: {e}", path.display());
            return Config::default();
        }
    };

    match parse_config(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to parse config at {}: {e}", path.display());
            Config::default()
        }
    }
}
