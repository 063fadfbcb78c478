//! Where atlas-serve keeps its files.
//!
//! - Config: `$XDG_CONFIG_HOME/atlas-serve[-dev]/config.toml`, falling back
//!   to `$HOME/.config/...`
//! - Logs: `$XDG_STATE_HOME/atlas-serve[-dev]/`, falling back to
//!   `$HOME/.local/state/...`
//!
//! Dev builds (`0.0.0-dev`) use the `-dev` directory so a checkout never
//! touches an installed release's files.
//!
//! Tests redirect everything under one directory with [`TestPathGuard`]:
//! ```ignore
//! let temp_dir = tempfile::TempDir::new().unwrap();
//! let _guard = TestPathGuard::new(temp_dir.path());
//! assert_eq!(config_file().unwrap(), temp_dir.path().join("config.toml"));
//! ```

use std::cell::RefCell;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

fn app_dir_name() -> &'static str {
    if cfg!(dev_build) {
        "atlas-serve-dev"
    } else {
        "atlas-serve"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Config,
    LogDir,
}

#[derive(Debug, PartialEq)]
enum PathStrategy {
    Xdg,
    Override(PathBuf),
}

thread_local! {
    static PATH_STRATEGY: RefCell<PathStrategy> = const { RefCell::new(PathStrategy::Xdg) };
}

/// Resolve `kind` under the current thread's strategy. `None` when neither
/// the XDG variable nor `HOME` is set.
pub fn resolve(kind: PathKind) -> Option<PathBuf> {
    PATH_STRATEGY.with(|strategy| match &*strategy.borrow() {
        PathStrategy::Xdg => resolve_xdg(kind),
        PathStrategy::Override(base) => Some(resolve_override(base, kind)),
    })
}

fn resolve_xdg(kind: PathKind) -> Option<PathBuf> {
    match kind {
        PathKind::Config => xdg_base("XDG_CONFIG_HOME", &[".config"])
            .map(|base| base.join(app_dir_name()).join(CONFIG_FILE_NAME)),
        PathKind::LogDir => {
            xdg_base("XDG_STATE_HOME", &[".local", "state"]).map(|base| base.join(app_dir_name()))
        }
    }
}

/// `$var` if set and non-empty, else `$HOME` joined with `home_fallback`.
fn xdg_base(var: &str, home_fallback: &[&str]) -> Option<PathBuf> {
    if let Some(value) = std::env::var_os(var).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }
    std::env::var_os("HOME")
        .filter(|h: &OsString| !h.is_empty())
        .map(|home| home_fallback.iter().fold(PathBuf::from(home), |p, s| p.join(s)))
}

fn resolve_override(base: &Path, kind: PathKind) -> PathBuf {
    match kind {
        PathKind::Config => base.join(CONFIG_FILE_NAME),
        PathKind::LogDir => base.join("logs"),
    }
}

pub fn config_file() -> Option<PathBuf> {
    resolve(PathKind::Config)
}

pub fn log_directory() -> Option<PathBuf> {
    resolve(PathKind::LogDir)
}

/// Resolve every path under `base` on this thread until [`reset_to_xdg`].
pub fn set_test_dir(base: impl Into<PathBuf>) {
    PATH_STRATEGY.with(|strategy| {
        *strategy.borrow_mut() = PathStrategy::Override(base.into());
    });
}

pub fn reset_to_xdg() {
    PATH_STRATEGY.with(|strategy| {
        *strategy.borrow_mut() = PathStrategy::Xdg;
    });
}

/// Overrides path resolution for the current thread; restores XDG on drop.
pub struct TestPathGuard;

impl TestPathGuard {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        set_test_dir(base_dir);
        TestPathGuard
    }
}

impl Drop for TestPathGuard {
    fn drop(&mut self) {
        reset_to_xdg();
    }
}
