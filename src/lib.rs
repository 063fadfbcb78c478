//! atlas-serve: discover Atlas project files, give them distinct labels, and
//! run at most one `atlas serve` session per project.

pub mod atlas;
pub mod config;
pub mod display;
pub mod menu;
pub mod paths;
pub mod project;
pub mod session;
