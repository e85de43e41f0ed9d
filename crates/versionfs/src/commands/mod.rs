//! Command handlers for the versionfs CLI.

pub mod config;
pub mod files;
pub mod history;
pub mod logging;

pub use config::*;
pub use files::*;
pub use history::*;
pub use logging::*;
