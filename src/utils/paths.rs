//! Program-relative paths
//!
//! The configuration file and the default logs folder live beside the
//! executable, so a copied installation carries its own state.

use crate::config::{CONFIG_FILE_NAME, DEFAULT_LOGS_DIR};
use std::path::{Path, PathBuf};

/// Directory containing the running executable.
///
/// Falls back to the current working directory when the executable path
/// cannot be resolved.
pub fn program_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_path(program_dir: &Path) -> PathBuf {
    program_dir.join(CONFIG_FILE_NAME)
}

pub fn default_logs_dir(program_dir: &Path) -> PathBuf {
    program_dir.join(DEFAULT_LOGS_DIR)
}
