//! Utility helpers
//!
//! Program-relative path resolution and environment variable parsing.

pub mod env;
pub mod paths;

/// Executable file name of the running program, used to recognise peers.
pub fn program_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
