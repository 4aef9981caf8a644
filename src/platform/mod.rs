//! Platform-specific process control.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::force_kill;
#[cfg(windows)]
pub use windows::force_kill;

pub fn current_pid() -> u32 {
    std::process::id()
}
