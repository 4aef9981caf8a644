//! Host process enumeration
//!
//! Platform strategy:
//! - Linux/macOS: psutil
//! - Windows: sysinfo
//!
//! A pass never fails because of a single process: entries that exit or deny
//! inspection while the table is being walked are skipped.

#[cfg(unix)]
use psutil::process::Process;

#[cfg(windows)]
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use crate::core::models::ProcessRecord;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum ProcessTableError {
    #[cfg(unix)]
    #[error("Failed to list host processes: {0}")]
    Listing(#[from] psutil::Error),
    #[allow(dead_code)]
    #[error("Unsupported platform")]
    UnsupportedPlatform,
}

/// Take a snapshot of every inspectable process on the host.
pub fn snapshot() -> Result<Vec<ProcessRecord>, ProcessTableError> {
    #[cfg(unix)]
    {
        snapshot_unix()
    }

    #[cfg(windows)]
    {
        Ok(snapshot_windows())
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(ProcessTableError::UnsupportedPlatform)
    }
}

#[cfg(unix)]
fn snapshot_unix() -> Result<Vec<ProcessRecord>, ProcessTableError> {
    let mut records = Vec::new();
    for entry in psutil::process::processes()? {
        let process = match entry {
            Ok(process) => process,
            Err(err) => {
                trace!("skipping process during scan: {:?}", err);
                continue;
            }
        };

        match describe_unix(&process) {
            Ok(record) => records.push(record),
            // Exited or access denied between listing and inspection
            Err(err) => trace!("skipping pid {}: {:?}", process.pid(), err),
        }
    }
    Ok(records)
}

#[cfg(unix)]
fn describe_unix(process: &Process) -> psutil::process::ProcessResult<ProcessRecord> {
    let name = process.name()?;
    let cmdline = process.cmdline_vec()?.unwrap_or_default();
    Ok(ProcessRecord::new(process.pid(), name).with_cmdline(cmdline))
}

#[cfg(windows)]
fn snapshot_windows() -> Vec<ProcessRecord> {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::everything(),
    );

    system
        .processes()
        .values()
        .map(|process| {
            ProcessRecord::new(
                process.pid().as_u32(),
                process.name().to_string_lossy().into_owned(),
            )
            .with_cmdline(
                process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned()),
            )
        })
        .collect()
}
