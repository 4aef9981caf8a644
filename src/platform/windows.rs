use std::io;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

fn refreshed(pid: u32) -> (System, Pid) {
    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );
    (system, sys_pid)
}

/// Unconditionally terminate a process (TerminateProcess).
pub fn force_kill(pid: u32) -> io::Result<()> {
    let (system, sys_pid) = refreshed(pid);
    match system.process(sys_pid) {
        Some(process) if process.kill() => Ok(()),
        Some(_) => Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("failed to terminate pid {pid}"),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("pid {pid} not found"),
        )),
    }
}
