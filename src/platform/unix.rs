use std::io;

/// Unconditionally terminate a process with SIGKILL.
///
/// There is no graceful SIGTERM phase: the target gets no chance to clean up.
pub fn force_kill(pid: u32) -> io::Result<()> {
    send_signal(pid, libc::SIGKILL)
}

/// Encapsulates the unsafe kill call and reports errno as `io::Error`.
fn send_signal(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let c_pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid pid {pid}")))?;
    // pid 0 and negative pids address process groups; never signal those.
    if c_pid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {pid}"),
        ));
    }

    let result = unsafe { libc::kill(c_pid, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
