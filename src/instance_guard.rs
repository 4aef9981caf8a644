//! Instance arbitration
//!
//! Counts other running copies of this program and, when there are more
//! than allowed, kills the first excess peer and then exits.
//!
//! Peers are recognised by their command line mentioning this executable's
//! file name. That avoids a lock file but is heuristic, and the
//! count-then-kill sequence is not atomic: peers may come and go between the
//! scan and the kill. Arbitration is best effort.

use crate::config::FAILURE_EXIT_CODE;
use crate::core::models::ProcessRecord;
use crate::core::process_table;
use crate::notification::NotificationSink;
use crate::platform;
use crate::utils;
use std::io;
use tracing::{debug, error, warn};

/// Source of peer processes. The host implementation scans the process
/// table; a PID file or OS mutex could stand in without touching callers.
pub trait PeerSource {
    fn list_peers(&self, program: &str, self_pid: u32) -> Vec<ProcessRecord>;
}

/// Forcible termination of a peer.
pub trait PeerTerminator {
    fn kill(&self, pid: u32) -> io::Result<()>;
}

/// Command-line substring matching over the live process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProcessTable;

impl PeerSource for HostProcessTable {
    fn list_peers(&self, program: &str, self_pid: u32) -> Vec<ProcessRecord> {
        match process_table::snapshot() {
            Ok(records) => records
                .into_iter()
                .filter(|record| record.is_peer_of(program, self_pid))
                .collect(),
            Err(err) => {
                warn!("Cannot enumerate host processes: {}", err);
                Vec::new()
            }
        }
    }
}

/// SIGKILL / TerminateProcess.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForceKill;

impl PeerTerminator for ForceKill {
    fn kill(&self, pid: u32) -> io::Result<()> {
        platform::force_kill(pid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    WithinLimit {
        peers: usize,
    },
    /// `offender` is the peer that pushed the count past the threshold.
    Exceeded {
        offender: ProcessRecord,
        peers: usize,
    },
}

pub struct InstanceGuard<P = HostProcessTable, K = ForceKill> {
    program: String,
    self_pid: u32,
    source: P,
    terminator: K,
}

impl InstanceGuard {
    pub fn for_current_process() -> Self {
        Self::with_parts(
            utils::program_name(),
            platform::current_pid(),
            HostProcessTable,
            ForceKill,
        )
    }
}

impl<P: PeerSource, K: PeerTerminator> InstanceGuard<P, K> {
    pub fn with_parts(program: impl Into<String>, self_pid: u32, source: P, terminator: K) -> Self {
        Self {
            program: program.into(),
            self_pid,
            source,
            terminator,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn self_pid(&self) -> u32 {
        self.self_pid
    }

    /// Decide whether the instance limit is exceeded without acting on it.
    pub fn evaluate(&self, threshold: usize) -> Verdict {
        let peers = self.source.list_peers(&self.program, self.self_pid);
        let count = peers.len();
        match peers.into_iter().nth(threshold) {
            Some(offender) => Verdict::Exceeded {
                offender,
                peers: count,
            },
            None => Verdict::WithinLimit { peers: count },
        }
    }

    /// Notify the user and kill the offending peer if the limit is exceeded.
    ///
    /// Returns the killed peer; the caller is expected to exit afterwards.
    pub fn arbitrate(
        &self,
        threshold: usize,
        notifier: &dyn NotificationSink,
    ) -> Option<ProcessRecord> {
        match self.evaluate(threshold) {
            Verdict::WithinLimit { peers } => {
                debug!(
                    "{} peer instance(s) of {} running (limit {})",
                    peers, self.program, threshold
                );
                None
            }
            Verdict::Exceeded { offender, peers } => {
                let message = format!(
                    "Multiple instances detected: current PID: {}, other PID: {}",
                    self.self_pid, offender.pid
                );
                warn!("{} ({} peers, limit {})", message, peers, threshold);
                notifier.notify(&message);

                if let Err(err) = self.terminator.kill(offender.pid) {
                    // Peer may already be gone; the scan is not atomic.
                    error!("Failed to kill peer {}: {}", offender.pid, err);
                }
                Some(offender)
            }
        }
    }

    /// Enforce the instance limit.
    ///
    /// Returns normally when at most `threshold` peers run. Otherwise the
    /// user is notified, the offending peer killed, and this process exits
    /// immediately without further cleanup.
    pub fn enforce(&self, threshold: usize, notifier: &dyn NotificationSink) {
        if self.arbitrate(threshold, notifier).is_some() {
            std::process::exit(FAILURE_EXIT_CODE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::RecordingNotifier;
    use parking_lot::Mutex;

    struct FixedPeers(Vec<ProcessRecord>);

    impl PeerSource for FixedPeers {
        fn list_peers(&self, program: &str, self_pid: u32) -> Vec<ProcessRecord> {
            self.0
                .iter()
                .filter(|record| record.is_peer_of(program, self_pid))
                .cloned()
                .collect()
        }
    }

    #[derive(Default)]
    struct RecordingKill(Mutex<Vec<u32>>);

    impl PeerTerminator for &RecordingKill {
        fn kill(&self, pid: u32) -> io::Result<()> {
            self.0.lock().push(pid);
            Ok(())
        }
    }

    fn warden(pid: u32) -> ProcessRecord {
        ProcessRecord::new(pid, "task-warden").with_cmdline(["/opt/task-warden"])
    }

    #[test]
    fn test_within_limit_is_silent() {
        let kills = RecordingKill::default();
        let notifier = RecordingNotifier::new();
        let guard = InstanceGuard::with_parts(
            "task-warden",
            1,
            FixedPeers(vec![warden(1), warden(2), warden(3)]),
            &kills,
        );

        assert_eq!(guard.evaluate(2), Verdict::WithinLimit { peers: 2 });
        assert!(guard.arbitrate(2, &notifier).is_none());
        guard.enforce(2, &notifier);
        assert!(notifier.messages().is_empty());
        assert!(kills.0.lock().is_empty());
    }

    #[test]
    fn test_exceeded_kills_first_excess_peer() {
        let kills = RecordingKill::default();
        let notifier = RecordingNotifier::new();
        let guard = InstanceGuard::with_parts(
            "task-warden",
            100,
            FixedPeers(vec![warden(10), warden(100), warden(11), warden(12)]),
            &kills,
        );

        let killed = guard.arbitrate(1, &notifier).expect("limit exceeded");
        assert_eq!(killed.pid, 11);
        assert_eq!(*kills.0.lock(), vec![11]);
        assert_eq!(
            notifier.messages(),
            vec!["Multiple instances detected: current PID: 100, other PID: 11"]
        );
    }

    #[test]
    fn test_unrelated_processes_are_ignored() {
        let kills = RecordingKill::default();
        let guard = InstanceGuard::with_parts(
            "task-warden",
            1,
            FixedPeers(vec![
                ProcessRecord::new(2, "bash").with_cmdline(["bash"]),
                ProcessRecord::new(3, "init").with_cmdline(Vec::<String>::new()),
            ]),
            &kills,
        );
        assert_eq!(guard.evaluate(0), Verdict::WithinLimit { peers: 0 });
    }

    #[test]
    fn test_host_table_never_lists_self() {
        let peers = HostProcessTable.list_peers(&utils::program_name(), std::process::id());
        assert!(peers.iter().all(|peer| peer.pid != std::process::id()));
    }
}
