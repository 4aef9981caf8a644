use crate::config::{DRAIN_POLL_INTERVAL, MESSAGE_CHANNEL_CAPACITY, WORKER_SEND_TIMEOUT};
use crate::config_loader::{self, Config};
use crate::error::WardenResult;
use crate::instance_guard::{InstanceGuard, PeerSource, PeerTerminator};
use crate::logging::LogManager;
use crate::notification::{NotificationSink, Outcome};
use crate::task_result::{OutputLine, TaskResult};
use crate::task_runner::{CaptureMode, TaskRunner};
use crate::utils::{env, paths};
use chrono::Utc;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Worker -> foreground message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorMessage {
    Status(String),
    Output(OutputLine),
    /// Lines discarded because the foreground was not draining.
    Dropped(usize),
    Finished(TaskResult),
}

pub struct Supervisor {
    logs: Arc<LogManager>,
    runner: TaskRunner,
    config_path: PathBuf,
    threshold: Option<usize>,
}

impl Supervisor {
    /// The configuration file is looked up beside the program, in the
    /// directory the log manager was created for.
    pub fn new(logs: Arc<LogManager>, runner: TaskRunner) -> Self {
        let config_path = paths::config_path(logs.program_dir());
        Self {
            logs,
            runner,
            config_path,
            threshold: None,
        }
    }

    /// Fixed instance limit. Without one, `TASK_WARDEN_MAX_INSTANCES` or
    /// the default of 3 applies.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn logs(&self) -> &Arc<LogManager> {
        &self.logs
    }

    /// Headless run: load config, start logging, enforce the instance
    /// limit, run the task. Fatal errors become a failure outcome; the
    /// caller presents it and exits.
    pub fn run_headless<P, K>(
        &self,
        guard: &InstanceGuard<P, K>,
        notifier: &dyn NotificationSink,
    ) -> Outcome
    where
        P: PeerSource,
        K: PeerTerminator,
    {
        match self.headless_pipeline(guard, notifier) {
            Ok(result) if result.is_success() => Outcome::success(result.summary()),
            Ok(result) => Outcome::failure(result.summary()),
            Err(err) => {
                self.logs.in_session(|| error!("{}", err));
                Outcome::failure(format!("Error occurred: {}", err))
            }
        }
    }

    fn headless_pipeline<P, K>(
        &self,
        guard: &InstanceGuard<P, K>,
        notifier: &dyn NotificationSink,
    ) -> WardenResult<TaskResult>
    where
        P: PeerSource,
        K: PeerTerminator,
    {
        let config = config_loader::load(&self.config_path)?;
        self.logs.setup(config_loader::logs_folder(&config))?;
        self.logs.install_global();

        let runner = self.runner.clone().with_mode(CaptureMode::Passthrough);
        let result = self.logs.in_session(|| {
            info!(
                "Configuration loaded from {} ({} keys)",
                self.config_path.display(),
                config.len()
            );
            let threshold = self.threshold.unwrap_or_else(env::instance_threshold);
            guard.enforce(threshold, notifier);
            runner.run(&config)
        });
        Ok(result)
    }

    /// Start the task on a background worker with output captured in memory.
    ///
    /// The worker opens the logging session itself (a no-op when one is
    /// already open) and reports through a bounded channel; see
    /// [`SupervisedRun::drain`]. While it runs, console log lines arrive as
    /// `Status` messages instead of going to stderr.
    pub fn spawn_supervised(&self, config: Config) -> io::Result<SupervisedRun> {
        let (sender, receiver) = channel::bounded(MESSAGE_CHANNEL_CAPACITY);
        let logs = Arc::clone(&self.logs);
        let runner = self.runner.clone().with_mode(CaptureMode::Capture);

        let handle = thread::Builder::new()
            .name("task-worker".to_string())
            .spawn(move || {
                let tap_sender = sender.clone();
                let mut outbox = Outbox::new(sender);
                let _console = match logs.setup(config_loader::logs_folder(&config)) {
                    // Console log lines travel with the output so the
                    // foreground decides where they are drawn.
                    Ok(session) => Some(session.tap_console(move |line| {
                        let _ = tap_sender.send_timeout(
                            SupervisorMessage::Status(line.to_string()),
                            WORKER_SEND_TIMEOUT,
                        );
                    })),
                    Err(err) => {
                        outbox.send(SupervisorMessage::Status(format!(
                            "Logging could not be started: {}",
                            err
                        )));
                        None
                    }
                };

                let result = logs.in_session(|| {
                    runner.run_with(&config, |line| outbox.send(SupervisorMessage::Output(line)))
                });
                outbox.finish(result);
            })?;

        Ok(SupervisedRun {
            receiver,
            handle: Some(handle),
        })
    }
}

/// Sending half used by the worker.
///
/// Backpressure policy: output lines wait at most `WORKER_SEND_TIMEOUT` for
/// room in the channel and are dropped (and counted) after that. The count
/// is reported as `Dropped(n)` ahead of the next message that gets through.
/// The final `Finished` message always blocks until delivered.
struct Outbox {
    sender: Sender<SupervisorMessage>,
    dropped: usize,
}

impl Outbox {
    fn new(sender: Sender<SupervisorMessage>) -> Self {
        Self { sender, dropped: 0 }
    }

    fn send(&mut self, message: SupervisorMessage) {
        if self.dropped > 0 {
            match self
                .sender
                .send_timeout(SupervisorMessage::Dropped(self.dropped), WORKER_SEND_TIMEOUT)
            {
                Ok(()) => self.dropped = 0,
                Err(SendTimeoutError::Timeout(_)) => {
                    self.dropped += 1;
                    return;
                }
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }

        match self.sender.send_timeout(message, WORKER_SEND_TIMEOUT) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => self.dropped += 1,
            // Foreground went away; nobody is listening.
            Err(SendTimeoutError::Disconnected(_)) => {}
        }
    }

    fn finish(self, result: TaskResult) {
        if self.dropped > 0 {
            let _ = self.sender.send(SupervisorMessage::Dropped(self.dropped));
        }
        let _ = self.sender.send(SupervisorMessage::Finished(result));
    }
}

/// Foreground handle to a task running on the worker.
pub struct SupervisedRun {
    receiver: Receiver<SupervisorMessage>,
    handle: Option<JoinHandle<()>>,
}

impl SupervisedRun {
    pub fn receiver(&self) -> &Receiver<SupervisorMessage> {
        &self.receiver
    }

    /// Drain messages in order until the worker reports its result.
    ///
    /// `on_idle` runs whenever no message arrived within the poll interval,
    /// so the caller can keep its UI alive.
    pub fn drain(
        mut self,
        mut on_message: impl FnMut(SupervisorMessage),
        mut on_idle: impl FnMut(),
    ) -> TaskResult {
        loop {
            match self.receiver.recv_timeout(DRAIN_POLL_INTERVAL) {
                Ok(SupervisorMessage::Finished(result)) => {
                    self.join();
                    return result;
                }
                Ok(message) => on_message(message),
                Err(RecvTimeoutError::Timeout) => on_idle(),
                Err(RecvTimeoutError::Disconnected) => {
                    self.join();
                    return TaskResult::failure(
                        "worker",
                        Utc::now(),
                        String::new(),
                        String::new(),
                        "worker exited without reporting a result".to_string(),
                        None,
                    );
                }
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Task worker thread panicked");
            }
        }
    }
}
