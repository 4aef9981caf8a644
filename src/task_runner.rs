//! Task execution
//!
//! [`TaskRunner`] is the failure boundary around a task body: whatever the
//! body does (returns an error, panics), the caller gets a [`TaskResult`].

use crate::config_loader::Config;
use crate::logging::panic_message;
use crate::task_result::{OutputLine, TaskResult};
use chrono::Utc;
use once_cell::sync::OnceCell;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info};

/// A config-driven unit of work.
///
/// Bodies report progress by writing human-readable text to the streams in
/// [`TaskIo`] and may log through `tracing`. They must not mutate the config.
pub trait TaskBody: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, config: &Config, io: &mut TaskIo<'_>) -> anyhow::Result<()>;
}

/// Where a task body's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Real stdout/stderr, also recorded in the result (headless).
    #[default]
    Passthrough,
    /// In-memory buffers only (supervised).
    Capture,
}

/// Output streams handed to a task body.
pub struct TaskIo<'a> {
    stdout: &'a mut dyn Write,
    stderr: &'a mut dyn Write,
}

impl<'a> TaskIo<'a> {
    pub fn new(stdout: &'a mut dyn Write, stderr: &'a mut dyn Write) -> Self {
        Self { stdout, stderr }
    }

    pub fn stdout(&mut self) -> &mut dyn Write {
        &mut *self.stdout
    }

    pub fn stderr(&mut self) -> &mut dyn Write {
        &mut *self.stderr
    }
}

/// Records everything written and optionally mirrors it to a real stream.
struct Tee<'a> {
    buffer: &'a mut Vec<u8>,
    mirror: Option<Box<dyn Write>>,
}

impl Write for Tee<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(mirror) = self.mirror.as_mut() {
            mirror.write_all(buf)?;
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.mirror.as_mut() {
            Some(mirror) => mirror.flush(),
            None => Ok(()),
        }
    }
}

thread_local! {
    static CAPTURING_PANIC: Cell<bool> = const { Cell::new(false) };
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Chain a panic hook that, on threads currently running a task body,
/// records the panic location and backtrace instead of printing them.
/// Other threads keep the previous hook.
fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING_PANIC.with(Cell::get) {
                let trace = format!("{}\n{}", info, Backtrace::force_capture());
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

/// Run `f` with task panics captured; returns the recorded trace if `f`
/// panicked.
fn catch_task_panic<R>(f: impl FnOnce() -> R) -> (std::thread::Result<R>, Option<String>) {
    install_panic_hook();
    PANIC_TRACE.with(|slot| slot.borrow_mut().take());
    let was_capturing = CAPTURING_PANIC.with(|flag| flag.replace(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING_PANIC.with(|flag| flag.set(was_capturing));
    let trace = PANIC_TRACE.with(|slot| slot.borrow_mut().take());
    (outcome, trace)
}

#[derive(Clone)]
pub struct TaskRunner {
    body: Arc<dyn TaskBody>,
    mode: CaptureMode,
}

impl TaskRunner {
    pub fn new(body: Arc<dyn TaskBody>) -> Self {
        Self {
            body,
            mode: CaptureMode::Passthrough,
        }
    }

    pub fn with_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn task_name(&self) -> &str {
        self.body.name()
    }

    /// Run the task body against `config`. Never panics.
    pub fn run(&self, config: &Config) -> TaskResult {
        self.run_with(config, |_| {})
    }

    /// Like [`run`](Self::run), forwarding each non-blank output line to
    /// `on_line` once the body has finished: stdout lines first, then stderr.
    pub fn run_with(&self, config: &Config, mut on_line: impl FnMut(OutputLine)) -> TaskResult {
        let name = self.body.name().to_string();
        let started_at = Utc::now();
        info!("Task {} started", name);

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let (stdout_mirror, stderr_mirror): (Option<Box<dyn Write>>, Option<Box<dyn Write>>) =
            match self.mode {
                CaptureMode::Passthrough => {
                    (Some(Box::new(io::stdout())), Some(Box::new(io::stderr())))
                }
                CaptureMode::Capture => (None, None),
            };

        let outcome = {
            let mut stdout = Tee {
                buffer: &mut stdout_buf,
                mirror: stdout_mirror,
            };
            let mut stderr = Tee {
                buffer: &mut stderr_buf,
                mirror: stderr_mirror,
            };
            let body = &self.body;
            let outcome = catch_task_panic(|| {
                let mut task_io = TaskIo::new(&mut stdout, &mut stderr);
                body.run(config, &mut task_io)
            });
            let _ = stdout.flush();
            let _ = stderr.flush();
            outcome
        };
        let (outcome, panic_trace) = outcome;

        let stdout = String::from_utf8_lossy(&stdout_buf).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf).into_owned();

        let result = match outcome {
            Ok(Ok(())) => {
                info!("Task {} completed", name);
                TaskResult::success(name, started_at, stdout, stderr)
            }
            Ok(Err(err)) => {
                let message = format!("{:#}", err);
                let trace = format!("{:?}", err);
                error!("Error occurred while running task {}: {}", name, message);
                error!("Detailed error information: {}", trace);
                TaskResult::failure(name, started_at, stdout, stderr, message, Some(trace))
            }
            Err(payload) => {
                let message = format!("task panicked: {}", panic_message(payload.as_ref()));
                error!("Error occurred while running task {}: {}", name, message);
                if let Some(trace) = &panic_trace {
                    error!("Detailed error information: {}", trace);
                }
                TaskResult::failure(name, started_at, stdout, stderr, message, panic_trace)
            }
        };

        for line in result.output_lines() {
            on_line(line);
        }
        result
    }
}
