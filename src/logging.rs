//! Process-wide logging session
//!
//! A [`LogManager`] is created once in `main` and handed to every component
//! that logs. Its first successful [`LogManager::setup`] opens one fresh log
//! file and binds a file sink and a console sink to the same line format:
//!
//! ```text
//! 2024-05-01 10:15:02,117 | INFO - Table loaded with 5 rows and 3 columns.
//! ```
//!
//! Later `setup` calls return the existing session, so sinks are never
//! installed twice.
//!
//! The console sink can be tapped ([`LogSession::tap_console`]) while a
//! front end owns the terminal; the log file always gets every line.

use crate::config::{LOG_FILE_PREFIX, LOG_FILE_TIMESTAMP, LOG_LINE_TIMESTAMP};
use crate::error::LoggingError;
use crate::utils::paths;
use chrono::Local;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, Dispatch, Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

/// Owner of the process-wide logging session.
pub struct LogManager {
    program_dir: PathBuf,
    session: OnceCell<LogSession>,
    global_installed: AtomicBool,
}

/// One open log file plus the console sink, both behind one dispatcher.
pub struct LogSession {
    path: PathBuf,
    dispatch: Dispatch,
    console: ConsoleSink,
}

type ConsoleTap = Arc<dyn Fn(&str) + Send + Sync>;

/// Stderr unless a tap is set.
#[derive(Clone, Default)]
struct ConsoleSink {
    tap: Arc<Mutex<Option<ConsoleTap>>>,
}

impl<'a> MakeWriter<'a> for ConsoleSink {
    type Writer = ConsoleLine;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleLine {
            tap: self.tap.lock().clone(),
            buffer: Vec::new(),
        }
    }
}

/// One formatted event, emitted when dropped.
struct ConsoleLine {
    tap: Option<ConsoleTap>,
    buffer: Vec<u8>,
}

impl io::Write for ConsoleLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleLine {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        match &self.tap {
            Some(tap) => tap(String::from_utf8_lossy(&self.buffer).trim_end()),
            None => {
                let _ = io::Write::write_all(&mut io::stderr(), &self.buffer);
            }
        }
    }
}

/// Restores the stderr console sink when dropped.
#[must_use = "the tap is removed when the guard is dropped"]
pub struct ConsoleTapGuard {
    tap: Arc<Mutex<Option<ConsoleTap>>>,
}

impl Drop for ConsoleTapGuard {
    fn drop(&mut self) {
        *self.tap.lock() = None;
    }
}

impl LogManager {
    /// `program_dir` is the base for the default `logs` folder.
    pub fn new(program_dir: impl Into<PathBuf>) -> Self {
        Self {
            program_dir: program_dir.into(),
            session: OnceCell::new(),
            global_installed: AtomicBool::new(false),
        }
    }

    pub fn for_current_exe() -> Self {
        Self::new(paths::program_dir())
    }

    pub fn program_dir(&self) -> &Path {
        &self.program_dir
    }

    /// Open the logging session.
    ///
    /// An empty `logs_folder` selects `<program_dir>/logs`. Only the first
    /// successful call has an effect; later calls return the same session.
    pub fn setup(&self, logs_folder: &str) -> Result<&LogSession, LoggingError> {
        let mut opened = false;
        let session = self.session.get_or_try_init(|| {
            opened = true;
            LogSession::open(&self.resolve_folder(logs_folder))
        })?;

        if !opened {
            session.in_scope(|| {
                debug!(
                    "Logging already initialised at {}; ignoring logs folder {:?}",
                    session.path.display(),
                    logs_folder
                )
            });
        }
        Ok(session)
    }

    pub fn session(&self) -> Option<&LogSession> {
        self.session.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.session.get().is_some()
    }

    /// Route events from every thread without a scoped dispatcher into this
    /// session. Returns `false` when no session exists yet or another
    /// global subscriber was installed first.
    pub fn install_global(&self) -> bool {
        let Some(session) = self.session.get() else {
            return false;
        };
        if self.global_installed.swap(true, Ordering::SeqCst) {
            return true;
        }
        tracing::dispatcher::set_global_default(session.dispatch.clone()).is_ok()
    }

    /// Run `f` with this session as the thread's default dispatcher.
    ///
    /// Before `setup` succeeds `f` simply runs against whatever dispatcher
    /// is current.
    pub fn in_session<R>(&self, f: impl FnOnce() -> R) -> R {
        match self.session.get() {
            Some(session) => session.in_scope(f),
            None => f(),
        }
    }

    fn resolve_folder(&self, logs_folder: &str) -> PathBuf {
        if logs_folder.is_empty() {
            paths::default_logs_dir(&self.program_dir)
        } else {
            PathBuf::from(logs_folder)
        }
    }

    fn record_escaped(&self, escaped: &Escaped) {
        match self.session.get() {
            Some(session) => session.in_scope(|| error!("Unhandled exception: {}", escaped.details())),
            None => eprintln!("Unhandled exception: {}", escaped.details()),
        }
    }
}

impl LogSession {
    fn open(folder: &Path) -> Result<Self, LoggingError> {
        fs::create_dir_all(folder).map_err(|source| LoggingError::CreateDir {
            path: folder.to_path_buf(),
            source,
        })?;

        let path = folder.join(log_file_name(Local::now()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LoggingError::OpenFile {
                path: path.clone(),
                source,
            })?;

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .event_format(LineFormat)
            .with_filter(LevelFilter::INFO);

        let console = ConsoleSink::default();
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(console.clone())
            .with_ansi(false)
            .event_format(LineFormat)
            .with_filter(LevelFilter::INFO);

        let subscriber = tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer);

        Ok(Self {
            path,
            dispatch: Dispatch::new(subscriber),
            console,
        })
    }

    /// Path of the log file opened for this process.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand console lines (without the trailing newline) to `tap` instead
    /// of stderr until the returned guard is dropped.
    pub fn tap_console(&self, tap: impl Fn(&str) + Send + Sync + 'static) -> ConsoleTapGuard {
        *self.console.tap.lock() = Some(Arc::new(tap));
        ConsoleTapGuard {
            tap: Arc::clone(&self.console.tap),
        }
    }

    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl fmt::Debug for LogSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSession").field("path", &self.path).finish()
    }
}

/// `logger_<YYYYMMDD_HHMMSS>.log`
pub fn log_file_name<Tz>(now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: fmt::Display,
{
    format!("{}{}.log", LOG_FILE_PREFIX, now.format(LOG_FILE_TIMESTAMP))
}

/// `<timestamp> | <LEVEL> - <message>`
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} | {} - ",
            Local::now().format(LOG_LINE_TIMESTAMP),
            level_name(event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// An error or panic that escaped the entry point's control flow.
#[derive(Debug)]
pub enum Escaped {
    Error(anyhow::Error),
    Panic(String),
}

impl Escaped {
    /// Short message suitable for the user notification.
    pub fn message(&self) -> String {
        match self {
            Escaped::Error(err) => format!("{:#}", err),
            Escaped::Panic(message) => message.clone(),
        }
    }

    fn details(&self) -> String {
        match self {
            Escaped::Error(err) => format!("{:?}", err),
            Escaped::Panic(message) => format!("panic: {}", message),
        }
    }

    /// A user-initiated interrupt (Ctrl-C while a prompt was waiting).
    pub fn is_interrupt(&self) -> bool {
        match self {
            Escaped::Error(err) => err.chain().any(|cause| {
                cause
                    .downcast_ref::<io::Error>()
                    .is_some_and(|io_err| io_err.kind() == io::ErrorKind::Interrupted)
            }),
            Escaped::Panic(_) => false,
        }
    }
}

impl fmt::Display for Escaped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Run the entry point's control flow behind the uncaught-error boundary.
///
/// Errors and panics that reach this point are logged through the session
/// (or stderr when logging never started) and handed back to the caller,
/// which decides how to tell the user. Interrupts are handed back unlogged.
pub fn error_boundary<T>(
    logs: &LogManager,
    body: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, Escaped> {
    let escaped = match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(err)) => Escaped::Error(err),
        Err(payload) => Escaped::Panic(panic_message(payload.as_ref())),
    };

    if !escaped.is_interrupt() {
        logs.record_escaped(&escaped);
    }
    Err(escaped)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;
    use tracing::{info, warn};

    #[test]
    fn test_log_file_name_format() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name(at), "logger_20240309_070501.log");
    }

    #[test]
    fn test_line_format() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path());
        let session = manager.setup("").unwrap();

        manager.in_session(|| {
            info!("hello from the test");
            warn!("careful");
            debug!("filtered out");
        });

        let content = fs::read_to_string(session.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2, "unexpected content: {content}");

        let (timestamp, rest) = lines[0].split_once(" | ").unwrap();
        assert!(
            chrono::NaiveDateTime::parse_from_str(timestamp, LOG_LINE_TIMESTAMP).is_ok(),
            "bad timestamp {timestamp}"
        );
        assert_eq!(rest, "INFO - hello from the test");
        assert!(lines[1].ends_with(" | WARNING - careful"));
    }

    #[test]
    fn test_default_folder_is_beside_program() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path());
        let session = manager.setup("").unwrap();
        assert_eq!(session.path().parent().unwrap(), dir.path().join("logs"));
    }

    #[test]
    fn test_only_empty_folder_selects_default() {
        let manager = LogManager::new("/opt/warden");
        assert_eq!(manager.resolve_folder(""), PathBuf::from("/opt/warden/logs"));
        assert_eq!(manager.resolve_folder(" "), PathBuf::from(" "));
    }

    #[test]
    fn test_console_tap_receives_lines_until_dropped() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path());
        let session = manager.setup("").unwrap();
        let tapped = Arc::new(Mutex::new(Vec::new()));

        let guard = {
            let tapped = Arc::clone(&tapped);
            session.tap_console(move |line| tapped.lock().push(line.to_string()))
        };
        manager.in_session(|| info!("while tapped"));
        drop(guard);
        manager.in_session(|| info!("after tap"));

        let lines = tapped.lock().clone();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" | INFO - while tapped"), "{}", lines[0]);

        let content = fs::read_to_string(session.path()).unwrap();
        assert!(content.contains("while tapped"));
        assert!(content.contains("after tap"));
    }

    #[test]
    fn test_create_dir_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        let manager = LogManager::new(dir.path());
        let err = manager
            .setup(blocker.join("logs").to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, LoggingError::CreateDir { .. }));
        assert!(!manager.is_initialized());
    }

    #[test]
    fn test_error_boundary_logs_errors() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path());
        let session = manager.setup("").unwrap();

        let result: Result<(), Escaped> =
            error_boundary(&manager, || Err(anyhow::anyhow!("disk on fire")));
        let escaped = result.unwrap_err();
        assert_eq!(escaped.message(), "disk on fire");

        let content = fs::read_to_string(session.path()).unwrap();
        assert!(content.contains("| ERROR - Unhandled exception: disk on fire"));
    }

    #[test]
    fn test_error_boundary_catches_panics() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path());
        let session = manager.setup("").unwrap();

        let result: Result<(), Escaped> = error_boundary(&manager, || panic!("boom"));
        assert!(matches!(result, Err(Escaped::Panic(ref msg)) if msg == "boom"));

        let content = fs::read_to_string(session.path()).unwrap();
        assert!(content.contains("Unhandled exception: panic: boom"));
    }

    #[test]
    fn test_error_boundary_skips_interrupts() {
        let dir = tempdir().unwrap();
        let manager = LogManager::new(dir.path());
        let session = manager.setup("").unwrap();

        let result: Result<(), Escaped> = error_boundary(&manager, || {
            Err(anyhow::Error::new(io::Error::from(io::ErrorKind::Interrupted))
                .context("prompt cancelled"))
        });
        let escaped = result.unwrap_err();
        assert!(escaped.is_interrupt());

        let content = fs::read_to_string(session.path()).unwrap();
        assert!(content.is_empty(), "interrupt was logged: {content}");
    }

    #[test]
    fn test_error_boundary_passes_values_through() {
        let manager = LogManager::new(".");
        let value = error_boundary(&manager, || Ok(42)).unwrap();
        assert_eq!(value, 42);
        assert!(!manager.is_initialized());
    }
}
