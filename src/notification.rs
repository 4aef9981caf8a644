//! Terminal outcome notification
//!
//! Every run ends with exactly one user-visible message, acknowledged by
//! the user when someone is at the terminal, followed by process exit.

use crate::config::{FAILURE_EXIT_CODE, NOTIFICATION_TITLE, SUCCESS_EXIT_CODE};
use crate::utils::env;
use console::{style, Term};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// How the run ended, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Outcome::Success(message.into())
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Success(message) | Outcome::Failure(message) => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn exit_code(&self, policy: ExitPolicy) -> i32 {
        match (policy, self) {
            (ExitPolicy::Legacy, _) => FAILURE_EXIT_CODE,
            (ExitPolicy::Conventional, Outcome::Success(_)) => SUCCESS_EXIT_CODE,
            (ExitPolicy::Conventional, Outcome::Failure(_)) => FAILURE_EXIT_CODE,
        }
    }
}

/// Exit-code policy.
///
/// `Legacy` reproduces older releases, which exited non-zero even after a
/// successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    #[default]
    Conventional,
    Legacy,
}

impl ExitPolicy {
    pub fn from_env() -> Self {
        if env::legacy_exit_code() {
            ExitPolicy::Legacy
        } else {
            ExitPolicy::Conventional
        }
    }
}

pub trait NotificationSink: Send + Sync {
    /// Present `message` and block until the user acknowledges it.
    fn notify(&self, message: &str);

    /// Present the outcome, then terminate the process.
    fn finish(&self, outcome: &Outcome, policy: ExitPolicy) -> ! {
        self.notify(outcome.message());
        std::process::exit(outcome.exit_code(policy))
    }
}

/// Framed message on stderr; waits for Enter when a user is attached.
pub struct ConsoleNotifier {
    term: Term,
    wait_for_ack: bool,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            wait_for_ack: console::user_attended_stderr(),
        }
    }

    /// Never waits for acknowledgement.
    pub fn unattended() -> Self {
        Self {
            term: Term::stderr(),
            wait_for_ack: false,
        }
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleNotifier {
    fn present(&self, message: &str, wait_for_ack: bool) {
        let banner = format!("──── {} ────", NOTIFICATION_TITLE);
        let mut lines = vec![style(banner).bold().to_string(), message.to_string()];
        if wait_for_ack {
            lines.push(style("Press Enter to acknowledge.").dim().to_string());
        }

        for line in &lines {
            if self.term.write_line(line).is_err() {
                // stderr is gone; nothing else can show the message
                return;
            }
        }

        if wait_for_ack {
            if let Err(err) = self.term.read_line() {
                warn!("Could not read acknowledgement: {}", err);
            }
        }
    }
}

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, message: &str) {
        self.present(message, self.wait_for_ack);
    }
}

/// Desktop notification, echoed on the console.
///
/// On XDG desktops the notification stays up until the user dismisses it
/// and the console copy does not wait again. Elsewhere, or when no
/// notification server answers, the console acknowledgement applies.
pub struct DesktopNotifier {
    console: ConsoleNotifier,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            console: ConsoleNotifier::new(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for DesktopNotifier {
    fn notify(&self, message: &str) {
        let mut notification = notify_rust::Notification::new();
        notification
            .appname(env!("CARGO_PKG_NAME"))
            .summary(NOTIFICATION_TITLE)
            .body(message);
        #[cfg(all(unix, not(target_os = "macos")))]
        notification
            .action("default", "OK")
            .timeout(notify_rust::Timeout::Never);

        let acknowledged = match notification.show() {
            #[cfg(all(unix, not(target_os = "macos")))]
            Ok(handle) => {
                handle.wait_for_action(|action| debug!("Notification closed ({})", action));
                true
            }
            #[cfg(not(all(unix, not(target_os = "macos"))))]
            Ok(_) => false,
            Err(err) => {
                warn!("Desktop notification failed: {}", err);
                false
            }
        };
        self.console
            .present(message, !acknowledged && self.console.wait_for_ack);
    }
}

/// Keeps messages in memory; used when embedding the supervisor.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Console,
    Desktop,
}

impl Backend {
    /// Desktop when requested, or when nobody watches stderr.
    pub fn select(desktop_requested: bool, stderr_attended: bool) -> Self {
        if desktop_requested || !stderr_attended {
            Backend::Desktop
        } else {
            Backend::Console
        }
    }
}

/// Notification backend for this process: `TASK_WARDEN_NOTIFY=desktop`, or
/// desktop anyway when stderr is not a terminal.
pub fn notifier_from_env() -> Box<dyn NotificationSink> {
    match Backend::select(env::desktop_notifications(), console::user_attended_stderr()) {
        Backend::Desktop => Box::new(DesktopNotifier::new()),
        Backend::Console => Box::new(ConsoleNotifier::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(false, true => Backend::Console ; "attended terminal")]
    #[test_case(false, false => Backend::Desktop ; "no terminal")]
    #[test_case(true, true => Backend::Desktop ; "requested")]
    #[test_case(true, false => Backend::Desktop ; "requested without terminal")]
    fn test_backend_selection(desktop_requested: bool, attended: bool) -> Backend {
        Backend::select(desktop_requested, attended)
    }

    #[test]
    fn test_conventional_exit_codes() {
        let ok = Outcome::success("Process completed successfully!");
        let bad = Outcome::failure("Error occurred: boom");
        assert_eq!(ok.exit_code(ExitPolicy::Conventional), 0);
        assert_eq!(bad.exit_code(ExitPolicy::Conventional), 1);
    }

    #[test]
    fn test_legacy_exit_codes_are_constant() {
        let ok = Outcome::success("done");
        let bad = Outcome::failure("failed");
        assert_eq!(ok.exit_code(ExitPolicy::Legacy), 1);
        assert_eq!(bad.exit_code(ExitPolicy::Legacy), 1);
    }

    #[test]
    fn test_recording_notifier() {
        let notifier = RecordingNotifier::new();
        notifier.notify("first");
        notifier.notify("second");
        assert_eq!(notifier.messages(), vec!["first", "second"]);
    }

    #[test]
    fn test_unattended_console_does_not_block() {
        ConsoleNotifier::unattended().notify("nobody is watching");
    }
}
