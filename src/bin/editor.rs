use std::process::ExitCode;
use std::sync::Arc;
use task_warden::interactive;
use task_warden::logging::{error_boundary, LogManager};
use task_warden::notification::{ConsoleNotifier, NotificationSink};
use task_warden::supervisor::Supervisor;
use task_warden::task_runner::TaskRunner;
use task_warden::tasks::TableSummary;

fn main() -> ExitCode {
    if let Err(err) = color_eyre::install() {
        eprintln!("Failed to install error handler: {}", err);
    }

    let logs = Arc::new(LogManager::for_current_exe());
    let runner = TaskRunner::new(Arc::new(TableSummary::new(logs.program_dir())));
    let supervisor = Supervisor::new(Arc::clone(&logs), runner);

    match error_boundary(&logs, || interactive::run(&supervisor)) {
        Ok(()) => ExitCode::SUCCESS,
        // Ctrl-C at a prompt
        Err(escaped) if escaped.is_interrupt() => ExitCode::from(130),
        Err(escaped) => {
            ConsoleNotifier::new().notify(&format!("Failed to start editor: {}", escaped));
            ExitCode::FAILURE
        }
    }
}
