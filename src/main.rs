use std::sync::Arc;
use task_warden::instance_guard::InstanceGuard;
use task_warden::logging::{error_boundary, LogManager};
use task_warden::notification::{notifier_from_env, ExitPolicy, Outcome};
use task_warden::supervisor::Supervisor;
use task_warden::task_runner::TaskRunner;
use task_warden::tasks::TableSummary;
use tracing::info;

fn main() {
    let logs = Arc::new(LogManager::for_current_exe());
    let notifier = notifier_from_env();
    let policy = ExitPolicy::from_env();

    let runner = TaskRunner::new(Arc::new(TableSummary::new(logs.program_dir())));
    let supervisor = Supervisor::new(Arc::clone(&logs), runner);
    let guard = InstanceGuard::for_current_process();

    let outcome = match error_boundary(&logs, || {
        Ok(supervisor.run_headless(&guard, notifier.as_ref()))
    }) {
        Ok(outcome) => outcome,
        Err(escaped) => Outcome::failure(format!("Error occurred: {}", escaped)),
    };

    logs.in_session(|| {
        info!(
            "Exiting with code {} ({})",
            outcome.exit_code(policy),
            if outcome.is_success() { "success" } else { "failure" }
        )
    });
    notifier.finish(&outcome, policy)
}
