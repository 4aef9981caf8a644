//! Environment variable knobs.

use crate::config::{
    DEFAULT_INSTANCE_THRESHOLD, LEGACY_EXIT_CODE_ENV, MAX_INSTANCES_ENV, NOTIFY_ENV,
};
use tracing::warn;

/// Maximum number of peer instances allowed to run alongside this one.
///
/// Reads `TASK_WARDEN_MAX_INSTANCES`; invalid values fall back to the default.
pub fn instance_threshold() -> usize {
    match std::env::var(MAX_INSTANCES_ENV) {
        Ok(raw) => parse_threshold(&raw).unwrap_or_else(|| {
            warn!(
                "Ignoring {}={:?}: expected a non-negative integer",
                MAX_INSTANCES_ENV, raw
            );
            DEFAULT_INSTANCE_THRESHOLD
        }),
        Err(_) => DEFAULT_INSTANCE_THRESHOLD,
    }
}

fn parse_threshold(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()
}

/// Whether the desktop notification backend was requested.
pub fn desktop_notifications() -> bool {
    std::env::var(NOTIFY_ENV)
        .map(|value| value.trim().eq_ignore_ascii_case("desktop"))
        .unwrap_or(false)
}

/// Whether the constant non-zero exit code of older releases is requested.
pub fn legacy_exit_code() -> bool {
    std::env::var(LEGACY_EXIT_CODE_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
