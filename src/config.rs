use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_LOGS_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "logger_";
pub const LOG_FILE_TIMESTAMP: &str = "%Y%m%d_%H%M%S";
pub const LOG_LINE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S,%3f";
pub const LOGS_FOLDER_KEY: &str = "logs_folder";

pub const DEFAULT_INSTANCE_THRESHOLD: usize = 3;

pub const MAX_INSTANCES_ENV: &str = "TASK_WARDEN_MAX_INSTANCES";
pub const NOTIFY_ENV: &str = "TASK_WARDEN_NOTIFY";
pub const LEGACY_EXIT_CODE_ENV: &str = "TASK_WARDEN_LEGACY_EXIT_CODE";

pub const NOTIFICATION_TITLE: &str = "Notification";

// Worker -> foreground channel sizing. 256 lines is plenty for progress text
// and keeps a runaway task from growing memory without bound.
pub const MESSAGE_CHANNEL_CAPACITY: usize = 256;
pub const WORKER_SEND_TIMEOUT: Duration = Duration::from_millis(200);
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const SUCCESS_EXIT_CODE: i32 = 0;
pub const FAILURE_EXIT_CODE: i32 = 1;
