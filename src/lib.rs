//! Task Warden Library
//!
//! Background task supervisor: instance arbitration across the host,
//! once-only logging, config-driven task execution with captured output,
//! and a terminal outcome notification.

pub mod config;
pub mod config_loader;
pub mod core;
pub mod error;
pub mod instance_guard;
pub mod interactive;
pub mod logging;
pub mod notification;
pub mod platform;
pub mod supervisor;
pub mod task_result;
pub mod task_runner;
pub mod tasks;
pub mod utils;

// Re-export commonly used types for convenience
pub use config_loader::Config;
pub use crate::core::models::ProcessRecord;
pub use error::{ConfigError, ErrorCategory, LoggingError, WardenError};
pub use instance_guard::{InstanceGuard, PeerSource, PeerTerminator, Verdict};
pub use logging::{error_boundary, Escaped, LogManager, LogSession};
pub use notification::{ExitPolicy, NotificationSink, Outcome};
pub use supervisor::{SupervisedRun, Supervisor, SupervisorMessage};
pub use task_result::{OutputLine, TaskResult};
pub use task_runner::{CaptureMode, TaskBody, TaskIo, TaskRunner};
