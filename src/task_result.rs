use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of task output, tagged with the stream it was written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stream", content = "text", rename_all = "snake_case")]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(text) | OutputLine::Stderr(text) => text,
        }
    }

    /// Text as shown in the supervised log view; stderr lines carry a tag.
    pub fn render(&self) -> String {
        match self {
            OutputLine::Stdout(text) => text.clone(),
            OutputLine::Stderr(text) => format!("Info: {}", text),
        }
    }
}

/// Outcome of one task execution. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    run_id: Uuid,
    task_name: String,
    success: bool,
    stdout: String,
    stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn success(
        task_name: impl Into<String>,
        started_at: DateTime<Utc>,
        stdout: String,
        stderr: String,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task_name: task_name.into(),
            success: true,
            stdout,
            stderr,
            error: None,
            trace: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn failure(
        task_name: impl Into<String>,
        started_at: DateTime<Utc>,
        stdout: String,
        stderr: String,
        error: String,
        trace: Option<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task_name: task_name.into(),
            success: false,
            stdout,
            stderr,
            error: Some(error),
            trace,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Non-blank output lines, stdout first, then stderr.
    pub fn output_lines(&self) -> Vec<OutputLine> {
        let stdout = split_lines(&self.stdout).map(OutputLine::Stdout);
        let stderr = split_lines(&self.stderr).map(OutputLine::Stderr);
        stdout.chain(stderr).collect()
    }

    /// Message presented to the user at the end of a run.
    pub fn summary(&self) -> String {
        match &self.error {
            None if self.success => "Process completed successfully!".to_string(),
            Some(error) => format!("Error occurred: {}", error),
            None => "Error occurred: task reported failure".to_string(),
        }
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_lines_order_and_tagging() {
        let result = TaskResult::success(
            "demo",
            Utc::now(),
            "first\n\n  \nsecond\n".to_string(),
            "warning: slow\r\n".to_string(),
        );

        let lines = result.output_lines();
        assert_eq!(
            lines,
            vec![
                OutputLine::Stdout("first".to_string()),
                OutputLine::Stdout("second".to_string()),
                OutputLine::Stderr("warning: slow".to_string()),
            ]
        );
        assert_eq!(lines[2].render(), "Info: warning: slow");
        assert_eq!(lines[0].render(), "first");
    }

    #[test]
    fn test_summary_messages() {
        let ok = TaskResult::success("demo", Utc::now(), String::new(), String::new());
        assert_eq!(ok.summary(), "Process completed successfully!");
        assert!(ok.error().is_none());

        let failed = TaskResult::failure(
            "demo",
            Utc::now(),
            String::new(),
            String::new(),
            "missing column".to_string(),
            None,
        );
        assert!(!failed.is_success());
        assert_eq!(failed.summary(), "Error occurred: missing column");
    }

    #[test]
    fn test_serialization_skips_empty_error() {
        let result = TaskResult::success("demo", Utc::now(), "out".to_string(), String::new());
        let json = serde_json::to_value(&result).expect("serialize");
        assert!(json.get("error").is_none());
        assert_eq!(json["task_name"], "demo");

        let back: TaskResult = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, result);
        assert!(back.finished_at() >= back.started_at());
    }
}
