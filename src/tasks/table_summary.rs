//! Tabular data summary
//!
//! Reads a comma-separated file, logs its shape, and prints the header plus
//! the first rows to the task's stdout.

use crate::config_loader::Config;
use crate::task_runner::{TaskBody, TaskIo};
use anyhow::{bail, Context};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DATA_FILE_KEY: &str = "data_file";
pub const DEFAULT_DATA_FILE: &str = "sample_data.csv";
const PREVIEW_ROWS: usize = 5;

pub struct TableSummary {
    program_dir: PathBuf,
}

/// Shape of a parsed table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableShape {
    pub rows: usize,
    pub columns: usize,
}

impl TableSummary {
    pub fn new(program_dir: impl Into<PathBuf>) -> Self {
        Self {
            program_dir: program_dir.into(),
        }
    }

    fn data_path(&self, config: &Config) -> PathBuf {
        match config.get(DATA_FILE_KEY).and_then(Value::as_str) {
            Some(file) if !file.trim().is_empty() => {
                let path = Path::new(file);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.program_dir.join(path)
                }
            }
            _ => self.program_dir.join(DEFAULT_DATA_FILE),
        }
    }
}

impl TaskBody for TableSummary {
    fn name(&self) -> &str {
        "table-summary"
    }

    fn run(&self, config: &Config, io: &mut TaskIo<'_>) -> anyhow::Result<()> {
        let path = self.data_path(config);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("cannot read data file {}", path.display()))?;

        let shape = table_shape(&content)
            .with_context(|| format!("cannot parse data file {}", path.display()))?;
        info!(
            "Table loaded with {} rows and {} columns.",
            shape.rows, shape.columns
        );

        for line in content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .take(PREVIEW_ROWS + 1)
        {
            writeln!(io.stdout(), "{}", line)?;
        }
        Ok(())
    }
}

/// Count data rows and columns; the first non-blank line is the header.
pub fn table_shape(content: &str) -> anyhow::Result<TableShape> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        bail!("file is empty");
    };
    let columns = header.split(',').count();

    let mut rows = 0;
    for (index, line) in lines.enumerate() {
        let width = line.split(',').count();
        if width != columns {
            bail!(
                "row {} has {} fields, expected {}",
                index + 1,
                width,
                columns
            );
        }
        rows += 1;
    }
    Ok(TableShape { rows, columns })
}
