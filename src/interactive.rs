//! Interactive configuration editor
//!
//! Terminal front end over the configuration file: edit values, save, and
//! run the task on a background worker while its output streams into the
//! terminal.
//!
//! Saving stores every value as a string (see
//! [`config_loader::save_stringified`]); a number edited here comes back as
//! text on the next load.

use crate::config_loader::{self, Config};
use crate::error::{ConfigError, WardenError};
use crate::supervisor::{Supervisor, SupervisorMessage};
use crate::task_result::TaskResult;
use anyhow::Context;
use console::{style, Term};
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// Editable in-memory copy of a configuration file.
#[derive(Debug, Clone)]
pub struct ConfigEditor {
    path: PathBuf,
    config: Config,
}

impl ConfigEditor {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = config_loader::load(&path)?;
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Keys with the text shown for each value, in file order.
    pub fn fields(&self) -> Vec<(String, String)> {
        self.config
            .iter()
            .map(|(key, value)| (key.clone(), config_loader::display_value(value)))
            .collect()
    }

    /// Replace the value of an existing key with `text`.
    ///
    /// Returns `false` for unknown keys; the key set is fixed by the file.
    pub fn set_field(&mut self, key: &str, text: &str) -> bool {
        match self.config.get_mut(key) {
            Some(value) => {
                *value = Value::String(text.to_string());
                true
            }
            None => false,
        }
    }

    /// Write the configuration back, every value stringified.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        self.config = config_loader::save_stringified(&self.path, &self.config)?;
        Ok(())
    }

    /// Discard edits and read the file again.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.config = config_loader::load(&self.path)?;
        Ok(())
    }
}

const ACTIONS: [&str; 5] = [
    "Edit value",
    "Save config",
    "Run program",
    "Load config",
    "Quit",
];

/// Run the editor until the user quits.
pub fn run(supervisor: &Supervisor) -> anyhow::Result<()> {
    let term = Term::stdout();
    let Some(mut editor) = open_or_select(&term, supervisor.config_path())? else {
        say(&term, "User cancelled operation, program exits");
        return Ok(());
    };
    say(&term, "Configuration loaded");

    loop {
        show_fields(&term, &editor)?;
        let action = Select::new()
            .with_prompt("Action")
            .items(&ACTIONS)
            .default(2)
            .interact_on(&term)?;

        match action {
            0 => edit_field(&term, &mut editor)?,
            1 => save(&term, &mut editor)?,
            2 => run_task(&term, supervisor, &mut editor)?,
            3 => match editor.reload() {
                Ok(()) => say(&term, "Configuration loaded"),
                Err(err) => {
                    say(&term, &format!("Failed to load configuration: {}", err));
                    match open_or_select(&term, editor.path())? {
                        Some(reopened) => editor = reopened,
                        None => {
                            say(&term, "User cancelled operation, program exits");
                            return Ok(());
                        }
                    }
                }
            },
            _ => return Ok(()),
        }
    }
}

/// Load `path`, asking the user for another file until one loads.
///
/// `None` means the user chose to exit.
fn open_or_select(term: &Term, path: &Path) -> anyhow::Result<Option<ConfigEditor>> {
    let mut candidate = path.to_path_buf();
    loop {
        let err = match ConfigEditor::open(&candidate) {
            Ok(editor) => return Ok(Some(editor)),
            Err(err) => WardenError::from(err),
        };

        let prompt = match &err {
            WardenError::Config(ConfigError::NotFound { path }) => {
                say(term, "Error: Configuration file does not exist!");
                format!(
                    "Configuration file '{}' does not exist. Select an existing configuration file?",
                    path.display()
                )
            }
            other => {
                say(term, &format!("Failed to load configuration: {}", other));
                format!(
                    "{} Select another configuration file?",
                    other.user_message()
                )
            }
        };

        let retry = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact_on(term)?;
        if !retry || !err.is_recoverable() {
            return Ok(None);
        }

        let selected: String = Input::new()
            .with_prompt("Configuration file path")
            .with_initial_text(candidate.to_string_lossy())
            .interact_text_on(term)?;
        let selected = selected.trim();
        if selected.is_empty() {
            say(term, "User cancelled configuration file selection, program exits");
            return Ok(None);
        }
        candidate = PathBuf::from(selected);
    }
}

fn show_fields(term: &Term, editor: &ConfigEditor) -> anyhow::Result<()> {
    term.write_line(&format!(
        "{} {}",
        style("Configuration Parameters").bold(),
        style(editor.path().display()).dim()
    ))?;
    for (key, value) in editor.fields() {
        term.write_line(&format!("  {}: {}", style(key).cyan(), value))?;
    }
    Ok(())
}

fn edit_field(term: &Term, editor: &mut ConfigEditor) -> anyhow::Result<()> {
    let fields = editor.fields();
    let keys: Vec<&str> = fields.iter().map(|(key, _)| key.as_str()).collect();
    let index = Select::new()
        .with_prompt("Parameter")
        .items(&keys)
        .default(0)
        .interact_on(term)?;

    let (key, current) = &fields[index];
    let text: String = Input::new()
        .with_prompt(key.as_str())
        .with_initial_text(current.as_str())
        .allow_empty(true)
        .interact_text_on(term)?;
    editor.set_field(key, &text);
    Ok(())
}

fn save(term: &Term, editor: &mut ConfigEditor) -> anyhow::Result<()> {
    match editor.save() {
        Ok(()) => {
            say(term, "Input configuration saved to file");
            say(
                term,
                &format!(
                    "Configuration successfully saved to {}",
                    editor.path().display()
                ),
            );
        }
        Err(err) => say(term, &format!("Failed to save configuration: {}", err)),
    }
    Ok(())
}

fn run_task(
    term: &Term,
    supervisor: &Supervisor,
    editor: &mut ConfigEditor,
) -> anyhow::Result<()> {
    if editor.config().is_empty() {
        say(term, "No configuration data, please load configuration file first");
        return Ok(());
    }
    save(term, editor)?;

    let config = editor.config().clone();
    let parameters = serde_json::to_string(&config)?;
    let run = supervisor
        .spawn_supervised(config)
        .context("failed to start task worker")?;
    say(term, "Starting main program...");
    say(term, &format!("Using parameters: {}", parameters));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Running...");

    let result = run.drain(
        |message| {
            if let Some(line) = render(&message) {
                spinner.println(line);
            }
            spinner.tick();
        },
        || spinner.tick(),
    );
    spinner.finish_and_clear();

    report(term, &result);
    supervisor
        .logs()
        .in_session(|| info!("Supervised run {} finished", result.run_id()));
    Ok(())
}

fn render(message: &SupervisorMessage) -> Option<String> {
    match message {
        SupervisorMessage::Status(text) => Some(text.clone()),
        SupervisorMessage::Output(line) => Some(line.render()),
        SupervisorMessage::Dropped(count) => {
            Some(format!("({} output lines dropped while the view was busy)", count))
        }
        SupervisorMessage::Finished(_) => None,
    }
}

fn report(term: &Term, result: &TaskResult) {
    if result.is_success() {
        say(term, "Main program execution completed");
        return;
    }
    say(
        term,
        &format!(
            "Error occurred while running main program: {}",
            result.error().unwrap_or("unknown error")
        ),
    );
    if let Some(trace) = result.trace() {
        say(term, &format!("Detailed error information: {}", trace));
    }
}

fn say(term: &Term, message: &str) {
    // The terminal is the only place this text goes.
    let _ = term.write_line(message);
}
