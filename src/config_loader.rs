//! Configuration loading
//!
//! The configuration is a single JSON document whose top level must be a
//! non-empty object. Keys and values are passed through to the task body
//! verbatim, in file order.

use crate::config::LOGS_FOLDER_KEY;
use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::Path;

pub use crate::utils::paths::config_path;

/// Ordered mapping from keys to arbitrary JSON values.
pub type Config = Map<String, Value>;

/// Load and validate the configuration file at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    parse(path, &content)
}

fn parse(path: &Path, content: &str) -> Result<Config, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value =
        serde_json::from_str(content).map_err(|err| invalid(format!("not valid JSON ({err})")))?;

    match value {
        Value::Object(map) if map.is_empty() => Err(invalid("configuration is empty".to_string())),
        Value::Object(map) => Ok(map),
        other => Err(invalid(format!(
            "top-level value must be an object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Textual form of a value as shown in the editor.
///
/// Strings are shown without quotes, everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Collapse every value to its textual form.
///
/// This is what the editor stores: after one save/load cycle a number `5`
/// comes back as the string `"5"`.
pub fn stringify(config: &Config) -> Config {
    config
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(display_value(value))))
        .collect()
}

/// Write `config` to `path` with every value stringified.
///
/// Returns the mapping exactly as written.
pub fn save_stringified(path: impl AsRef<Path>, config: &Config) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let stored = stringify(config);
    let io_error = |source: io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut text = serde_json::to_string_pretty(&stored).map_err(|err| io_error(err.into()))?;
    text.push('\n');
    fs::write(path, text).map_err(io_error)?;
    Ok(stored)
}

/// Logs folder requested by the configuration.
///
/// Absent or non-string values mean "use the default folder".
pub fn logs_folder(config: &Config) -> &str {
    config
        .get(LOGS_FOLDER_KEY)
        .and_then(Value::as_str)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_preserves_order() {
        let config = parse(Path::new("c.json"), r#"{"z": 1, "a": [1, 2], "m": {"k": null}}"#)
            .expect("valid config");
        let keys: Vec<_> = config.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(config["a"], json!([1, 2]));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse(Path::new("c.json"), "{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("plain")), "plain");
        assert_eq!(display_value(&json!(5)), "5");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!([1, "a"])), r#"[1,"a"]"#);
        assert_eq!(display_value(&Value::Null), "null");
    }

    #[test]
    fn test_logs_folder() {
        let mut config = Config::new();
        assert_eq!(logs_folder(&config), "");
        config.insert(LOGS_FOLDER_KEY.to_string(), json!(42));
        assert_eq!(logs_folder(&config), "");
        config.insert(LOGS_FOLDER_KEY.to_string(), json!("/var/log/warden"));
        assert_eq!(logs_folder(&config), "/var/log/warden");
    }
}
