use pretty_assertions::assert_eq;
use std::fs;
use task_warden::config_loader::{self, logs_folder};
use task_warden::error::ConfigError;
use tempfile::TempDir;
use test_case::test_case;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    fs::write(&path, content).expect("write config");
    path
}

#[test_case("[1, 2, 3]" ; "array root")]
#[test_case("\"text\"" ; "string root")]
#[test_case("42" ; "number root")]
#[test_case("null" ; "null root")]
#[test_case("true" ; "boolean root")]
#[test_case("{}" ; "empty object")]
#[test_case("{\"logs_folder\": " ; "truncated json")]
fn test_rejected_documents_are_invalid(content: &str) {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, content);

    let err = config_loader::load(&path).expect_err("document must be rejected");
    assert!(
        matches!(err, ConfigError::Invalid { .. }),
        "unexpected error for {content}: {err:?}"
    );
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    match config_loader::load(&path) {
        Err(ConfigError::NotFound { path: reported }) => assert_eq!(reported, path),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_existing_file_is_never_not_found() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "not json at all");
    assert!(!matches!(
        config_loader::load(&path),
        Err(ConfigError::NotFound { .. })
    ));
}

#[test]
fn test_values_pass_through_verbatim() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"rows": 5, "logs_folder": "/var/log/warden", "nested": {"a": [true, null]}}"#,
    );

    let config = config_loader::load(&path).unwrap();
    let keys: Vec<&str> = config.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["rows", "logs_folder", "nested"]);
    assert_eq!(config["rows"], serde_json::json!(5));
    assert_eq!(config["nested"], serde_json::json!({"a": [true, null]}));
    assert_eq!(logs_folder(&config), "/var/log/warden");
}

#[test_case(r#"{"rows": 1}"# ; "absent")]
#[test_case(r#"{"logs_folder": ""}"# ; "empty string")]
#[test_case(r#"{"logs_folder": 7}"# ; "not a string")]
fn test_default_logs_folder(content: &str) {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, content);
    let config = config_loader::load(&path).unwrap();
    assert_eq!(logs_folder(&config), "");
}
