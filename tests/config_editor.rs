use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use task_warden::config_loader;
use task_warden::interactive::ConfigEditor;
use tempfile::TempDir;

fn editor_with(content: Value) -> (TempDir, ConfigEditor) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();
    let editor = ConfigEditor::open(&path).expect("config opens");
    (dir, editor)
}

#[test]
fn test_save_stringifies_every_value() {
    let (_dir, mut editor) = editor_with(json!({
        "logs_folder": "",
        "rows": 5,
        "ratio": 0.5,
        "enabled": true,
        "columns": ["a", "b"],
        "name": "daily"
    }));

    editor.save().unwrap();
    let reloaded = config_loader::load(editor.path()).unwrap();

    let keys: Vec<&str> = reloaded.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["logs_folder", "rows", "ratio", "enabled", "columns", "name"]
    );
    assert_eq!(reloaded["logs_folder"], json!(""));
    assert_eq!(reloaded["rows"], json!("5"));
    assert_eq!(reloaded["ratio"], json!("0.5"));
    assert_eq!(reloaded["enabled"], json!("true"));
    assert_eq!(reloaded["columns"], json!("[\"a\",\"b\"]"));
    assert_eq!(reloaded["name"], json!("daily"));
    assert!(reloaded.values().all(Value::is_string));
}

#[test]
fn test_edits_are_limited_to_existing_keys() {
    let (_dir, mut editor) = editor_with(json!({"rows": 5, "logs_folder": ""}));

    assert!(editor.set_field("rows", "12"));
    assert!(!editor.set_field("unknown", "x"));
    editor.save().unwrap();

    let reloaded = config_loader::load(editor.path()).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded["rows"], json!("12"));
    assert!(reloaded.get("unknown").is_none());
}

#[test]
fn test_reload_discards_unsaved_edits() {
    let (_dir, mut editor) = editor_with(json!({"rows": 5}));
    editor.set_field("rows", "99");
    editor.reload().unwrap();
    assert_eq!(
        editor.fields(),
        vec![("rows".to_string(), "5".to_string())]
    );
}
