use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};

fn form_content() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("form-content"))
}

fn bilingual() -> Value {
    json!({
        "survey": [
            {"type": "text", "name": "greeting", "label": ["Hi", "Salut"], "$kuid": "k1"}
        ],
        "choices": [{"list_name": "yn", "name": "yes", "label": ["Yes", "Oui"], "$kuid": "c1"}],
        "settings": {"id_string": "greet", "default_language": "French"},
        "translations": ["English", "French"],
        "translated": ["label"]
    })
}

fn write_form(dir: &Path, content: &Value) -> std::path::PathBuf {
    let path = dir.join("form.json");
    fs::write(&path, serde_json::to_string(content).expect("serialize")).expect("write form");
    path
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout is JSON")
}

#[test]
fn normalize_assigns_row_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_form(
        dir.path(),
        &json!({"survey": [{"type": "text", "name": "q"}], "settings": [{"form_title": "T"}]}),
    );
    let assert = form_content().arg("normalize").arg(&path).assert().success();
    let document = stdout_json(&assert.get_output().stdout);
    let key = document["survey"][0]["$kuid"].as_str().expect("row key");
    assert_eq!(key.len(), 9);
    assert_eq!(document["settings"]["form_title"], json!("T"));
}

#[test]
fn translations_reorder_from_stdin() {
    let assert = form_content()
        .args(["translations", "-", "--set", r#"["French", "English"]"#])
        .write_stdin(bilingual().to_string())
        .assert()
        .success();
    let document = stdout_json(&assert.get_output().stdout);
    assert_eq!(document["translations"], json!(["French", "English"]));
    assert_eq!(document["survey"][0]["label"], json!(["Salut", "Hi"]));
}

#[test]
fn simultaneous_translation_changes_fail() {
    form_content()
        .args(["translations", "--set", r#"["German", "Italian"]"#])
        .write_stdin(bilingual().to_string())
        .assert()
        .failure()
        .stderr(predicate::str::contains("translations_multiple_changes"));
}

#[test]
fn promote_default_moves_language_first() {
    let assert = form_content()
        .arg("promote-default")
        .write_stdin(bilingual().to_string())
        .assert()
        .success();
    let document = stdout_json(&assert.get_output().stdout);
    assert_eq!(document["translations"], json!(["French", "English"]));
    assert_eq!(document["choices"][0]["label"], json!(["Oui", "Yes"]));
}

#[test]
fn rename_translation_writes_to_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_form(dir.path(), &bilingual());
    let out = dir.path().join("nested/renamed.json");
    form_content()
        .arg("rename-translation")
        .arg(&path)
        .args(["--from", "English", "--to", "English (en)", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    let document: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read out")).expect("json");
    assert_eq!(document["translations"], json!(["English (en)", "French"]));
}

#[test]
fn flatten_can_keep_row_keys() {
    let assert = form_content()
        .args(["flatten", "--kobo-specific"])
        .write_stdin(bilingual().to_string())
        .assert()
        .success();
    let content = stdout_json(&assert.get_output().stdout);
    assert_eq!(content["survey"][0]["$kuid"], json!("k1"));
    assert_eq!(content["survey"][0]["label::French"], json!("Salut"));

    let assert = form_content()
        .arg("flatten")
        .write_stdin(bilingual().to_string())
        .assert()
        .success();
    let content = stdout_json(&assert.get_output().stdout);
    assert!(content["survey"][0].get("$kuid").is_none());
}

#[test]
fn save_reports_title_and_content() {
    let mut form = bilingual();
    form["settings"]["form_title"] = json!("Greeting");
    let assert = form_content()
        .arg("save")
        .write_stdin(form.to_string())
        .assert()
        .success();
    let saved = stdout_json(&assert.get_output().stdout);
    assert_eq!(saved["title"], json!("Greeting"));
    assert_eq!(saved["keys_assigned"], json!(0));
    assert_eq!(saved["content"]["translations"], json!(["French", "English"]));
    assert!(saved["content"]["settings"].get("form_title").is_none());
}

#[test]
fn export_writes_json_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_form(dir.path(), &bilingual());
    let out = dir.path().join("form.json.out");
    form_content()
        .arg("export")
        .arg(&path)
        .args(["--format", "json", "--form-title", "Greeting", "--out"])
        .arg(&out)
        .assert()
        .success();
    let tables: Value =
        serde_json::from_str(&fs::read_to_string(&out).expect("read out")).expect("json");
    let names = tables
        .as_array()
        .expect("tables")
        .iter()
        .map(|table| table["name"].clone())
        .collect::<Vec<_>>();
    assert_eq!(names, vec![json!("settings"), json!("choices"), json!("survey")]);
    assert_eq!(tables[0]["header"][0], json!("form_title"));
    assert_eq!(tables[0]["rows"][0][0], json!("Greeting"));
}

#[test]
fn export_writes_a_workbook() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_form(dir.path(), &bilingual());
    let out = dir.path().join("form.xlsx");
    form_content()
        .arg("export")
        .arg(&path)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
    let bytes = fs::read(&out).expect("read workbook");
    assert!(bytes.starts_with(b"PK"));
}

#[test]
fn malformed_input_is_reported() {
    form_content()
        .arg("normalize")
        .write_stdin(r#"{"survey": [1]}"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("survey row 0"));
}

#[test]
fn schema_describes_export_options() {
    form_content()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("kobo_specific"))
        .stdout(predicate::str::contains("settings_defaults"));
}
