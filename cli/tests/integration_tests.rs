use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_schema-resolve");

/// Writes a JSON schema file into `dir`.
fn write_schema(dir: &TempDir, name: &str, schema: Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(&schema).unwrap())
        .expect("failed to write schema");
    path
}

fn write_text(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).expect("failed to write file");
    path
}

/// Runs the binary inside `cwd` so no stray config file is picked up.
fn run(cwd: &Path, args: &[&str]) -> Output {
    Command::new(BIN)
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("failed to run schema-resolve")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

#[test]
fn resolve_upgrades_map_to_record() {
    let dir = tempfile::tempdir().unwrap();
    let current = write_schema(&dir, "current.json", json!({"_type": "map", "_value": "integer"}));
    let update = write_schema(&dir, "update.json", json!({"a": 1, "b": 2}));

    let output = run(
        dir.path(),
        &["resolve", "--current", current.to_str().unwrap(), "--update", update.to_str().unwrap()],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout_json(&output),
        json!({"a": 1, "b": 2, "_default": {"a": 1, "b": 2}})
    );
}

#[test]
fn resolve_nests_tree_entries() {
    let dir = tempfile::tempdir().unwrap();
    let current = write_schema(
        &dir,
        "current.json",
        json!({"_type": "tree", "_leaf": "integer", "_default": {}}),
    );
    let update = write_schema(&dir, "update.json", json!({"x": 5, "y": {"z": 6}}));

    let output = run(
        dir.path(),
        &[
            "resolve",
            "--pretty",
            "--current",
            current.to_str().unwrap(),
            "--update",
            update.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout_json(&output),
        json!({"_type": "tree", "_leaf": "integer", "_default": {"x": 5, "y": {"z": 6}}})
    );
}

#[test]
fn resolve_conflict_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let current = write_schema(&dir, "current.json", json!("string"));
    let update = write_schema(&dir, "update.json", json!("boolean"));

    let output = run(
        dir.path(),
        &["resolve", "--current", current.to_str().unwrap(), "--update", update.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let err = stderr(&output);
    assert!(err.contains("error:"), "stderr: {err}");
    assert!(err.contains("cannot resolve string against boolean"), "stderr: {err}");
}

#[test]
fn resolve_reports_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let update = write_schema(&dir, "update.json", json!("integer"));

    let output = run(
        dir.path(),
        &["resolve", "--current", "absent.json", "--update", update.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to read 'absent.json'"));
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_registers_extra_variants() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_text(&dir, "resolve.yml", "variants:\n  - name: counter\n    parent: integer\n");
    let current = write_schema(&dir, "current.json", json!("number"));
    let update = write_schema(&dir, "update.json", json!("counter"));

    let output = run(
        dir.path(),
        &[
            "resolve",
            "--config",
            config.to_str().unwrap(),
            "--current",
            current.to_str().unwrap(),
            "--update",
            update.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout_json(&output), json!("counter"));
}

#[test]
fn default_config_file_disables_struct_upgrade() {
    let dir = tempfile::tempdir().unwrap();
    write_text(&dir, ".schema-resolve.yml", "options:\n  struct_upgrade: false\n");
    let current = write_schema(&dir, "current.json", json!({"_type": "map", "_value": "integer"}));
    let update = write_schema(&dir, "update.json", json!({"a": 1}));

    let output = run(
        dir.path(),
        &["resolve", "--current", current.to_str().unwrap(), "--update", update.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("cannot resolve `a`"), "stderr: {}", stderr(&output));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_text(&dir, "resolve.yml", "variants:\n  - name: orphan\n    parent: ghost\n");

    let output = run(dir.path(), &["variants", "--config", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("ghost"), "stderr: {}", stderr(&output));
}

#[test]
fn config_writes_effective_configuration() {
    let dir = tempfile::tempdir().unwrap();
    write_text(
        &dir,
        ".schema-resolve.yml",
        "options:\n  struct_upgrade: false\nvariants:\n  - name: counter\n    parent: integer\n",
    );
    let out = dir.path().join("effective.yml");

    let output = run(dir.path(), &["config", "--output", out.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let written: Value = serde_yaml::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["options"]["struct_upgrade"], json!(false));
    assert_eq!(written["options"]["nest_tree_entries"], json!(true));
    assert_eq!(written["variants"][0]["name"], json!("counter"));
    assert_eq!(written["variants"][0]["parent"], json!("integer"));
}

#[test]
fn config_prints_defaults_without_file() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(dir.path(), &["config"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let printed: Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(
        printed,
        json!({"options": {"struct_upgrade": true, "nest_tree_entries": true}})
    );
}

// ---------------------------------------------------------------------------
// default
// ---------------------------------------------------------------------------

#[test]
fn default_prints_rule_state() {
    let dir = tempfile::tempdir().unwrap();
    let tuple = write_schema(
        &dir,
        "tuple.json",
        json!({"_type": "tuple", "_values": ["integer", "boolean", {"_type": "map", "_value": "string"}]}),
    );

    let output = run(dir.path(), &["default", tuple.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout_json(&output), json!([0, false, {}]));
}

#[test]
fn default_prefers_declared_state() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_schema(
        &dir,
        "tree.json",
        json!({"_type": "tree", "_leaf": "float", "_default": {"a": {"b": 1.5}}}),
    );

    let output = run(dir.path(), &["default", tree.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout_json(&output), json!({"a": {"b": 1.5}}));
}

// ---------------------------------------------------------------------------
// batch
// ---------------------------------------------------------------------------

#[test]
fn batch_resolves_every_pair() {
    let dir = tempfile::tempdir().unwrap();
    let batch = write_text(
        &dir,
        "batch.yml",
        r#"
- name: refine
  current: number
  update: integer
- name: union
  current: {x: 1}
  update: {y: 2}
- name: only-update
  update: boolean
"#,
    );

    let output = run(dir.path(), &["batch", batch.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout_json(&output),
        json!([
            {"name": "refine", "ok": true, "schema": "integer"},
            {"name": "union", "ok": true, "schema": {"x": 1, "y": 2}},
            {"name": "only-update", "ok": true, "schema": "boolean"},
        ])
    );
}

#[test]
fn batch_reports_failures_and_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let batch = write_schema(
        &dir,
        "batch.json",
        json!([
            {"name": "ok", "current": "string", "update": {"_type": "enum", "_values": ["a", "b"]}},
            {"name": "clash", "current": "string", "update": "boolean"},
        ]),
    );

    let output = run(dir.path(), &["batch", batch.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let report = stdout_json(&output);
    let entries = report.as_array().unwrap();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0]["ok"], json!(true));
    assert_eq!(entries[0]["schema"]["_type"], json!("enum"));

    assert_eq!(entries[1]["name"], json!("clash"));
    assert_eq!(entries[1]["ok"], json!(false));
    assert!(entries[1].get("schema").is_none());
    assert!(entries[1]["error"].as_str().unwrap().contains("string against boolean"));

    assert!(stderr(&output).contains("1 of 2 pairs failed"));
}

// ---------------------------------------------------------------------------
// variants
// ---------------------------------------------------------------------------

#[test]
fn variants_lists_builtin_catalog() {
    let dir = tempfile::tempdir().unwrap();

    let output = run(dir.path(), &["variants"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let wires = stdout
        .lines()
        .find(|line| line.starts_with("wires "))
        .expect("wires variant listed");
    assert!(wires.contains("tree"));
    assert!(wires.contains("_leaf:schema"));

    let edge = stdout.lines().find(|line| line.starts_with("edge ")).unwrap();
    assert!(edge.contains("_inputs:schema,_outputs:schema"));
}
