use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn write_document(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write document");
    path
}

#[test]
fn check_accepts_a_valid_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_document(
        &dir,
        "person.json",
        r#"{
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"],
            "additionalProperties": false
        }"#,
    );

    Command::cargo_bin("structo")
        .expect("binary")
        .args(["check", path.to_str().expect("path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok (object, 1 properties)"));
}

#[test]
fn check_rejects_an_unknown_type_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_document(&dir, "bad.json", r#"{ "type": "bogus" }"#);

    Command::cargo_bin("structo")
        .expect("binary")
        .args(["check", path.to_str().expect("path")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized type name 'bogus'"));
}

#[test]
fn fmt_reduces_a_ref_node_to_the_reference_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_document(
        &dir,
        "ref.json",
        r##"{ "$ref": "#/$defs/Person", "description": "dropped on the wire" }"##,
    );

    Command::cargo_bin("structo")
        .expect("binary")
        .args(["fmt", path.to_str().expect("path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("#/$defs/Person"))
        .stdout(predicate::str::contains("description").not());
}

#[test]
fn fmt_write_rewrites_the_file_in_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_document(
        &dir,
        "inventory.json",
        r#"{ "type": "object", "properties": { "sku": { "type": "string" } }, "x-unknown": 1 }"#,
    );

    Command::cargo_bin("structo")
        .expect("binary")
        .args(["fmt", "--write", path.to_str().expect("path")])
        .assert()
        .success();

    let rewritten = fs::read_to_string(&path).expect("read rewritten file");
    assert!(rewritten.contains("\"sku\""));
    assert!(!rewritten.contains("x-unknown"));
}
