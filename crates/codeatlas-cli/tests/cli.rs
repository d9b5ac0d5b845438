//! CLI integration tests.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn codeatlas() -> Command {
    Command::cargo_bin("codeatlas").expect("binary built")
}

#[test]
fn test_languages_lists_extension_table() {
    codeatlas()
        .arg("languages")
        .assert()
        .success()
        .stdout(predicate::str::contains("TypeScript"))
        .stdout(predicate::str::contains(".tf"))
        .stdout(predicate::str::contains("Dockerfile*"));
}

#[test]
fn test_analyze_writes_map_to_stdout() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.py"), "def f():\n    pass\n").unwrap();

    codeatlas()
        .arg("analyze")
        .arg(tmp.path())
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\""))
        .stdout(predicate::str::contains("\"nodes\""))
        .stdout(predicate::str::contains("\"statistics\""));
}

#[test]
fn test_analyze_writes_output_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.py"), "x = 1\n").unwrap();
    let output = tmp.path().join("map.json");

    codeatlas()
        .arg("analyze")
        .arg(tmp.path())
        .arg("-o")
        .arg(&output)
        .arg("--quiet")
        .assert()
        .success();

    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert!(map.get("generatedAt").is_some());
    assert!(map["nodes"].as_array().unwrap().len() >= 1);
}

#[test]
fn test_analyze_missing_root_fails() {
    codeatlas()
        .arg("analyze")
        .arg("/definitely/not/here")
        .arg("--quiet")
        .assert()
        .failure();
}

#[test]
fn test_max_files_flag() {
    let tmp = TempDir::new().unwrap();
    for i in 0..4 {
        fs::write(tmp.path().join(format!("f{}.py", i)), "x = 1\n").unwrap();
    }
    let output = tmp.path().join("map.json");

    codeatlas()
        .arg("analyze")
        .arg(tmp.path())
        .arg("--max-files")
        .arg("2")
        .arg("-o")
        .arg(&output)
        .arg("--quiet")
        .assert()
        .success();

    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let files = map["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["type"] == "File")
        .count();
    assert_eq!(files, 2);
}
