use std::path::Path;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn horus(root: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("horus"));
    cmd.env("HORUS_KERNELS_ROOT", root.join("kernels"))
        .env("HORUS_PYTHON", "horus-test-no-python")
        .env("HORUS_JUPYTER", "horus-test-no-jupyter")
        .env_remove("RUST_LOG");
    cmd
}

fn empty_notebook(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("empty.ipynb");
    let document = serde_json::json!({
        "cells": [],
        "metadata": {"language_info": {"name": "python"}},
        "nbformat": 4,
        "nbformat_minor": 5
    });
    std::fs::write(&path, document.to_string()).unwrap();
    path
}

#[test]
fn missing_requirements_fail_the_check() {
    let tmp = TempDir::new().expect("tmpdir");
    let notebook = empty_notebook(tmp.path());

    horus(tmp.path())
        .arg("check")
        .arg(&notebook)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("TYPE"))
        .stdout(predicate::str::contains("ERROR"))
        .stdout(predicate::str::contains("requirements key is not present"));
}

#[test]
fn check_renders_json_items() {
    let tmp = TempDir::new().expect("tmpdir");
    let notebook = empty_notebook(tmp.path());

    let assert = horus(tmp.path())
        .args(["check", "-o", "json"])
        .arg(&notebook)
        .assert()
        .code(1);
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let items: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    let items = items.as_array().unwrap();
    assert_eq!(items[0]["type"], "INFO");
    assert_eq!(items[0]["message"], "kernel name selected: jupyterlab-requirements");
    assert!(items.iter().any(|item| item["type"] == "ERROR"));
}

#[test]
fn unreadable_notebook_is_a_failure() {
    let tmp = TempDir::new().expect("tmpdir");
    horus(tmp.path())
        .args(["check", "missing.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"))
        .stderr(predicate::str::contains(".ipynb extension"));
}

#[test]
fn version_prints_the_package_version() {
    let tmp = TempDir::new().expect("tmpdir");
    horus(tmp.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn set_kernel_explains_why_it_refused() {
    let tmp = TempDir::new().expect("tmpdir");
    let notebook = empty_notebook(tmp.path());

    horus(tmp.path())
        .arg("set-kernel")
        .arg(&notebook)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("consistency check reported errors"))
        .stderr(predicate::str::contains("requirements_lock key is not present"))
        .stderr(predicate::str::contains("horus lock"));
    assert!(!tmp.path().join("kernels").join("python3").exists());
}
