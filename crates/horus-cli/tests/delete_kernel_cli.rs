#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// `jupyter` stand-in that knows the `demo` kernel and logs removals.
fn fake_jupyter(dir: &Path) -> PathBuf {
    let path = dir.join("jupyter");
    let log = dir.join("jupyter.log");
    let script = format!(
        r#"#!/bin/sh
echo "$*" >> "{log}"
case "$2" in
  list) echo '{{"kernelspecs": {{"python3": {{}}, "demo": {{}}}}}}' ;;
esac
exit 0
"#,
        log = log.display()
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn horus(root: &Path, jupyter: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin!("horus"));
    cmd.env("HORUS_KERNELS_ROOT", root.join("kernels"))
        .env("HORUS_JUPYTER", jupyter)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn unknown_kernels_name_the_deletable_ones() {
    let tmp = TempDir::new().expect("tmpdir");
    let jupyter = fake_jupyter(tmp.path());

    horus(tmp.path(), &jupyter)
        .args(["delete-kernel", "ghost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("kernels that can be deleted: demo"));

    horus(tmp.path(), &jupyter)
        .args(["delete-kernel", "python3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("default kernel"));
}

#[test]
fn known_kernel_is_removed_with_its_environment() {
    let tmp = TempDir::new().expect("tmpdir");
    let jupyter = fake_jupyter(tmp.path());
    let env_dir = tmp.path().join("kernels").join("demo");
    std::fs::create_dir_all(&env_dir).unwrap();

    horus(tmp.path(), &jupyter)
        .args(["delete-kernel", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kernel demo deleted."));
    assert!(!env_dir.exists());

    let log = std::fs::read_to_string(tmp.path().join("jupyter.log")).unwrap();
    assert!(log.contains("kernelspec remove -f demo"));
}

#[test]
fn list_kernels_hides_the_runtime_default() {
    let tmp = TempDir::new().expect("tmpdir");
    let jupyter = fake_jupyter(tmp.path());

    let assert = horus(tmp.path(), &jupyter)
        .args(["--json", "list-kernels"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["data"], serde_json::json!(["demo"]));
}
