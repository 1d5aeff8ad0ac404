#[test]
fn help_lists_commands_and_global_flags() {
    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("horus"))
        .arg("--help")
        .output()
        .expect("run help");
    assert!(output.status.success(), "--help should succeed");
    let text = String::from_utf8_lossy(&output.stdout);

    for needle in [
        "--json",
        "--kernels-root",
        "extract",
        "set-kernel",
        "delete-kernel",
        "check-kernel",
        "requirements",
        "serve",
    ] {
        assert!(text.contains(needle), "help output should contain '{needle}'");
    }
}

#[test]
fn lock_help_mentions_runtime_overrides() {
    let output = std::process::Command::new(assert_cmd::cargo::cargo_bin!("horus"))
        .args(["lock", "--help"])
        .output()
        .expect("run help");
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for needle in ["--pipenv", "--recommendation-type", "--labels", "--timeout"] {
        assert!(text.contains(needle), "lock help should contain '{needle}'");
    }
}
