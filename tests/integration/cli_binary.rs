//! End-to-end tests that drive the compiled `holicast` binary.
//!
//! Every command runs with HOME and XDG_CONFIG_HOME pointed into a temp dir so
//! no user-level configuration leaks in.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn holicast(home: &Path, args: &[&str]) -> Output {
    let bin = env!("CARGO_BIN_EXE_holicast");
    Command::new(bin)
        .env("HOME", home.join("home"))
        .env("XDG_CONFIG_HOME", home.join("xdg"))
        .env_remove("HOLICAST_ENV")
        .env_remove("HOLICAST_LOG")
        .env_remove("HOLICAST_LOG_OUTPUT")
        .env_remove("HOLICAST_LOG_FORMAT")
        .args(args)
        .output()
        .unwrap()
}

fn workspace(temp_dir: &TempDir) -> std::path::PathBuf {
    let workspace = temp_dir.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();
    workspace
}

#[test]
fn test_config_command_prints_effective_toml() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace(&temp_dir);
    fs::create_dir_all(workspace.join("config")).unwrap();
    fs::write(
        workspace.join("config/config.toml"),
        "[pipeline]\nrounds = 3\n",
    )
    .unwrap();

    let output = holicast(
        temp_dir.path(),
        &["--quiet", "--root", workspace.to_str().unwrap(), "config"],
    );

    assert!(
        output.status.success(),
        "holicast config should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let rendered: toml::Value = toml::from_str(&stdout).unwrap();
    assert_eq!(rendered["pipeline"]["rounds"].as_integer(), Some(3));
    assert_eq!(rendered["generator"]["backend"].as_str(), Some("fusion_brain"));
}

#[test]
fn test_clean_removes_previous_days() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace(&temp_dir);
    fs::create_dir_all(workspace.join("gallery/01-01-20")).unwrap();
    fs::write(workspace.join("gallery/01-01-20/0.png"), b"old").unwrap();
    fs::create_dir_all(workspace.join("storage")).unwrap();
    fs::write(workspace.join("storage/01-01-20.json"), "[]").unwrap();

    let output = holicast(
        temp_dir.path(),
        &["--quiet", "--root", workspace.to_str().unwrap(), "clean"],
    );

    assert!(
        output.status.success(),
        "holicast clean should succeed: stderr={:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Removed 1 gallery folder(s) and 1 record file(s)"));
    assert!(!workspace.join("gallery/01-01-20").exists());
    assert!(!workspace.join("storage/01-01-20.json").exists());
}

#[test]
fn test_file_logging_writes_under_root() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace(&temp_dir);
    fs::create_dir_all(workspace.join("config")).unwrap();
    fs::write(
        workspace.join("config/config.toml"),
        "[logging]\noutput = \"file\"\nfile = \"logs/run.log\"\n",
    )
    .unwrap();

    let output = holicast(
        temp_dir.path(),
        &["--root", workspace.to_str().unwrap(), "config"],
    );

    assert!(output.status.success());
    let log_path = workspace.join("logs/run.log");
    assert!(log_path.exists(), "log file should exist at {}", log_path.display());
    let content = fs::read_to_string(&log_path).unwrap();
    assert!(
        content.contains("Holicast CLI starting"),
        "log file should contain the startup message; got: {}",
        content
    );
}

#[test]
fn test_invalid_configuration_exits_with_error() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = workspace(&temp_dir);
    fs::create_dir_all(workspace.join("config")).unwrap();
    fs::write(
        workspace.join("config/config.toml"),
        "[pipeline]\nrounds = 0\n",
    )
    .unwrap();

    let output = holicast(
        temp_dir.path(),
        &["--quiet", "--root", workspace.to_str().unwrap(), "config"],
    );

    assert!(!output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
}
