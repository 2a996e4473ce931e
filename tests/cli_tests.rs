use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;

mod common;

#[test]
fn test_version() {
    let mut cmd = common::cargo_bin();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oauth2-orchestrator"));
}

#[test]
fn test_version_subcommand() {
    let mut cmd = common::cargo_bin();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("oauth2-orchestrator"));
}

#[test]
fn test_init_creates_toml_config() {
    let temp = tempfile::tempdir().unwrap();

    let mut cmd = common::cargo_bin();
    cmd.arg("init").current_dir(&temp).assert().success();

    let config_path = temp.path().join("oauth2-orchestrator.toml");
    assert!(config_path.exists());
    let content = fs::read_to_string(config_path).unwrap();
    assert!(content.contains("[oauth]"));
    assert!(content.contains("[oauth.clients.web]"));
}

#[test]
fn test_init_creates_yaml_config() {
    let temp = tempfile::tempdir().unwrap();

    let mut cmd = common::cargo_bin();
    cmd.arg("init")
        .arg("--format")
        .arg("yaml")
        .current_dir(&temp)
        .assert()
        .success();

    let config_path = temp.path().join("oauth2-orchestrator.yaml");
    assert!(config_path.exists());
    let content = fs::read_to_string(config_path).unwrap();
    assert!(content.contains("oauth:"));
}

#[test]
fn test_init_fails_if_exists_without_force() {
    let temp = tempfile::tempdir().unwrap();
    let config_path = temp.path().join("oauth2-orchestrator.toml");
    fs::write(&config_path, "existing content").unwrap();

    let mut cmd = common::cargo_bin();
    cmd.arg("init").current_dir(&temp).assert().failure();

    let content = fs::read_to_string(&config_path).unwrap();
    assert_eq!(content, "existing content");

    let mut cmd = common::cargo_bin();
    cmd.arg("init")
        .arg("--force")
        .current_dir(&temp)
        .assert()
        .success();

    let content = fs::read_to_string(config_path).unwrap();
    assert!(content.contains("[oauth]"));
}

#[test]
fn test_validate_valid_config() {
    let temp = tempfile::tempdir().unwrap();
    let config_path = temp.path().join("oauth2-orchestrator.toml");
    fs::write(
        &config_path,
        r#"
[oauth]
admin_base_url = "http://hydra:4445"
public_base_url = "http://hydra:4444"

[oauth.clients.web]
secret = "s3cr3t"
redirect_uri = "https://app.example.com/callback"
"#,
    )
    .unwrap();

    let mut cmd = common::cargo_bin();
    cmd.arg("validate")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success();
}

#[test]
fn test_validate_invalid_config_missing_clients() {
    let temp = tempfile::tempdir().unwrap();
    let config_path = temp.path().join("oauth2-orchestrator.toml");
    fs::write(
        &config_path,
        r#"
[oauth]
admin_base_url = "http://hydra:4445"
public_base_url = "http://hydra:4444"
clients = {}
"#,
    )
    .unwrap();

    let mut cmd = common::cargo_bin();
    cmd.arg("validate")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure();
}

#[test]
fn test_validate_missing_file() {
    let mut cmd = common::cargo_bin();
    cmd.arg("validate")
        .arg("--config")
        .arg("/nonexistent/oauth2-orchestrator.toml")
        .assert()
        .failure();
}
