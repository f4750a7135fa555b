#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use assert_cmd::cargo_bin_cmd;
use predicates::prelude::predicate;

const CHANNELS: &str = include_str!("../../../fixtures/xmltv/channels.xml");

#[test]
fn test_help_lists_subcommands() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("channels"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_version_flag() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("epgmgr"))
        .stdout(predicate::str::contains("rev:"));
}

#[test]
fn test_generate_help() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.args(["generate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cutoff-hour"))
        .stdout(predicate::str::contains("--days-before"));
}

#[test]
fn test_generate_rejects_cutoff_hour_out_of_range() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["generate", "--cutoff-hour", "24"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_generate_fails_without_registry() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.xml");

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.arg("--dir")
        .arg(dir.path())
        .arg("generate")
        .arg("--channels")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load channel registry"));
}

#[test]
fn test_generate_with_unreachable_source_still_writes_guide() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let channels = dir.path().join("channels.xml");
    let output = dir.path().join("guide").join("epg.xml");
    std::fs::write(
        &channels,
        r#"<channels><channel site_id="globo" xmltv_id="Globo.br">Globo</channel></channels>"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[source]\nbase_url = \"http://127.0.0.1:9/br/async/channel\"\nmin_interval_ms = 0\nfetch_timeout_secs = 1\n",
    )
    .unwrap();

    // Act
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.arg("--dir")
        .arg(dir.path())
        .arg("generate")
        .arg("--channels")
        .arg(&channels)
        .arg("--output")
        .arg(&output)
        .args(["--date", "2024-03-10", "--days-before", "0", "--days-after", "0"])
        .assert()
        .success();

    // Assert
    let xml = std::fs::read_to_string(&output).unwrap();
    assert!(xml.contains(r#"<channel id="Globo.br">"#));
    assert!(!xml.contains("<programme"));
}

#[test]
fn test_channels_list_shows_rows() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let channels = dir.path().join("channels.xml");
    std::fs::write(&channels, CHANNELS).unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["channels", "list", "--channels"])
        .arg(&channels)
        .assert()
        .success()
        .stdout(predicate::str::contains("Channels (4):"))
        .stdout(predicate::str::contains("Globo.br"))
        .stdout(predicate::str::contains("skipped: channel reference is empty"));
}

#[test]
fn test_config_init_then_show() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();

    // Act
    let mut init = cargo_bin_cmd!("epgmgr");
    init.arg("--dir")
        .arg(dir.path())
        .args(["config", "init"])
        .assert()
        .success();

    // Assert
    assert!(dir.path().join("config.toml").exists());
    let mut show = cargo_bin_cmd!("epgmgr");
    show.arg("--dir")
        .arg(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cutoff_hour = 3"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "").unwrap();

    // Act & Assert
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.arg("--dir")
        .arg(dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_completions_bash() {
    // Arrange & Act & Assert
    let mut cmd = cargo_bin_cmd!("epgmgr");
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("epgmgr"));
}
