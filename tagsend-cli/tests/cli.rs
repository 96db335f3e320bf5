use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let toml = format!(
        r#"
[message]
send_interval = 0.0

[contacts]
data_file = '{data}/contacts.json'
backup_dir = '{data}/backups'
auto_backup = false

[friend_details]
data_file = '{data}/friend_details.json'
"#,
        data = dir.display()
    );
    std::fs::write(&path, toml).unwrap();
    path
}

fn tagsend(config: &Path, log_file: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tagsend"))
        .arg("--config")
        .arg(config)
        .arg("--log-file-path")
        .arg(log_file)
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

/// Concatenation of every file in the log directory; the rolling appender
/// adds a date to the file name.
fn read_logs(dir: &Path) -> String {
    let mut text = String::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        text.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
    }
    text
}

#[test]
fn test_failing_command_exits_1_and_keeps_its_log() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let logs = dir.path().join("logs");

    let output = tagsend(&config, &logs.join("tagsend.log"), &["tag", "remove", "Nobody", "x"]);

    assert_eq!(output.status.code(), Some(1));
    let text = read_logs(&logs);
    assert!(text.contains("Contact 'Nobody' not found"), "log was: {text}");
}

#[test]
fn test_successful_command_exits_0() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let logs = dir.path().join("logs");

    let output = tagsend(&config, &logs.join("tagsend.log"), &["add", "Ann", "--tag", "vip"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Added Ann."));
    assert!(read_logs(&logs).contains("Added contact 'Ann'"));
}

#[test]
fn test_first_run_logs_created_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("fresh").join("config.toml");
    let logs = dir.path().join("logs");

    let output = Command::new(env!("CARGO_BIN_EXE_tagsend"))
        .arg("--config")
        .arg(&config)
        .arg("--log-file-path")
        .arg(logs.join("tagsend.log"))
        .args(["config", "get", "message.send_interval"])
        .env("RUST_LOG", "info")
        .env("TAGSEND__CONTACTS__DATA_FILE", dir.path().join("contacts.json"))
        .env("TAGSEND__CONTACTS__BACKUP_DIR", dir.path().join("backups"))
        .env(
            "TAGSEND__FRIEND_DETAILS__DATA_FILE",
            dir.path().join("friend_details.json"),
        )
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(config.exists());
    assert!(read_logs(&logs).contains("Created default config"));
}
