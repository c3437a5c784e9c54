mod support;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

use support::{hive_cmd, hive_json};

#[test]
fn hive_help_works() {
    Command::cargo_bin("hive")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Usage: hive"));
}

#[test]
fn subcommand_help_works() {
    for cmd in [
        "init", "project", "task", "comment", "time", "activity", "notify", "compact",
    ] {
        Command::cargo_bin("hive")
            .expect("binary")
            .arg(cmd)
            .arg("--help")
            .assert()
            .success();
    }
}

#[test]
fn init_creates_config_and_saves_actor() {
    let dir = TempDir::new().expect("tempdir");
    let data = hive_json(dir.path(), "alice", &["--name", "Alice A", "init"]);
    assert_eq!(data["created"]["config"], true);
    assert_eq!(data["actor"], "alice");
    assert!(dir.path().join(".hive.toml").is_file());
    assert!(dir.path().join(".hive").is_dir());

    let again = hive_json(dir.path(), "alice", &["init"]);
    assert_eq!(again["created"]["config"], false);
    assert_eq!(again["created"]["data_dir"], false);
}

#[test]
fn project_task_comment_time_flow() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();

    let project = hive_json(root, "alice", &["project", "new", "Site", "-p", "high"]);
    let project_id = project["id"].as_str().expect("project id").to_string();
    assert_eq!(project["priority"], "high");
    assert_eq!(project["progress"], 0);

    let a = hive_json(root, "alice", &["task", "new", &project_id, "A", "--due", "2026-12-01"]);
    let a_id = a["id"].as_str().expect("a id").to_string();
    let b = hive_json(root, "alice", &["task", "new", &project_id, "B"]);
    let b_id = b["id"].as_str().expect("b id").to_string();

    let depend = hive_json(root, "alice", &["task", "depend", &a_id, &b_id]);
    assert_eq!(depend["task"]["depends_on"][0], b_id.as_str());

    // Bare ULIDs resolve like full ids.
    let bare_b = b_id.trim_start_matches("task-");
    let output = hive_cmd(root, "alice")
        .args(["--json", "task", "depend", bare_b, a_id.as_str()])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(3));
    let err: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(err["error"]["kind"], "cycle_detected");

    let comment = hive_json(root, "bob", &["comment", "add", &a_id, "needs copy"]);
    let comment_id = comment["id"].as_str().expect("comment id").to_string();
    hive_cmd(root, "alice")
        .args(["comment", "edit", comment_id.as_str(), "mine now"])
        .assert()
        .code(3);

    hive_cmd(root, "alice")
        .args(["comment", "add", a_id.as_str(), "   "])
        .assert()
        .code(2)
        .stderr(contains("content cannot be empty"));

    let started = hive_json(root, "alice", &["time", "start", &a_id, "drafting"]);
    assert_eq!(started["started"]["is_running"], true);
    let stopped = hive_json(root, "alice", &["time", "stop"]);
    assert_eq!(stopped["stopped"], true);
    let again = hive_json(root, "alice", &["time", "stop"]);
    assert_eq!(again["stopped"], false);

    hive_json(root, "alice", &["task", "status", &b_id, "done"]);
    let listed = hive_json(root, "alice", &["project", "list"]);
    assert_eq!(listed["projects"][0]["progress"], 50);

    let shown = hive_json(root, "alice", &["task", "show", &a_id]);
    assert_eq!(shown["blocked"], false);
    assert_eq!(shown["comments"].as_array().expect("comments").len(), 1);

    let feed = hive_json(root, "alice", &["activity", "--entity-type", "time"]);
    assert_eq!(feed["entries"].as_array().expect("entries").len(), 2);

    let notes = hive_json(root, "alice", &["notify", "list", "--unread"]);
    assert!(notes["unread"].as_u64().expect("unread") > 0);
    hive_json(root, "alice", &["notify", "read-all"]);
    let notes = hive_json(root, "alice", &["notify", "list"]);
    assert_eq!(notes["unread"], 0);

    let compacted = hive_json(root, "alice", &["compact"]);
    assert!(!compacted["collections"].as_array().expect("reports").is_empty());
}

#[test]
fn missing_ids_exit_with_user_error() {
    let dir = TempDir::new().expect("tempdir");
    hive_cmd(dir.path(), "alice")
        .args(["task", "show", "task-nope"])
        .assert()
        .code(2)
        .stderr(contains("task not found"))
        .stderr(contains("hint: hive task list"));
}

#[test]
fn invalid_values_are_rejected() {
    let dir = TempDir::new().expect("tempdir");
    hive_cmd(dir.path(), "alice")
        .args(["project", "new", "Site", "--priority", "urgent"])
        .assert()
        .code(2);
    hive_cmd(dir.path(), "alice")
        .args(["project", "new", "Site", "--due", "someday"])
        .assert()
        .code(2);
}

#[test]
fn ephemeral_runs_leave_no_files() {
    let dir = TempDir::new().expect("tempdir");
    hive_cmd(dir.path(), "alice")
        .args(["--ephemeral", "project", "new", "Scratch"])
        .assert()
        .success()
        .stdout(contains("created Scratch"));
    assert!(!dir.path().join(".hive").exists());
}
