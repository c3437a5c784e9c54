#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assert_cmd::Command;
use hive::config::Config;
use hive::error::{Error, Result};
use hive::repository::{EntityKind, MemoryRepository, Repository};
use hive::{Actor, Hive, NewProject, NewTask, Project, Task};
use serde_json::Value;

pub fn alice() -> Actor {
    Actor::new("u-alice", "Alice")
}

pub fn bob() -> Actor {
    Actor::new("u-bob", "Bob")
}

pub fn memory_hive() -> Hive {
    Hive::in_memory(Config::default()).expect("memory hive")
}

pub fn project(hive: &Hive, name: &str) -> Project {
    hive.projects()
        .create(
            NewProject {
                name: name.to_string(),
                ..NewProject::default()
            },
            &alice(),
        )
        .expect("create project")
}

pub fn task(hive: &Hive, project: &Project, title: &str) -> Task {
    hive.tasks()
        .create(
            NewTask {
                project_id: project.id.clone(),
                title: title.to_string(),
                ..NewTask::default()
            },
            &alice(),
        )
        .expect("create task")
}

/// Memory repository that can be told to reject writes to one collection
pub struct FlakyRepository {
    inner: MemoryRepository,
    failing: EntityKind,
    fail: AtomicBool,
}

impl FlakyRepository {
    pub fn new(failing: EntityKind) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryRepository::new(),
            failing,
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self, kind: EntityKind) -> Result<()> {
        if kind == self.failing && self.fail.load(Ordering::SeqCst) {
            return Err(Error::Persistence(format!("{kind} collection unavailable")));
        }
        Ok(())
    }
}

impl Repository for FlakyRepository {
    fn load_all(&self, kind: EntityKind) -> Result<Vec<Value>> {
        self.inner.load_all(kind)
    }

    fn save(&self, kind: EntityKind, id: &str, record: &Value) -> Result<()> {
        self.check(kind)?;
        self.inner.save(kind, id, record)
    }

    fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        self.check(kind)?;
        self.inner.delete(kind, id)
    }
}

/// `hive` binary pointed at `root`, with a fixed user and no ambient env
pub fn hive_cmd(root: &Path, user: &str) -> Command {
    let mut cmd = Command::cargo_bin("hive").expect("binary");
    cmd.env_remove("HIVE_DIR")
        .env_remove("HIVE_USER")
        .env_remove("HIVE_USER_NAME")
        .env_remove("RUST_LOG")
        .arg("--dir")
        .arg(root)
        .arg("--user")
        .arg(user);
    cmd
}

/// Run a command with `--json` and return its `data` payload
pub fn hive_json(root: &Path, user: &str, args: &[&str]) -> Value {
    let output = hive_cmd(root, user)
        .arg("--json")
        .args(args)
        .output()
        .expect("run hive");
    assert!(
        output.status.success(),
        "hive {args:?} failed: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    let value: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(value["status"], "success");
    value["data"].clone()
}
