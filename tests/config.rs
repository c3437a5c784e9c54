use std::fs;

use hive::config::{Backend, Config, CONFIG_FILE};
use hive::hive::storage_for;
use hive::task::Priority;

#[test]
fn load_from_dir_defaults_on_invalid_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(CONFIG_FILE), "storage = 123").expect("write invalid config");

    let cfg = Config::load_from_dir(dir.path());
    assert_eq!(cfg.storage.dir, ".hive");
    assert_eq!(cfg.actor.default_id, "unknown");
}

#[test]
fn load_from_dir_defaults_on_bad_priority() {
    let dir = tempfile::tempdir().expect("tempdir");
    let content = r#"
[tasks]
default_priority = "urgent"
"#;
    fs::write(dir.path().join(CONFIG_FILE), content.trim()).expect("write config");

    let cfg = Config::load_from_dir(dir.path());
    assert_eq!(cfg.tasks.default_priority(), Priority::Medium);
}

#[test]
fn partial_config_keeps_other_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let content = r#"
[storage]
dir = "state"
backend = "memory"

[activity]
details_max_chars = 20

[tasks]
default_priority = "high"
"#;
    fs::write(dir.path().join(CONFIG_FILE), content.trim()).expect("write config");

    let cfg = Config::load_from_dir(dir.path());
    assert_eq!(cfg.storage.backend, Backend::Memory);
    assert_eq!(cfg.activity.details_max_chars, 20);
    assert_eq!(cfg.activity.default_limit, 50);
    assert_eq!(cfg.tasks.default_priority(), Priority::High);
    assert_eq!(storage_for(dir.path(), &cfg).data_dir(), dir.path().join("state"));
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(CONFIG_FILE);
    let mut cfg = Config::default();
    cfg.actor.default_name = "Somebody".to_string();
    cfg.save(&path).expect("save");

    let loaded = Config::load(&path).expect("load");
    assert_eq!(loaded.actor.default_name, "Somebody");
    assert_eq!(loaded.storage.lock_timeout_ms, 5000);
}
