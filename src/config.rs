//! Configuration loading and management
//!
//! Handles parsing of `.hive.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::activity::MAX_NOTIFY_CAPACITY;
use crate::error::{Error, Result};
use crate::task::Priority;

/// Name of the configuration file inside the data root
pub const CONFIG_FILE: &str = ".hive.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Activity feed configuration
    #[serde(default)]
    pub activity: ActivityConfig,

    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Tasks configuration
    #[serde(default)]
    pub tasks: TasksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            activity: ActivityConfig::default(),
            actor: ActorConfig::default(),
            tasks: TasksConfig::default(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Append-only JSONL files under the data directory
    Jsonl,
    /// Process-local memory, discarded on exit
    Memory,
}

/// Storage-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend used for all collections
    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// Data directory, relative to the data root
    #[serde(default = "default_storage_dir")]
    pub dir: String,

    /// How long to wait for the storage lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_backend() -> Backend {
    Backend::Jsonl
}

fn default_storage_dir() -> String {
    ".hive".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            dir: default_storage_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Activity feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Entries returned by `hive activity` when no limit is given
    #[serde(default = "default_activity_limit")]
    pub default_limit: usize,

    /// Content excerpts in activity details are cut to this many characters
    #[serde(default = "default_details_max_chars")]
    pub details_max_chars: usize,

    /// Buffered activity entries per subscriber
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,
}

fn default_activity_limit() -> usize {
    50
}

fn default_details_max_chars() -> usize {
    50
}

fn default_notify_capacity() -> usize {
    1024
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            default_limit: default_activity_limit(),
            details_max_chars: default_details_max_chars(),
            notify_capacity: default_notify_capacity(),
        }
    }
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// User id when none is specified
    #[serde(default = "default_actor_id")]
    pub default_id: String,

    /// Display name when none is specified
    #[serde(default = "default_actor_name")]
    pub default_name: String,
}

fn default_actor_id() -> String {
    "unknown".to_string()
}

fn default_actor_name() -> String {
    "Unknown".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default_id: default_actor_id(),
            default_name: default_actor_name(),
        }
    }
}

/// Tasks configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Priority for `hive task new` without `--priority`
    #[serde(default = "default_task_priority")]
    pub default_priority: String,
}

fn default_task_priority() -> String {
    "medium".to_string()
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_priority: default_task_priority(),
        }
    }
}

impl TasksConfig {
    pub fn default_priority(&self) -> Priority {
        self.default_priority.parse().unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        self.default_priority
            .parse::<Priority>()
            .map_err(|_| {
                Error::InvalidConfig(format!(
                    "tasks.default_priority '{}' (expected low|medium|high)",
                    self.default_priority
                ))
            })?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from a `.hive.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data root, or return defaults
    pub fn load_from_dir(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the stores cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.storage.dir.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "storage.dir cannot be empty".to_string(),
            ));
        }
        if self.storage.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.activity.default_limit == 0 {
            return Err(Error::InvalidConfig(
                "activity.default_limit must be > 0".to_string(),
            ));
        }
        if self.activity.details_max_chars == 0 {
            return Err(Error::InvalidConfig(
                "activity.details_max_chars must be > 0".to_string(),
            ));
        }
        if self.activity.notify_capacity == 0 || self.activity.notify_capacity > MAX_NOTIFY_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "activity.notify_capacity must be between 1 and {MAX_NOTIFY_CAPACITY}"
            )));
        }
        if self.actor.default_id.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "actor.default_id cannot be empty".to_string(),
            ));
        }
        self.tasks.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.storage.backend, Backend::Jsonl);
        assert_eq!(cfg.storage.dir, ".hive");
        assert_eq!(cfg.storage.lock_timeout_ms, 5000);
        assert_eq!(cfg.activity.default_limit, 50);
        assert_eq!(cfg.activity.details_max_chars, 50);
        assert_eq!(cfg.activity.notify_capacity, 1024);
        assert_eq!(cfg.actor.default_id, "unknown");
        assert_eq!(cfg.actor.default_name, "Unknown");
        assert_eq!(cfg.tasks.default_priority(), Priority::Medium);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[storage]
backend = "memory"
dir = "state"
lock_timeout_ms = 250

[activity]
default_limit = 10
details_max_chars = 20
notify_capacity = 16

[actor]
default_id = "u-1"
default_name = "Alice"

[tasks]
default_priority = "high"
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.storage.backend, Backend::Memory);
        assert_eq!(cfg.storage.dir, "state");
        assert_eq!(cfg.storage.lock_timeout_ms, 250);
        assert_eq!(cfg.activity.default_limit, 10);
        assert_eq!(cfg.activity.details_max_chars, 20);
        assert_eq!(cfg.activity.notify_capacity, 16);
        assert_eq!(cfg.actor.default_id, "u-1");
        assert_eq!(cfg.actor.default_name, "Alice");
        assert_eq!(cfg.tasks.default_priority(), Priority::High);
    }

    #[test]
    fn oversized_notify_capacity_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[activity]\nnotify_capacity = 9223372036854775807").expect("write config");

        let err = Config::load(&path).expect_err("capacity too large");
        assert!(matches!(err, Error::InvalidConfig(_)));

        let mut cfg = Config::default();
        cfg.activity.notify_capacity = MAX_NOTIFY_CAPACITY;
        assert!(cfg.validate().is_ok());
        cfg.activity.notify_capacity = MAX_NOTIFY_CAPACITY + 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn invalid_priority_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[tasks]\ndefault_priority = \"urgent\"").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_limit_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[activity]\ndefault_limit = 0").expect("write config");

        assert!(matches!(
            Config::load(&path),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn load_from_dir_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path());
        assert_eq!(cfg.storage.dir, ".hive");
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("backend = \"jsonl\""));
        assert!(written.contains("default_priority = \"medium\""));
    }
}
