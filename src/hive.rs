//! Hive: one repository, one activity log and every store wired together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;

use crate::activity::EventLog;
use crate::comment::CommentStore;
use crate::config::{Backend, Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::notification::NotificationCenter;
use crate::project::ProjectStore;
use crate::repository::{resolve_id, CompactReport, EntityKind, JsonlRepository, MemoryRepository, Repository};
use crate::storage::{Storage, DATA_DIR};
use crate::task::TaskService;
use crate::timer::TimeTracker;

/// Environment variable naming the data root
pub const DIR_ENV: &str = "HIVE_DIR";

/// Pick the data root: explicit dir, `HIVE_DIR`, the nearest ancestor of
/// `cwd` holding `.hive/` or `.hive.toml`, then the per-user data dir.
pub fn resolve_root(cli_dir: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    if let Some(dir) = cli_dir {
        return Ok(absolute(dir, cwd));
    }
    if let Some(dir) = std::env::var_os(DIR_ENV).filter(|value| !value.is_empty()) {
        return Ok(absolute(Path::new(&dir), cwd));
    }
    if let Some(found) = cwd
        .ancestors()
        .find(|dir| dir.join(DATA_DIR).is_dir() || dir.join(CONFIG_FILE).is_file())
    {
        return Ok(found.to_path_buf());
    }
    ProjectDirs::from("", "", "hive")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| Error::InvalidArgument("cannot determine a data directory; pass --dir".to_string()))
}

fn absolute(dir: &Path, cwd: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        cwd.join(dir)
    }
}

/// Storage layout for a data root under `config`
pub fn storage_for(root: &Path, config: &Config) -> Storage {
    Storage::new(root.to_path_buf(), root.join(&config.storage.dir))
}

pub struct Hive {
    config: Config,
    repo: Arc<dyn Repository>,
    jsonl: Option<JsonlRepository>,
    log: Arc<EventLog>,
    projects: ProjectStore,
    tasks: TaskService,
    comments: CommentStore,
    timer: TimeTracker,
    notifications: NotificationCenter,
}

impl Hive {
    /// Open the data root with the configured backend
    pub fn open(root: &Path, config: Config) -> Result<Self> {
        match config.storage.backend {
            Backend::Memory => Self::in_memory(config),
            Backend::Jsonl => {
                let storage = storage_for(root, &config);
                storage.init()?;
                let jsonl = JsonlRepository::new(storage, config.storage.lock_timeout_ms);
                let repo: Arc<dyn Repository> = Arc::new(jsonl.clone());
                let mut hive = Self::with_repository(repo, config)?;
                hive.jsonl = Some(jsonl);
                Ok(hive)
            }
        }
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        Self::with_repository(Arc::new(MemoryRepository::new()), config)
    }

    /// Load every collection from `repo`
    pub fn with_repository(repo: Arc<dyn Repository>, config: Config) -> Result<Self> {
        config.validate()?;
        let log = Arc::new(EventLog::load(
            Arc::clone(&repo),
            config.activity.notify_capacity,
            config.activity.details_max_chars,
        )?);
        let projects = ProjectStore::load(Arc::clone(&repo), Arc::clone(&log))?;
        let tasks = TaskService::load(Arc::clone(&repo), Arc::clone(&log))?;
        let comments = CommentStore::load(Arc::clone(&repo), Arc::clone(&log))?;
        let timer = TimeTracker::load(Arc::clone(&repo), Arc::clone(&log))?;
        let notifications = NotificationCenter::load(Arc::clone(&repo), Arc::clone(&log))?;
        tracing::debug!(activity = log.len(), "hive loaded");

        Ok(Self {
            config,
            repo,
            jsonl: None,
            log,
            projects,
            tasks,
            comments,
            timer,
            notifications,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn projects(&self) -> &ProjectStore {
        &self.projects
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn comments(&self) -> &CommentStore {
        &self.comments
    }

    pub fn timer(&self) -> &TimeTracker {
        &self.timer
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Project pending activity into notifications
    pub fn sync_notifications(&self) -> Result<usize> {
        self.notifications.sync()
    }

    /// Resolve a full id, bare id or unique prefix to a known id
    pub fn resolve(&self, kind: EntityKind, input: &str) -> Result<String> {
        let ids = match kind {
            EntityKind::Project => self.projects.ids(),
            EntityKind::Task => self.tasks.ids(),
            EntityKind::Comment => self.comments.ids(),
            EntityKind::TimeEntry => self.timer.ids(),
            EntityKind::Notification => self.notifications.ids(),
            EntityKind::Activity => {
                return Err(Error::InvalidArgument(
                    "activity entries are not addressable".to_string(),
                ))
            }
        };
        resolve_id(kind, input, &ids)
    }

    /// Rewrite every on-disk collection; a memory backend has nothing to do
    pub fn compact(&self) -> Result<Vec<CompactReport>> {
        let Some(jsonl) = &self.jsonl else {
            return Ok(Vec::new());
        };
        EntityKind::ALL
            .iter()
            .map(|kind| jsonl.compact(*kind))
            .collect()
    }
}
