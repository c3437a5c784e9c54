//! Activity log.
//!
//! An append-only, newest-first ledger of every successful mutation. Entries
//! are persisted through the repository before they become visible, then
//! broadcast to subscribers such as the notification center.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::actor::Actor;
use crate::error::{Error, Result};
use crate::repository::{load_records, save_record, EntityKind, Repository};

/// Entries returned by a query without an explicit limit
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Entries returned by the per-task and per-project feeds
pub const DEFAULT_FEED_LIMIT: usize = 20;

/// Characters kept when quoting user content in `details`
pub const DEFAULT_DETAILS_MAX_CHARS: usize = 50;

/// Subscriber buffer before slow receivers start lagging
const DEFAULT_CAPACITY: usize = 1024;

/// Largest broadcast buffer a log will allocate
pub const MAX_NOTIFY_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
    Deleted,
    Commented,
    Tracked,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
            Action::Commented => "commented",
            Action::Tracked => "tracked",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an activity entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    Task,
    Comment,
    Time,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Project => "project",
            EntityType::Task => "task",
            EntityType::Comment => "comment",
            EntityType::Time => "time",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(EntityType::Project),
            "task" => Ok(EntityType::Task),
            "comment" => Ok(EntityType::Comment),
            "time" => Ok(EntityType::Time),
            other => Err(Error::InvalidArgument(format!(
                "unknown entity type '{other}' (expected project|task|comment|time)"
            ))),
        }
    }
}

/// One immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: String,
    pub user_id: String,
    pub user_display_name: String,
    pub action: Action,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Filter for [`EventLog::query`]; both filters must match when present
#[derive(Debug, Clone)]
pub struct ActivityQuery {
    pub limit: usize,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
}

impl Default for ActivityQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUERY_LIMIT,
            entity_type: None,
            entity_id: None,
        }
    }
}

impl ActivityQuery {
    pub fn matches(&self, entry: &ActivityLogEntry) -> bool {
        if let Some(entity_type) = self.entity_type {
            if entry.entity_type != entity_type {
                return false;
            }
        }
        if let Some(entity_id) = self.entity_id.as_deref() {
            if entry.entity_id != entity_id {
                return false;
            }
        }
        true
    }
}

pub struct EventLog {
    repo: Arc<dyn Repository>,
    entries: Mutex<VecDeque<ActivityLogEntry>>,
    tx: broadcast::Sender<ActivityLogEntry>,
    details_max_chars: usize,
}

impl EventLog {
    /// Empty log with default settings
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self::with_settings(repo, DEFAULT_CAPACITY, DEFAULT_DETAILS_MAX_CHARS)
    }

    pub fn with_settings(repo: Arc<dyn Repository>, capacity: usize, details_max_chars: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.clamp(1, MAX_NOTIFY_CAPACITY));
        Self {
            repo,
            entries: Mutex::new(VecDeque::new()),
            tx,
            details_max_chars: details_max_chars.max(1),
        }
    }

    /// Rebuild the log from persisted entries
    pub fn load(repo: Arc<dyn Repository>, capacity: usize, details_max_chars: usize) -> Result<Self> {
        let log = Self::with_settings(Arc::clone(&repo), capacity, details_max_chars);
        let persisted: Vec<ActivityLogEntry> = load_records(repo.as_ref(), EntityKind::Activity)?;
        {
            let mut entries = log.entries.lock();
            // Saved oldest first; the ledger is newest first.
            for entry in persisted {
                entries.push_front(entry);
            }
        }
        Ok(log)
    }

    /// Record an action. Nothing is inserted if persisting the entry fails.
    pub fn append(
        &self,
        actor: &Actor,
        action: Action,
        entity_type: EntityType,
        entity_id: &str,
        details: impl Into<String>,
    ) -> Result<ActivityLogEntry> {
        let entry = ActivityLogEntry {
            id: EntityKind::Activity.new_id(),
            user_id: actor.user_id.clone(),
            user_display_name: actor.display_name.clone(),
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            details: details.into(),
            timestamp: Utc::now(),
        };

        let mut entries = self.entries.lock();
        save_record(self.repo.as_ref(), EntityKind::Activity, &entry.id, &entry)?;
        entries.push_front(entry.clone());
        // Sent under the lock so every subscriber sees ledger order.
        let receivers = self.tx.send(entry.clone()).unwrap_or(0);
        tracing::debug!(
            id = %entry.id,
            action = %entry.action,
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            receivers,
            "activity appended"
        );
        Ok(entry)
    }

    /// Matching entries, newest first, at most `query.limit`
    pub fn query(&self, query: &ActivityQuery) -> Vec<ActivityLogEntry> {
        let entries = self.entries.lock();
        entries
            .iter()
            .filter(|entry| query.matches(entry))
            .take(query.limit)
            .cloned()
            .collect()
    }

    pub fn for_task(&self, task_id: &str, limit: usize) -> Vec<ActivityLogEntry> {
        self.query(&ActivityQuery {
            limit,
            entity_type: Some(EntityType::Task),
            entity_id: Some(task_id.to_string()),
        })
    }

    pub fn for_project(&self, project_id: &str, limit: usize) -> Vec<ActivityLogEntry> {
        self.query(&ActivityQuery {
            limit,
            entity_type: Some(EntityType::Project),
            entity_id: Some(project_id.to_string()),
        })
    }

    /// Receive every entry appended after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityLogEntry> {
        self.tx.subscribe()
    }

    /// Subscribe and return the ledger length at that instant, for use
    /// with [`EventLog::appended_since`]
    pub fn subscribe_marked(&self) -> (broadcast::Receiver<ActivityLogEntry>, usize) {
        let entries = self.entries.lock();
        (self.tx.subscribe(), entries.len())
    }

    /// Entries appended after the ledger held `mark` entries, oldest first
    pub fn appended_since(&self, mark: usize) -> Vec<ActivityLogEntry> {
        let entries = self.entries.lock();
        let fresh = entries.len().saturating_sub(mark);
        entries.iter().take(fresh).rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Quote user content for `details` using the configured length
    pub fn excerpt(&self, content: &str) -> String {
        excerpt(content, self.details_max_chars)
    }
}

/// First `max_chars` characters of `content`, with `...` when cut
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
