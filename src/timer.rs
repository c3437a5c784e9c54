//! Time tracking.
//!
//! Entries move from running to stopped once. A user has at most one running
//! entry: starting a new timer stops the previous one while the time entry
//! collection is locked and freshly reloaded, so concurrent processes cannot
//! both start one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::activity::{Action, EntityType, EventLog};
use crate::actor::Actor;
use crate::error::{Error, Result};
use crate::repository::{load_records, lock_fresh, save_record, save_then, EntityKind, Repository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole seconds, set when the entry stops
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub is_running: bool,
}

impl TimeEntry {
    /// Stopped copy of a running entry, ended at `at`
    fn stopped_at(&self, at: DateTime<Utc>) -> TimeEntry {
        TimeEntry {
            end_time: Some(at),
            duration: Some(elapsed_seconds(self.start_time, at)),
            is_running: false,
            ..self.clone()
        }
    }
}

/// Whole seconds between two instants, floored from milliseconds
pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let millis = (end - start).num_milliseconds().max(0);
    (millis / 1000) as u64
}

/// `HH:MM:SS`, zero padded; hours grow past two digits when needed
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Reject blank timer descriptions before they reach the tracker
pub fn require_description(description: &str) -> Result<&str> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyDescription);
    }
    Ok(trimmed)
}

pub struct TimeTracker {
    repo: Arc<dyn Repository>,
    log: Arc<EventLog>,
    entries: Mutex<Vec<TimeEntry>>,
}

impl TimeTracker {
    pub fn new(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Self {
        Self {
            repo,
            log,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn load(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Result<Self> {
        let entries = load_records(repo.as_ref(), EntityKind::TimeEntry)?;
        Ok(Self {
            repo,
            log,
            entries: Mutex::new(entries),
        })
    }

    /// Start a timer, stopping the actor's running one first.
    ///
    /// Only the start is logged; the implicit stop is recorded on the entry.
    pub fn start(&self, task_id: &str, actor: &Actor, description: &str) -> Result<TimeEntry> {
        let mut entries = lock_fresh(self.repo.as_ref(), EntityKind::TimeEntry, &self.entries)?;
        let now = Utc::now();

        let running = entries
            .iter()
            .position(|entry| entry.is_running && entry.user_id == actor.user_id);
        let implicit_stop = running.map(|index| (index, entries[index].stopped_at(now)));

        if let Some((_, stopped)) = &implicit_stop {
            save_record(self.repo.as_ref(), EntityKind::TimeEntry, &stopped.id, stopped)?;
        }

        let entry = TimeEntry {
            id: EntityKind::TimeEntry.new_id(),
            task_id: task_id.to_string(),
            user_id: actor.user_id.clone(),
            description: description.to_string(),
            start_time: now,
            end_time: None,
            duration: None,
            is_running: true,
        };

        let started = save_then(self.repo.as_ref(), EntityKind::TimeEntry, &entry.id, &entry, None, || {
            self.log.append(
                actor,
                Action::Tracked,
                EntityType::Time,
                task_id,
                format!("Started tracking time: {description}"),
            )
        });
        if let Err(err) = started {
            if let Some((index, _)) = implicit_stop {
                let original = &entries[index];
                if let Err(undo) = save_record(self.repo.as_ref(), EntityKind::TimeEntry, &original.id, original) {
                    tracing::warn!(entry = %original.id, error = %undo, "failed to restore running timer");
                }
            }
            return Err(err);
        }

        if let Some((index, stopped)) = implicit_stop {
            tracing::info!(
                entry = %stopped.id,
                user = %actor.user_id,
                duration = stopped.duration.unwrap_or(0),
                "running timer stopped implicitly"
            );
            entries[index] = stopped;
        }
        entries.push(entry.clone());
        Ok(entry)
    }

    /// Stop a running entry owned by `actor`.
    ///
    /// Returns `Ok(None)` without changes when there is no running entry
    /// with that id or it belongs to someone else.
    pub fn stop(&self, entry_id: &str, actor: &Actor) -> Result<Option<TimeEntry>> {
        let mut entries = lock_fresh(self.repo.as_ref(), EntityKind::TimeEntry, &self.entries)?;
        let Some(index) = entries
            .iter()
            .position(|entry| entry.id == entry_id && entry.is_running)
        else {
            return Ok(None);
        };
        if entries[index].user_id != actor.user_id {
            tracing::debug!(entry = entry_id, user = %actor.user_id, "stop ignored for foreign timer");
            return Ok(None);
        }

        let previous = &entries[index];
        let stopped = previous.stopped_at(Utc::now());
        let details = format!(
            "Stopped tracking time: {}",
            format_duration(stopped.duration.unwrap_or(0))
        );
        save_then(
            self.repo.as_ref(),
            EntityKind::TimeEntry,
            entry_id,
            &stopped,
            Some(previous),
            || self.log.append(actor, Action::Tracked, EntityType::Time, &stopped.task_id, details),
        )?;
        entries[index] = stopped.clone();
        Ok(Some(stopped))
    }

    /// Sum of stopped durations for a task; running entries do not count
    pub fn total_duration(&self, task_id: &str) -> u64 {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.task_id == task_id && !entry.is_running)
            .map(|entry| entry.duration.unwrap_or(0))
            .sum()
    }

    pub fn running_entry_for(&self, user_id: &str) -> Option<TimeEntry> {
        self.entries
            .lock()
            .iter()
            .find(|entry| entry.is_running && entry.user_id == user_id)
            .cloned()
    }

    pub fn entries_for_task(&self, task_id: &str) -> Vec<TimeEntry> {
        self.collect_newest_first(|entry| entry.task_id == task_id)
    }

    pub fn entries_for_user(&self, user_id: &str) -> Vec<TimeEntry> {
        self.collect_newest_first(|entry| entry.user_id == user_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.lock().iter().map(|entry| entry.id.clone()).collect()
    }

    fn collect_newest_first(&self, keep: impl Fn(&TimeEntry) -> bool) -> Vec<TimeEntry> {
        let mut found: Vec<TimeEntry> = self
            .entries
            .lock()
            .iter()
            .filter(|entry| keep(entry))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        found
    }
}
