//! Notifications derived from the activity log.
//!
//! The center subscribes to the [`EventLog`] and turns each appended entry
//! into one notification when [`NotificationCenter::sync`] runs. The `read`
//! flag is the only state owned here.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::activity::{Action, ActivityLogEntry, EventLog};
use crate::error::{Error, Result};
use crate::repository::{load_records, lock_fresh, save_record, EntityKind, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn for_action(action: Action) -> Self {
        match action {
            Action::Created => NotificationKind::Success,
            Action::Deleted => NotificationKind::Warning,
            Action::Updated | Action::Commented | Action::Tracked => NotificationKind::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub activity_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn from_activity(entry: &ActivityLogEntry) -> Self {
        Self {
            id: EntityKind::Notification.new_id(),
            activity_id: entry.id.clone(),
            title: format!("{} {}", capitalize(entry.action.as_str()), entry.entity_type),
            message: entry.details.clone(),
            kind: NotificationKind::for_action(entry.action),
            timestamp: entry.timestamp,
            read: false,
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct NotificationCenter {
    repo: Arc<dyn Repository>,
    log: Arc<EventLog>,
    rx: Mutex<broadcast::Receiver<ActivityLogEntry>>,
    /// Ledger length when the center subscribed
    mark: usize,
    notifications: Mutex<Vec<Notification>>,
}

impl NotificationCenter {
    /// Subscribe to `log`; only entries appended from now on are projected
    pub fn new(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Self {
        let (rx, mark) = log.subscribe_marked();
        Self {
            repo,
            log,
            rx: Mutex::new(rx),
            mark,
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub fn load(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Result<Self> {
        let center = Self::new(repo, log);
        *center.notifications.lock() = load_records(center.repo.as_ref(), EntityKind::Notification)?;
        Ok(center)
    }

    /// Project every pending activity entry; returns how many were added.
    ///
    /// When the subscription fell behind the broadcast buffer, the entries
    /// appended since subscribing are read back from the ledger instead.
    pub fn sync(&self) -> Result<usize> {
        let mut rx = self.rx.lock();
        let mut pending = Vec::new();
        let mut lagged = false;
        loop {
            match rx.try_recv() {
                Ok(entry) => pending.push(entry),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification feed lagged; reconciling from the activity log");
                    lagged = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if lagged {
            pending = self.log.appended_since(self.mark);
        }
        if pending.is_empty() {
            return Ok(0);
        }

        let mut notifications = lock_fresh(self.repo.as_ref(), EntityKind::Notification, &self.notifications)?;
        let mut seen: HashSet<String> = notifications.iter().map(|n| n.activity_id.clone()).collect();
        let mut added = 0;
        for entry in pending {
            if !seen.insert(entry.id.clone()) {
                continue;
            }
            let notification = Notification::from_activity(&entry);
            save_record(self.repo.as_ref(), EntityKind::Notification, &notification.id, &notification)?;
            notifications.push(notification);
            added += 1;
        }

        if added > 0 {
            tracing::debug!(added, lagged, "notifications synced");
        }
        Ok(added)
    }

    /// Newest first
    pub fn list(&self) -> Vec<Notification> {
        let mut all = self.notifications.lock().clone();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.lock().iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&self, notification_id: &str) -> Result<Notification> {
        let mut notifications = lock_fresh(self.repo.as_ref(), EntityKind::Notification, &self.notifications)?;
        let slot = notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| Error::not_found(EntityKind::Notification, notification_id))?;
        if !slot.read {
            let updated = Notification {
                read: true,
                ..slot.clone()
            };
            save_record(self.repo.as_ref(), EntityKind::Notification, &updated.id, &updated)?;
            *slot = updated;
        }
        Ok(slot.clone())
    }

    /// Mark everything read; returns how many changed
    pub fn mark_all_read(&self) -> Result<usize> {
        let mut notifications = lock_fresh(self.repo.as_ref(), EntityKind::Notification, &self.notifications)?;
        let mut changed = 0;
        for slot in notifications.iter_mut().filter(|n| !n.read) {
            let updated = Notification {
                read: true,
                ..slot.clone()
            };
            save_record(self.repo.as_ref(), EntityKind::Notification, &updated.id, &updated)?;
            *slot = updated;
            changed += 1;
        }
        Ok(changed)
    }

    pub fn ids(&self) -> Vec<String> {
        self.notifications.lock().iter().map(|n| n.id.clone()).collect()
    }
}
