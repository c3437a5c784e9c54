//! Task comments.
//!
//! Comments are mutable only by their author. Every successful add, edit and
//! delete writes exactly one activity entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::activity::{Action, EntityType, EventLog};
use crate::actor::Actor;
use crate::error::{Error, Result};
use crate::repository::{delete_then, load_records, lock_fresh, save_then, EntityKind, Repository};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub user_display_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reject blank comment text before it reaches the store
pub fn require_content(content: &str) -> Result<&str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyContent);
    }
    Ok(trimmed)
}

pub struct CommentStore {
    repo: Arc<dyn Repository>,
    log: Arc<EventLog>,
    comments: Mutex<Vec<Comment>>,
}

impl CommentStore {
    pub fn new(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Self {
        Self {
            repo,
            log,
            comments: Mutex::new(Vec::new()),
        }
    }

    pub fn load(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Result<Self> {
        let comments = load_records(repo.as_ref(), EntityKind::Comment)?;
        Ok(Self {
            repo,
            log,
            comments: Mutex::new(comments),
        })
    }

    pub fn add(&self, task_id: &str, actor: &Actor, content: &str) -> Result<Comment> {
        let comment = Comment {
            id: EntityKind::Comment.new_id(),
            task_id: task_id.to_string(),
            user_id: actor.user_id.clone(),
            user_display_name: actor.display_name.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut comments = lock_fresh(self.repo.as_ref(), EntityKind::Comment, &self.comments)?;
        save_then(self.repo.as_ref(), EntityKind::Comment, &comment.id, &comment, None, || {
            self.log.append(
                actor,
                Action::Commented,
                EntityType::Task,
                task_id,
                format!("Comment added: {}", self.log.excerpt(content)),
            )
        })?;
        comments.push(comment.clone());
        Ok(comment)
    }

    pub fn update(&self, comment_id: &str, content: &str, actor: &Actor) -> Result<Comment> {
        let mut comments = lock_fresh(self.repo.as_ref(), EntityKind::Comment, &self.comments)?;
        let index = owned_position(&comments, comment_id, actor)?;
        let previous = &comments[index];
        let updated = Comment {
            content: content.to_string(),
            updated_at: Some(Utc::now()),
            ..previous.clone()
        };

        save_then(
            self.repo.as_ref(),
            EntityKind::Comment,
            comment_id,
            &updated,
            Some(previous),
            || {
                self.log.append(
                    actor,
                    Action::Updated,
                    EntityType::Comment,
                    comment_id,
                    format!("Comment updated: {}", self.log.excerpt(content)),
                )
            },
        )?;
        comments[index] = updated.clone();
        Ok(updated)
    }

    pub fn delete(&self, comment_id: &str, actor: &Actor) -> Result<Comment> {
        let mut comments = lock_fresh(self.repo.as_ref(), EntityKind::Comment, &self.comments)?;
        let index = owned_position(&comments, comment_id, actor)?;
        delete_then(
            self.repo.as_ref(),
            EntityKind::Comment,
            comment_id,
            &comments[index],
            || {
                self.log.append(
                    actor,
                    Action::Deleted,
                    EntityType::Comment,
                    comment_id,
                    "Comment deleted",
                )
            },
        )?;
        Ok(comments.remove(index))
    }

    /// Comments on a task, newest first
    pub fn list_for_task(&self, task_id: &str) -> Vec<Comment> {
        let mut found: Vec<Comment> = self
            .comments
            .lock()
            .iter()
            .filter(|comment| comment.task_id == task_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    pub fn get(&self, comment_id: &str) -> Result<Comment> {
        self.comments
            .lock()
            .iter()
            .find(|comment| comment.id == comment_id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Comment, comment_id))
    }

    pub fn ids(&self) -> Vec<String> {
        self.comments.lock().iter().map(|c| c.id.clone()).collect()
    }
}

fn owned_position(comments: &[Comment], comment_id: &str, actor: &Actor) -> Result<usize> {
    let index = comments
        .iter()
        .position(|comment| comment.id == comment_id)
        .ok_or_else(|| Error::not_found(EntityKind::Comment, comment_id))?;
    if comments[index].user_id != actor.user_id {
        tracing::debug!(comment = comment_id, user = %actor.user_id, "comment mutation refused");
        return Err(Error::forbidden(EntityKind::Comment, comment_id));
    }
    Ok(index)
}
