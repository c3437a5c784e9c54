//! Tasks.
//!
//! [`TaskService`] owns the task collection. Dependency edges are changed
//! only through [`DependencyGraph`], built from the collection as reloaded
//! under the repository's collection lock.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::activity::{Action, EntityType, EventLog};
use crate::actor::Actor;
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::repository::{
    delete_then, load_records, lock_fresh, save_record, save_then, EntityKind, Locked, Repository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            other => Err(Error::InvalidArgument(format!(
                "invalid task status '{other}' (expected todo|in-progress|completed)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "invalid priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Tasks this one depends on, in the order they were added
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Task {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityKind::Task.new_id(),
            project_id: project_id.into(),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            due_date: None,
            depends_on: Vec::new(),
            created_at: now,
            updated_at: now,
            created_by: None,
        }
    }
}

/// Fields for [`TaskService::create`]
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

pub struct TaskService {
    repo: Arc<dyn Repository>,
    log: Arc<EventLog>,
    tasks: Mutex<Vec<Task>>,
}

impl TaskService {
    pub fn new(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Self {
        Self {
            repo,
            log,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn load(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Result<Self> {
        let tasks = load_records(repo.as_ref(), EntityKind::Task)?;
        Ok(Self {
            repo,
            log,
            tasks: Mutex::new(tasks),
        })
    }

    /// Hold the task collection and reload it before a change
    fn lock_tasks(&self) -> Result<Locked<'_, Task>> {
        lock_fresh(self.repo.as_ref(), EntityKind::Task, &self.tasks)
    }

    pub fn create(&self, new: NewTask, actor: &Actor) -> Result<Task> {
        if new.title.trim().is_empty() {
            return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
        }

        let mut task = Task::new(new.project_id, new.title.trim(), new.description);
        task.priority = new.priority;
        task.due_date = new.due_date;
        task.created_by = Some(actor.user_id.clone());

        let mut tasks = self.lock_tasks()?;
        save_then(self.repo.as_ref(), EntityKind::Task, &task.id, &task, None, || {
            self.log.append(
                actor,
                Action::Created,
                EntityType::Task,
                &task.id,
                format!("Task created: {}", self.log.excerpt(&task.title)),
            )
        })?;
        tasks.push(task.clone());
        tracing::debug!(id = %task.id, project = %task.project_id, "task created");
        Ok(task)
    }

    pub fn set_status(&self, task_id: &str, status: TaskStatus, actor: &Actor) -> Result<Task> {
        self.update(task_id, actor, format!("Status changed to {status}"), |task| {
            task.status = status;
        })
    }

    pub fn set_priority(&self, task_id: &str, priority: Priority, actor: &Actor) -> Result<Task> {
        self.update(task_id, actor, format!("Priority changed to {priority}"), |task| {
            task.priority = priority;
        })
    }

    fn update(&self, task_id: &str, actor: &Actor, details: String, apply: impl FnOnce(&mut Task)) -> Result<Task> {
        let mut tasks = self.lock_tasks()?;
        let index = position(&tasks, task_id)?;
        let mut updated = tasks[index].clone();
        apply(&mut updated);
        updated.updated_at = Utc::now();
        self.commit(&mut tasks, index, updated, actor, details)
    }

    /// Persist and log a replacement for `tasks[index]`, then swap it in
    fn commit(&self, tasks: &mut [Task], index: usize, updated: Task, actor: &Actor, details: String) -> Result<Task> {
        let previous = &tasks[index];
        save_then(
            self.repo.as_ref(),
            EntityKind::Task,
            &updated.id,
            &updated,
            Some(previous),
            || self.log.append(actor, Action::Updated, EntityType::Task, &updated.id, details),
        )?;
        tasks[index] = updated.clone();
        Ok(updated)
    }

    /// Remove a task and strip it from every other task's dependencies
    pub fn delete(&self, task_id: &str, actor: &Actor) -> Result<Task> {
        let mut tasks = self.lock_tasks()?;
        let index = position(&tasks, task_id)?;
        let removed = tasks[index].clone();

        let mut graph = DependencyGraph::from_tasks(tasks.iter());
        let touched = graph.remove_task(task_id);
        let now = Utc::now();
        let mut stripped: Vec<(Task, Task)> = Vec::new();
        for id in &touched {
            if let Some(before) = tasks.iter().find(|task| &task.id == id) {
                let mut after = before.clone();
                after.depends_on.retain(|dep| dep != task_id);
                after.updated_at = now;
                stripped.push((before.clone(), after));
            }
        }

        for (written, (before, after)) in stripped.iter().enumerate() {
            if let Err(err) = save_record(self.repo.as_ref(), EntityKind::Task, &after.id, after) {
                self.restore(stripped[..written].iter().map(|(before, _)| before));
                tracing::warn!(task = %before.id, error = %err, "dependency strip failed");
                return Err(err);
            }
        }

        let result = delete_then(self.repo.as_ref(), EntityKind::Task, task_id, &removed, || {
            self.log.append(
                actor,
                Action::Deleted,
                EntityType::Task,
                task_id,
                format!("Task deleted: {}", self.log.excerpt(&removed.title)),
            )
        });
        if let Err(err) = result {
            self.restore(stripped.iter().map(|(before, _)| before));
            return Err(err);
        }

        for (_, after) in stripped {
            if let Some(slot) = tasks.iter_mut().find(|task| task.id == after.id) {
                *slot = after;
            }
        }
        tasks.remove(index);
        tracing::debug!(id = task_id, stripped = touched.len(), "task deleted");
        Ok(removed)
    }

    fn restore<'a>(&self, originals: impl Iterator<Item = &'a Task>) {
        for task in originals {
            if let Err(err) = save_record(self.repo.as_ref(), EntityKind::Task, &task.id, task) {
                tracing::warn!(task = %task.id, error = %err, "failed to restore task after rollback");
            }
        }
    }

    pub fn add_dependency(&self, task_id: &str, dependency_id: &str, actor: &Actor) -> Result<Task> {
        let mut tasks = self.lock_tasks()?;
        let index = position(&tasks, task_id)?;
        position(&tasks, dependency_id)?;

        let mut graph = DependencyGraph::from_tasks(tasks.iter());
        let mut updated = graph.add_dependency(&tasks[index], dependency_id)?;
        updated.updated_at = Utc::now();
        let details = format!("Dependency added: {dependency_id}");
        self.commit(&mut tasks, index, updated, actor, details)
    }

    /// Remove an edge; a missing edge leaves the task untouched and unlogged
    pub fn remove_dependency(&self, task_id: &str, dependency_id: &str, actor: &Actor) -> Result<Task> {
        let mut tasks = self.lock_tasks()?;
        let index = position(&tasks, task_id)?;
        if !tasks[index].depends_on.iter().any(|id| id == dependency_id) {
            return Ok(tasks[index].clone());
        }

        let mut graph = DependencyGraph::from_tasks(tasks.iter());
        let mut updated = graph.remove_dependency(&tasks[index], dependency_id);
        updated.updated_at = Utc::now();
        let details = format!("Dependency removed: {dependency_id}");
        self.commit(&mut tasks, index, updated, actor, details)
    }

    /// Tasks in the same project that could become dependencies of `task_id`
    pub fn available_candidates(&self, task_id: &str) -> Result<Vec<Task>> {
        let tasks = self.tasks.lock();
        let task = &tasks[position(&tasks, task_id)?];
        let project: Vec<Task> = tasks
            .iter()
            .filter(|candidate| candidate.project_id == task.project_id)
            .cloned()
            .collect();
        let graph = DependencyGraph::from_tasks(tasks.iter());
        Ok(graph
            .available_candidates(&project, task_id)
            .into_iter()
            .filter(|candidate| !task.depends_on.contains(&candidate.id))
            .cloned()
            .collect())
    }

    /// Direct dependencies that still exist as tasks
    pub fn dependencies(&self, task_id: &str) -> Result<Vec<Task>> {
        let tasks = self.tasks.lock();
        let task = &tasks[position(&tasks, task_id)?];
        Ok(task
            .depends_on
            .iter()
            .filter_map(|id| tasks.iter().find(|candidate| &candidate.id == id))
            .cloned()
            .collect())
    }

    /// Tasks that directly or transitively depend on `task_id`
    pub fn dependents(&self, task_id: &str) -> Result<Vec<Task>> {
        let tasks = self.tasks.lock();
        position(&tasks, task_id)?;
        let graph = DependencyGraph::from_tasks(tasks.iter());
        let ids = graph.dependents_of(task_id);
        Ok(tasks.iter().filter(|task| ids.contains(&task.id)).cloned().collect())
    }

    pub fn get(&self, task_id: &str) -> Result<Task> {
        let tasks = self.tasks.lock();
        let index = position(&tasks, task_id)?;
        Ok(tasks[index].clone())
    }

    pub fn list(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    pub fn list_for_project(&self, project_id: &str) -> Vec<Task> {
        self.tasks
            .lock()
            .iter()
            .filter(|task| task.project_id == project_id)
            .cloned()
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.tasks.lock().iter().map(|task| task.id.clone()).collect()
    }
}

fn position(tasks: &[Task], task_id: &str) -> Result<usize> {
    tasks
        .iter()
        .position(|task| task.id == task_id)
        .ok_or_else(|| Error::not_found(EntityKind::Task, task_id))
}

/// Sort for display: open work first, then higher priority, then oldest.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        status_rank(a.status)
            .cmp(&status_rank(b.status))
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn status_rank(status: TaskStatus) -> usize {
    match status {
        TaskStatus::InProgress => 0,
        TaskStatus::Todo => 1,
        TaskStatus::Completed => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityQuery;
    use crate::repository::MemoryRepository;

    fn service() -> (TaskService, Arc<EventLog>) {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
        let log = Arc::new(EventLog::new(Arc::clone(&repo)));
        (TaskService::new(repo, Arc::clone(&log)), log)
    }

    fn actor() -> Actor {
        Actor::new("u-1", "Alice")
    }

    fn new_task(service: &TaskService, title: &str) -> Task {
        service
            .create(
                NewTask {
                    project_id: "project-1".to_string(),
                    title: title.to_string(),
                    ..NewTask::default()
                },
                &actor(),
            )
            .expect("create task")
    }

    #[test]
    fn parses_status_and_priority() {
        assert_eq!("in_progress".parse::<TaskStatus>().expect("status"), TaskStatus::InProgress);
        assert_eq!("HIGH".parse::<Priority>().expect("priority"), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).expect("json"),
            serde_json::json!("in-progress")
        );
    }

    #[test]
    fn create_logs_and_rejects_blank_title() {
        let (service, log) = service();
        let task = new_task(&service, "Write docs");
        assert_eq!(task.created_by.as_deref(), Some("u-1"));
        assert_eq!(log.for_task(&task.id, 20)[0].action, Action::Created);

        let err = service
            .create(
                NewTask {
                    project_id: "project-1".to_string(),
                    title: "   ".to_string(),
                    ..NewTask::default()
                },
                &actor(),
            )
            .expect_err("blank title");
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn add_dependency_requires_both_tasks() {
        let (service, _) = service();
        let a = new_task(&service, "A");
        let err = service
            .add_dependency(&a.id, "task-missing", &actor())
            .expect_err("missing dependency");
        assert!(matches!(err, Error::NotFound { kind: EntityKind::Task, .. }));
    }

    #[test]
    fn delete_strips_dependency_edges() {
        let (service, log) = service();
        let a = new_task(&service, "A");
        let b = new_task(&service, "B");
        service.add_dependency(&a.id, &b.id, &actor()).expect("a -> b");

        service.delete(&b.id, &actor()).expect("delete b");
        assert!(service.get(&a.id).expect("a").depends_on.is_empty());
        assert!(matches!(service.get(&b.id), Err(Error::NotFound { .. })));

        let deleted = log.query(&ActivityQuery {
            entity_id: Some(b.id.clone()),
            ..ActivityQuery::default()
        });
        assert_eq!(deleted[0].action, Action::Deleted);
    }

    #[test]
    fn candidates_skip_existing_and_dependents() {
        let (service, _) = service();
        let a = new_task(&service, "A");
        let b = new_task(&service, "B");
        let c = new_task(&service, "C");
        service.add_dependency(&b.id, &a.id, &actor()).expect("b -> a");

        let for_a: Vec<String> = service
            .available_candidates(&a.id)
            .expect("candidates")
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(for_a, vec![c.id.clone()]);

        let for_b: Vec<String> = service
            .available_candidates(&b.id)
            .expect("candidates")
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(for_b, vec![c.id]);
    }

    #[test]
    fn remove_missing_dependency_is_silent() {
        let (service, log) = service();
        let a = new_task(&service, "A");
        let before = log.len();
        let task = service
            .remove_dependency(&a.id, "task-nope", &actor())
            .expect("idempotent");
        assert!(task.depends_on.is_empty());
        assert_eq!(log.len(), before);
    }

    #[test]
    fn sort_puts_in_progress_and_high_priority_first() {
        let mut low = Task::new("p", "low", "");
        low.priority = Priority::Low;
        let mut high = Task::new("p", "high", "");
        high.priority = Priority::High;
        let mut active = Task::new("p", "active", "");
        active.status = TaskStatus::InProgress;
        let mut done = Task::new("p", "done", "");
        done.status = TaskStatus::Completed;
        done.priority = Priority::High;

        let mut tasks = vec![done, low, high, active];
        sort_tasks(&mut tasks);
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["active", "high", "low", "done"]);
    }
}
