//! Projects.
//!
//! Projects group tasks. Progress is derived from the project's tasks on
//! demand and never stored.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::activity::{Action, EntityType, EventLog};
use crate::actor::Actor;
use crate::error::{Error, Result};
use crate::repository::{load_records, lock_fresh, save_then, EntityKind, Repository};
use crate::task::{Priority, Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    OnHold,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on-hold",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "on-hold" => Ok(ProjectStatus::OnHold),
            other => Err(Error::InvalidArgument(format!(
                "invalid project status '{other}' (expected active|completed|on-hold)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
}

pub struct ProjectStore {
    repo: Arc<dyn Repository>,
    log: Arc<EventLog>,
    projects: Mutex<Vec<Project>>,
}

impl ProjectStore {
    pub fn new(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Self {
        Self {
            repo,
            log,
            projects: Mutex::new(Vec::new()),
        }
    }

    pub fn load(repo: Arc<dyn Repository>, log: Arc<EventLog>) -> Result<Self> {
        let projects = load_records(repo.as_ref(), EntityKind::Project)?;
        Ok(Self {
            repo,
            log,
            projects: Mutex::new(projects),
        })
    }

    pub fn create(&self, new: NewProject, actor: &Actor) -> Result<Project> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "project name cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let project = Project {
            id: EntityKind::Project.new_id(),
            name: name.to_string(),
            description: new.description.trim().to_string(),
            status: ProjectStatus::Active,
            priority: new.priority,
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
            created_by: Some(actor.user_id.clone()),
        };

        let mut projects = lock_fresh(self.repo.as_ref(), EntityKind::Project, &self.projects)?;
        save_then(self.repo.as_ref(), EntityKind::Project, &project.id, &project, None, || {
            self.log.append(
                actor,
                Action::Created,
                EntityType::Project,
                &project.id,
                format!("Project created: {}", self.log.excerpt(&project.name)),
            )
        })?;
        projects.push(project.clone());
        tracing::debug!(id = %project.id, "project created");
        Ok(project)
    }

    pub fn set_status(&self, project_id: &str, status: ProjectStatus, actor: &Actor) -> Result<Project> {
        let mut projects = lock_fresh(self.repo.as_ref(), EntityKind::Project, &self.projects)?;
        let index = position(&projects, project_id)?;
        let previous = &projects[index];
        let updated = Project {
            status,
            updated_at: Utc::now(),
            ..previous.clone()
        };

        save_then(
            self.repo.as_ref(),
            EntityKind::Project,
            project_id,
            &updated,
            Some(previous),
            || {
                self.log.append(
                    actor,
                    Action::Updated,
                    EntityType::Project,
                    project_id,
                    format!("Status changed to {status}"),
                )
            },
        )?;
        projects[index] = updated.clone();
        Ok(updated)
    }

    pub fn get(&self, project_id: &str) -> Result<Project> {
        let projects = self.projects.lock();
        let index = position(&projects, project_id)?;
        Ok(projects[index].clone())
    }

    pub fn list(&self) -> Vec<Project> {
        self.projects.lock().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.projects.lock().iter().map(|p| p.id.clone()).collect()
    }

    /// Percentage of the project's tasks that are completed
    pub fn progress(&self, project_id: &str, tasks: &[Task]) -> Result<u8> {
        self.get(project_id)?;
        Ok(progress_of(project_id, tasks))
    }
}

/// Completed share of a project's tasks, rounded down; 0 with no tasks
pub fn progress_of(project_id: &str, tasks: &[Task]) -> u8 {
    let (total, done) = tasks
        .iter()
        .filter(|task| task.project_id == project_id)
        .fold((0usize, 0usize), |(total, done), task| {
            let done = done + usize::from(task.status == TaskStatus::Completed);
            (total + 1, done)
        });
    if total == 0 {
        return 0;
    }
    ((done * 100) / total) as u8
}

fn position(projects: &[Project], project_id: &str) -> Result<usize> {
    projects
        .iter()
        .position(|project| project.id == project_id)
        .ok_or_else(|| Error::not_found(EntityKind::Project, project_id))
}
