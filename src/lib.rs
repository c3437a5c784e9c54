//! hive - shared project and task tracking
//!
//! This library provides the core of the hive CLI: projects and tasks,
//! task dependencies, comments and time tracking, all recorded in one
//! activity log.
//!
//! # Core Concepts
//!
//! - **Activity log**: append-only, newest-first ledger of every change
//! - **Dependencies**: a directed graph over tasks that never holds a cycle
//! - **Time entries**: at most one running timer per user
//! - **Notifications**: projected from activity, with a per-item read flag
//!
//! # Module Organization
//!
//! - `activity`: `EventLog` and activity entries
//! - `graph`: `DependencyGraph` cycle checks and candidates
//! - `task` / `project`: task and project stores
//! - `comment`: per-task comments, author-only mutation
//! - `timer`: `TimeTracker`
//! - `notification`: `NotificationCenter`
//! - `hive`: wires one repository to every store
//! - `repository`: persistence seam with memory and JSONL backends
//! - `storage` / `lock`: data directory layout and file locking
//! - `config`: configuration loading from `.hive.toml`
//! - `actor`: who is acting
//! - `cli` / `output`: command-line interface and its rendering

pub mod activity;
pub mod actor;
pub mod cli;
pub mod comment;
pub mod config;
pub mod error;
pub mod graph;
pub mod hive;
pub mod lock;
pub mod notification;
pub mod output;
pub mod project;
pub mod repository;
pub mod storage;
pub mod task;
pub mod timer;

pub use activity::{Action, ActivityLogEntry, ActivityQuery, EntityType, EventLog};
pub use actor::Actor;
pub use comment::{Comment, CommentStore};
pub use error::{Error, Result};
pub use graph::DependencyGraph;
pub use hive::Hive;
pub use notification::{Notification, NotificationCenter, NotificationKind};
pub use project::{NewProject, Project, ProjectStatus, ProjectStore};
pub use repository::{EntityKind, JsonlRepository, MemoryRepository, Repository};
pub use task::{NewTask, Priority, Task, TaskService, TaskStatus};
pub use timer::{TimeEntry, TimeTracker};
