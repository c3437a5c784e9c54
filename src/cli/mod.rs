//! Command-line interface for hive
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::actor::{resolve_actor, Actor};
use crate::config::{Backend, Config};
use crate::error::{Error, Result};
use crate::hive::{resolve_root, storage_for, Hive};
use crate::output::{emit_success, HumanOutput, OutputOptions};

mod activity;
mod comment;
mod compact;
mod init;
mod notify;
mod project;
mod task;
mod time;

/// hive - projects, tasks, comments and time tracking
///
/// Every change is recorded in an activity feed; notifications are derived
/// from it.
#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data root (defaults to the nearest directory holding `.hive/`)
    #[arg(long, global = true, env = "HIVE_DIR")]
    pub dir: Option<PathBuf>,

    /// User id recorded on changes
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Display name recorded on changes
    #[arg(long = "name", global = true)]
    pub display_name: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Keep state in memory only for this invocation
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and config, optionally saving the actor
    Init,

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Task management and dependencies
    #[command(subcommand)]
    Task(TaskCommands),

    /// Task comments
    #[command(subcommand)]
    Comment(CommentCommands),

    /// Time tracking
    #[command(subcommand)]
    Time(TimeCommands),

    /// Show the activity feed, newest first
    Activity {
        /// Maximum entries (defaults to activity.default_limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Only entries about this entity type (project|task|comment|time)
        #[arg(long = "entity-type")]
        entity_type: Option<String>,

        /// Only entries about this entity id
        #[arg(long = "entity-id")]
        entity_id: Option<String>,
    },

    /// Notifications derived from activity
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// Rewrite collection files, dropping superseded records
    Compact,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Create a project
    New {
        name: String,
        #[arg(long, short)]
        description: Option<String>,
        /// low|medium|high
        #[arg(long, short)]
        priority: Option<String>,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
    },

    /// List projects with progress
    List,

    /// Show a project, its tasks and recent activity
    Show { id: String },

    /// Change project status (active|completed|on-hold)
    Status { id: String, status: String },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task in a project
    New {
        project: String,
        title: String,
        #[arg(long, short)]
        description: Option<String>,
        /// low|medium|high (defaults to tasks.default_priority)
        #[arg(long, short)]
        priority: Option<String>,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
    },

    /// List tasks
    List {
        /// Only tasks in this project
        #[arg(long)]
        project: Option<String>,
        /// Only tasks with this status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a task with dependencies, comments and time
    Show { id: String },

    /// Change task status (todo|in-progress|completed)
    Status { id: String, status: String },

    /// Change task priority (low|medium|high)
    Priority { id: String, priority: String },

    /// Delete a task and drop it from other tasks' dependencies
    Rm { id: String },

    /// Make a task depend on another
    Depend { id: String, dependency: String },

    /// Remove a dependency
    Undepend { id: String, dependency: String },

    /// Tasks that can become dependencies without creating a cycle
    Candidates { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CommentCommands {
    /// Comment on a task
    Add { task: String, content: String },

    /// Edit your comment
    Edit { id: String, content: String },

    /// Delete your comment
    Rm { id: String },

    /// Comments on a task, newest first
    List { task: String },
}

#[derive(Subcommand, Debug)]
pub enum TimeCommands {
    /// Start a timer, stopping your running one
    Start { task: String, description: String },

    /// Stop a timer (defaults to your running one)
    Stop { id: Option<String> },

    /// Show your running timer
    Status,

    /// List time entries
    List {
        /// Entries for this task
        #[arg(long, conflicts_with = "for_user")]
        task: Option<String>,
        /// Entries for this user (defaults to you)
        #[arg(long = "for")]
        for_user: Option<String>,
    },

    /// Total tracked time on a task
    Total { task: String },
}

#[derive(Subcommand, Debug)]
pub enum NotifyCommands {
    /// List notifications, newest first
    List {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Mark a notification read
    Read { id: String },

    /// Mark every notification read
    ReadAll,
}

/// Flags shared by every command
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub dir: Option<PathBuf>,
    pub user: Option<String>,
    pub name: Option<String>,
    pub json: bool,
    pub quiet: bool,
    pub ephemeral: bool,
}

impl GlobalOptions {
    fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

/// An opened hive plus the acting user
pub(crate) struct Context {
    pub hive: Hive,
    pub actor: Actor,
    output: OutputOptions,
}

impl Context {
    /// Project pending activity into notifications, then print
    pub fn emit<T: Serialize>(&self, command: &str, data: &T, human: &HumanOutput) -> Result<()> {
        self.hive.sync_notifications()?;
        emit_success(self.output, command, data, Some(human))
    }
}

pub(crate) fn load_context(global: &GlobalOptions) -> Result<Context> {
    let cwd = std::env::current_dir()?;
    let root = resolve_root(global.dir.as_deref(), &cwd)?;
    let mut config = Config::load_from_dir(&root);
    if global.ephemeral {
        config.storage.backend = Backend::Memory;
    }
    let storage = storage_for(&root, &config);
    let actor = resolve_actor(
        &storage,
        &config.actor,
        global.user.as_deref(),
        global.name.as_deref(),
    );
    tracing::debug!(root = %root.display(), user = %actor.user_id, "opening hive");
    let hive = Hive::open(&root, config)?;
    Ok(Context {
        hive,
        actor,
        output: global.output(),
    })
}

/// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp
pub(crate) fn parse_due(input: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = input.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid due date '{raw}' (expected YYYY-MM-DD or RFC 3339)"
            ))
        })
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = GlobalOptions {
            dir: self.dir,
            user: self.user,
            name: self.display_name,
            json: self.json,
            quiet: self.quiet,
            ephemeral: self.ephemeral,
        };

        match self.command {
            Commands::Init => init::run(&global),
            Commands::Project(cmd) => match cmd {
                ProjectCommands::New {
                    name,
                    description,
                    priority,
                    due,
                } => project::run_new(
                    &global,
                    project::NewOptions {
                        name,
                        description,
                        priority,
                        due,
                    },
                ),
                ProjectCommands::List => project::run_list(&global),
                ProjectCommands::Show { id } => project::run_show(&global, &id),
                ProjectCommands::Status { id, status } => {
                    project::run_status(&global, &id, &status)
                }
            },
            Commands::Task(cmd) => match cmd {
                TaskCommands::New {
                    project,
                    title,
                    description,
                    priority,
                    due,
                } => task::run_new(
                    &global,
                    task::NewOptions {
                        project,
                        title,
                        description,
                        priority,
                        due,
                    },
                ),
                TaskCommands::List { project, status } => {
                    task::run_list(&global, project.as_deref(), status.as_deref())
                }
                TaskCommands::Show { id } => task::run_show(&global, &id),
                TaskCommands::Status { id, status } => task::run_status(&global, &id, &status),
                TaskCommands::Priority { id, priority } => {
                    task::run_priority(&global, &id, &priority)
                }
                TaskCommands::Rm { id } => task::run_rm(&global, &id),
                TaskCommands::Depend { id, dependency } => {
                    task::run_depend(&global, &id, &dependency)
                }
                TaskCommands::Undepend { id, dependency } => {
                    task::run_undepend(&global, &id, &dependency)
                }
                TaskCommands::Candidates { id } => task::run_candidates(&global, &id),
            },
            Commands::Comment(cmd) => match cmd {
                CommentCommands::Add { task, content } => comment::run_add(&global, &task, &content),
                CommentCommands::Edit { id, content } => comment::run_edit(&global, &id, &content),
                CommentCommands::Rm { id } => comment::run_rm(&global, &id),
                CommentCommands::List { task } => comment::run_list(&global, &task),
            },
            Commands::Time(cmd) => match cmd {
                TimeCommands::Start { task, description } => {
                    time::run_start(&global, &task, &description)
                }
                TimeCommands::Stop { id } => time::run_stop(&global, id.as_deref()),
                TimeCommands::Status => time::run_status(&global),
                TimeCommands::List { task, for_user } => {
                    time::run_list(&global, task.as_deref(), for_user.as_deref())
                }
                TimeCommands::Total { task } => time::run_total(&global, &task),
            },
            Commands::Activity {
                limit,
                entity_type,
                entity_id,
            } => activity::run(
                &global,
                activity::ActivityOptions {
                    limit,
                    entity_type,
                    entity_id,
                },
            ),
            Commands::Notify(cmd) => match cmd {
                NotifyCommands::List { unread } => notify::run_list(&global, unread),
                NotifyCommands::Read { id } => notify::run_read(&global, &id),
                NotifyCommands::ReadAll => notify::run_read_all(&global),
            },
            Commands::Compact => compact::run(&global),
        }
    }
}
