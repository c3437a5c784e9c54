//! hive task command implementations

use crate::activity::{ActivityLogEntry, DEFAULT_FEED_LIMIT};
use crate::cli::activity::activity_line;
use crate::cli::{load_context, parse_due, Context, GlobalOptions};
use crate::comment::Comment;
use crate::error::Result;
use crate::output::HumanOutput;
use crate::repository::EntityKind;
use crate::task::{sort_tasks, NewTask, Priority, Task, TaskStatus};
use crate::timer::format_duration;

pub struct NewOptions {
    pub project: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
}

#[derive(serde::Serialize)]
struct TaskListOutput {
    tasks: Vec<Task>,
}

#[derive(serde::Serialize)]
struct TaskShowOutput {
    #[serde(flatten)]
    task: Task,
    blocked: bool,
    dependencies: Vec<Task>,
    dependents: Vec<Task>,
    comments: Vec<Comment>,
    total_seconds: u64,
    activity: Vec<ActivityLogEntry>,
}

#[derive(serde::Serialize)]
struct TaskRemovedOutput {
    removed: Task,
}

#[derive(serde::Serialize)]
struct DependencyOutput {
    task: Task,
    dependency: String,
    changed: bool,
}

#[derive(serde::Serialize)]
struct CandidatesOutput {
    task: String,
    candidates: Vec<Task>,
}

fn task_line(task: &Task) -> String {
    format!("{} {} [{} / {}]", task.id, task.title, task.status, task.priority)
}

fn resolve_task(ctx: &Context, input: &str) -> Result<String> {
    ctx.hive.resolve(EntityKind::Task, input)
}

pub fn run_new(global: &GlobalOptions, options: NewOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let project_id = ctx.hive.resolve(EntityKind::Project, &options.project)?;
    let priority = match options.priority.as_deref() {
        Some(raw) => raw.parse::<Priority>()?,
        None => ctx.hive.config().tasks.default_priority(),
    };
    let due_date = parse_due(options.due.as_deref())?;

    let task = ctx.hive.tasks().create(
        NewTask {
            project_id,
            title: options.title,
            description: options.description.unwrap_or_default(),
            priority,
            due_date,
        },
        &ctx.actor,
    )?;

    let mut human = HumanOutput::new(format!("hive task new: created {}", task.title));
    human.push_summary("id", task.id.clone());
    human.push_summary("project", task.project_id.clone());
    human.push_summary("priority", task.priority.to_string());
    human.push_next_step(format!("hive time start {} \"<what you are doing>\"", task.id));
    human.push_next_step(format!("hive task depend {} <other task>", task.id));

    ctx.emit("task new", &task, &human)
}

pub fn run_list(global: &GlobalOptions, project: Option<&str>, status: Option<&str>) -> Result<()> {
    let ctx = load_context(global)?;
    let status = status.map(str::parse::<TaskStatus>).transpose()?;
    let mut tasks = match project {
        Some(input) => {
            let project_id = ctx.hive.resolve(EntityKind::Project, input)?;
            ctx.hive.tasks().list_for_project(&project_id)
        }
        None => ctx.hive.tasks().list(),
    };
    if let Some(status) = status {
        tasks.retain(|task| task.status == status);
    }
    sort_tasks(&mut tasks);

    let mut human = HumanOutput::new(format!("hive task list: {} task(s)", tasks.len()));
    for task in &tasks {
        human.push_detail(task_line(task));
    }

    ctx.emit("task list", &TaskListOutput { tasks }, &human)
}

pub fn run_show(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let task_id = resolve_task(&ctx, id)?;
    let task = ctx.hive.tasks().get(&task_id)?;
    let dependencies = ctx.hive.tasks().dependencies(&task_id)?;
    let dependents = ctx.hive.tasks().dependents(&task_id)?;
    let comments = ctx.hive.comments().list_for_task(&task_id);
    let total_seconds = ctx.hive.timer().total_duration(&task_id);
    let activity = ctx.hive.log().for_task(&task_id, DEFAULT_FEED_LIMIT);
    let blocked = dependencies
        .iter()
        .any(|dep| dep.status != TaskStatus::Completed);

    let mut human = HumanOutput::new(format!("hive task show: {}", task.title));
    human.push_summary("id", task.id.clone());
    human.push_summary("project", task.project_id.clone());
    human.push_summary("status", task.status.to_string());
    human.push_summary("priority", task.priority.to_string());
    if !task.description.is_empty() {
        human.push_summary("description", task.description.clone());
    }
    if let Some(due) = task.due_date {
        human.push_summary("due", due.format("%Y-%m-%d").to_string());
    }
    human.push_summary("time tracked", format_duration(total_seconds));
    human.push_summary("comments", comments.len().to_string());
    for dep in &dependencies {
        human.push_detail(format!("depends on {}", task_line(dep)));
    }
    for dependent in &dependents {
        human.push_detail(format!("needed by {}", task_line(dependent)));
    }
    for entry in &activity {
        human.push_detail(activity_line(entry));
    }
    if blocked {
        human.push_warning("blocked by unfinished dependencies");
    }

    let output = TaskShowOutput {
        task,
        blocked,
        dependencies,
        dependents,
        comments,
        total_seconds,
        activity,
    };
    ctx.emit("task show", &output, &human)
}

pub fn run_status(global: &GlobalOptions, id: &str, status: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let status = status.parse::<TaskStatus>()?;
    let task_id = resolve_task(&ctx, id)?;
    let task = ctx.hive.tasks().set_status(&task_id, status, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("hive task status: {} is {}", task.title, task.status));
    human.push_summary("id", task.id.clone());
    ctx.emit("task status", &task, &human)
}

pub fn run_priority(global: &GlobalOptions, id: &str, priority: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let priority = priority.parse::<Priority>()?;
    let task_id = resolve_task(&ctx, id)?;
    let task = ctx.hive.tasks().set_priority(&task_id, priority, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("hive task priority: {} is {}", task.title, task.priority));
    human.push_summary("id", task.id.clone());
    ctx.emit("task priority", &task, &human)
}

pub fn run_rm(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let task_id = resolve_task(&ctx, id)?;
    let removed = ctx.hive.tasks().delete(&task_id, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("hive task rm: deleted {}", removed.title));
    human.push_summary("id", removed.id.clone());
    ctx.emit("task rm", &TaskRemovedOutput { removed }, &human)
}

pub fn run_depend(global: &GlobalOptions, id: &str, dependency: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let task_id = resolve_task(&ctx, id)?;
    let dependency_id = resolve_task(&ctx, dependency)?;
    let task = ctx
        .hive
        .tasks()
        .add_dependency(&task_id, &dependency_id, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("hive task depend: {} now depends on {}", task.id, dependency_id));
    human.push_summary("dependencies", task.depends_on.len().to_string());
    human.push_next_step(format!("hive task show {}", task.id));

    let output = DependencyOutput {
        task,
        dependency: dependency_id,
        changed: true,
    };
    ctx.emit("task depend", &output, &human)
}

pub fn run_undepend(global: &GlobalOptions, id: &str, dependency: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let task_id = resolve_task(&ctx, id)?;
    let before = ctx.hive.tasks().get(&task_id)?;
    // A dependency whose task was deleted can still be named by its full id
    let dependency_id = resolve_task(&ctx, dependency)
        .or_else(|err| {
            before
                .depends_on
                .iter()
                .find(|dep| dep.as_str() == dependency)
                .cloned()
                .ok_or(err)
        })?;
    let task = ctx
        .hive
        .tasks()
        .remove_dependency(&task_id, &dependency_id, &ctx.actor)?;
    let changed = task.depends_on.len() != before.depends_on.len();

    let header = if changed {
        format!("hive task undepend: {} no longer depends on {}", task.id, dependency_id)
    } else {
        format!("hive task undepend: {} did not depend on {}", task.id, dependency_id)
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("dependencies", task.depends_on.len().to_string());

    let output = DependencyOutput {
        task,
        dependency: dependency_id,
        changed,
    };
    ctx.emit("task undepend", &output, &human)
}

pub fn run_candidates(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let task_id = resolve_task(&ctx, id)?;
    let mut candidates = ctx.hive.tasks().available_candidates(&task_id)?;
    sort_tasks(&mut candidates);

    let mut human = HumanOutput::new(format!(
        "hive task candidates: {} task(s) can become dependencies of {}",
        candidates.len(),
        task_id
    ));
    for candidate in &candidates {
        human.push_detail(task_line(candidate));
    }
    if let Some(first) = candidates.first() {
        human.push_next_step(format!("hive task depend {} {}", task_id, first.id));
    }

    let output = CandidatesOutput {
        task: task_id,
        candidates,
    };
    ctx.emit("task candidates", &output, &human)
}
