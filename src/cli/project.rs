//! hive project command implementations

use crate::activity::{ActivityLogEntry, DEFAULT_FEED_LIMIT};
use crate::cli::activity::activity_line;
use crate::cli::{load_context, parse_due, GlobalOptions};
use crate::error::Result;
use crate::output::HumanOutput;
use crate::project::{progress_of, NewProject, Project, ProjectStatus};
use crate::repository::EntityKind;
use crate::task::{sort_tasks, Priority, Task};

pub struct NewOptions {
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
}

#[derive(serde::Serialize)]
struct ProjectSummary {
    #[serde(flatten)]
    project: Project,
    progress: u8,
    task_count: usize,
}

#[derive(serde::Serialize)]
struct ProjectListOutput {
    projects: Vec<ProjectSummary>,
}

#[derive(serde::Serialize)]
struct ProjectShowOutput {
    #[serde(flatten)]
    summary: ProjectSummary,
    tasks: Vec<Task>,
    activity: Vec<ActivityLogEntry>,
}

fn summarize(project: Project, tasks: &[Task]) -> ProjectSummary {
    let progress = progress_of(&project.id, tasks);
    let task_count = tasks.iter().filter(|task| task.project_id == project.id).count();
    ProjectSummary {
        project,
        progress,
        task_count,
    }
}

pub fn run_new(global: &GlobalOptions, options: NewOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let priority = match options.priority.as_deref() {
        Some(raw) => raw.parse::<Priority>()?,
        None => Priority::default(),
    };
    let due_date = parse_due(options.due.as_deref())?;

    let project = ctx.hive.projects().create(
        NewProject {
            name: options.name,
            description: options.description.unwrap_or_default(),
            priority,
            due_date,
        },
        &ctx.actor,
    )?;

    let mut human = HumanOutput::new(format!("hive project new: created {}", project.name));
    human.push_summary("id", project.id.clone());
    human.push_summary("priority", project.priority.to_string());
    if let Some(due) = project.due_date {
        human.push_summary("due", due.format("%Y-%m-%d").to_string());
    }
    human.push_next_step(format!("hive task new {} \"<title>\"", project.id));

    let output = summarize(project, &[]);
    ctx.emit("project new", &output, &human)
}

pub fn run_list(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let tasks = ctx.hive.tasks().list();
    let mut projects = ctx.hive.projects().list();
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let summaries: Vec<ProjectSummary> = projects
        .into_iter()
        .map(|project| summarize(project, &tasks))
        .collect();

    let mut human = HumanOutput::new(format!("hive project list: {} project(s)", summaries.len()));
    for summary in &summaries {
        human.push_detail(format!(
            "{} {} [{}] {}% of {} task(s)",
            summary.project.id,
            summary.project.name,
            summary.project.status,
            summary.progress,
            summary.task_count
        ));
    }
    if summaries.is_empty() {
        human.push_next_step("hive project new <name>");
    }

    ctx.emit(
        "project list",
        &ProjectListOutput {
            projects: summaries,
        },
        &human,
    )
}

pub fn run_show(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let project_id = ctx.hive.resolve(EntityKind::Project, id)?;
    let project = ctx.hive.projects().get(&project_id)?;
    let mut tasks = ctx.hive.tasks().list_for_project(&project_id);
    sort_tasks(&mut tasks);
    let activity = ctx.hive.log().for_project(&project_id, DEFAULT_FEED_LIMIT);

    let mut human = HumanOutput::new(format!("hive project show: {}", project.name));
    human.push_summary("id", project.id.clone());
    human.push_summary("status", project.status.to_string());
    human.push_summary("priority", project.priority.to_string());
    if !project.description.is_empty() {
        human.push_summary("description", project.description.clone());
    }
    if let Some(due) = project.due_date {
        human.push_summary("due", due.format("%Y-%m-%d").to_string());
    }
    let progress = ctx.hive.projects().progress(&project.id, &tasks)?;
    human.push_summary("progress", format!("{progress}%"));
    for task in &tasks {
        human.push_detail(format!(
            "{} {} [{} / {}]",
            task.id, task.title, task.status, task.priority
        ));
    }
    for entry in &activity {
        human.push_detail(activity_line(entry));
    }

    let output = ProjectShowOutput {
        summary: summarize(project, &tasks),
        tasks,
        activity,
    };
    ctx.emit("project show", &output, &human)
}

pub fn run_status(global: &GlobalOptions, id: &str, status: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let status = status.parse::<ProjectStatus>()?;
    let project_id = ctx.hive.resolve(EntityKind::Project, id)?;
    let project = ctx.hive.projects().set_status(&project_id, status, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("hive project status: {} is {}", project.name, project.status));
    human.push_summary("id", project.id.clone());

    let tasks = ctx.hive.tasks().list_for_project(&project_id);
    ctx.emit("project status", &summarize(project, &tasks), &human)
}
