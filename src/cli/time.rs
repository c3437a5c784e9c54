//! hive time command implementations

use chrono::Utc;

use crate::cli::{load_context, GlobalOptions};
use crate::error::Result;
use crate::output::HumanOutput;
use crate::repository::EntityKind;
use crate::timer::{elapsed_seconds, format_duration, require_description, TimeEntry};

#[derive(serde::Serialize)]
struct StartOutput {
    started: TimeEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    stopped: Option<TimeEntry>,
}

#[derive(serde::Serialize)]
struct StopOutput {
    stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<TimeEntry>,
}

#[derive(serde::Serialize)]
struct StatusOutput {
    running: Option<TimeEntry>,
    elapsed_seconds: u64,
}

#[derive(serde::Serialize)]
struct ListOutput {
    entries: Vec<TimeEntry>,
}

#[derive(serde::Serialize)]
struct TotalOutput {
    task: String,
    total_seconds: u64,
    formatted: String,
}

fn entry_line(entry: &TimeEntry) -> String {
    let length = match entry.duration {
        Some(seconds) if !entry.is_running => format_duration(seconds),
        _ => "running".to_string(),
    };
    format!(
        "{} {} {} [{}] {}",
        entry.id,
        entry.start_time.format("%Y-%m-%d %H:%M"),
        entry.task_id,
        length,
        entry.description
    )
}

pub fn run_start(global: &GlobalOptions, task: &str, description: &str) -> Result<()> {
    let description = require_description(description)?;
    let ctx = load_context(global)?;
    let task_id = ctx.hive.resolve(EntityKind::Task, task)?;
    let previous = ctx.hive.timer().running_entry_for(&ctx.actor.user_id);
    let started = ctx.hive.timer().start(&task_id, &ctx.actor, description)?;
    let stopped = match previous {
        Some(previous) => ctx
            .hive
            .timer()
            .entries_for_user(&ctx.actor.user_id)
            .into_iter()
            .find(|entry| entry.id == previous.id),
        None => None,
    };

    let mut human = HumanOutput::new(format!("hive time start: tracking {task_id}"));
    human.push_summary("id", started.id.clone());
    human.push_summary("description", started.description.clone());
    if let Some(stopped) = &stopped {
        human.push_warning(format!(
            "stopped running timer {} after {}",
            stopped.id,
            format_duration(stopped.duration.unwrap_or(0))
        ));
    }
    human.push_next_step("hive time stop");

    ctx.emit("time start", &StartOutput { started, stopped }, &human)
}

pub fn run_stop(global: &GlobalOptions, id: Option<&str>) -> Result<()> {
    let ctx = load_context(global)?;
    let entry_id = match id {
        Some(input) => Some(ctx.hive.resolve(EntityKind::TimeEntry, input)?),
        None => ctx
            .hive
            .timer()
            .running_entry_for(&ctx.actor.user_id)
            .map(|entry| entry.id),
    };
    let entry = match entry_id {
        Some(entry_id) => ctx.hive.timer().stop(&entry_id, &ctx.actor)?,
        None => None,
    };

    let human = match &entry {
        Some(entry) => {
            let mut human = HumanOutput::new(format!(
                "hive time stop: {} after {}",
                entry.task_id,
                format_duration(entry.duration.unwrap_or(0))
            ));
            human.push_summary("id", entry.id.clone());
            human
        }
        None => {
            let mut human = HumanOutput::new("hive time stop: nothing to stop");
            human.push_next_step("hive time status");
            human
        }
    };

    let output = StopOutput {
        stopped: entry.is_some(),
        entry,
    };
    ctx.emit("time stop", &output, &human)
}

pub fn run_status(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let running = ctx.hive.timer().running_entry_for(&ctx.actor.user_id);
    let elapsed = running
        .as_ref()
        .map(|entry| elapsed_seconds(entry.start_time, Utc::now()))
        .unwrap_or(0);

    let human = match &running {
        Some(entry) => {
            let mut human = HumanOutput::new(format!(
                "hive time status: tracking {} for {}",
                entry.task_id,
                format_duration(elapsed)
            ));
            human.push_summary("id", entry.id.clone());
            human.push_summary("description", entry.description.clone());
            human
        }
        None => {
            let mut human = HumanOutput::new("hive time status: no running timer");
            human.push_next_step("hive time start <task> \"...\"");
            human
        }
    };

    let output = StatusOutput {
        running,
        elapsed_seconds: elapsed,
    };
    ctx.emit("time status", &output, &human)
}

pub fn run_list(global: &GlobalOptions, task: Option<&str>, user: Option<&str>) -> Result<()> {
    let ctx = load_context(global)?;
    let entries = match task {
        Some(input) => {
            let task_id = ctx.hive.resolve(EntityKind::Task, input)?;
            ctx.hive.timer().entries_for_task(&task_id)
        }
        None => ctx
            .hive
            .timer()
            .entries_for_user(user.unwrap_or(ctx.actor.user_id.as_str())),
    };

    let mut human = HumanOutput::new(format!("hive time list: {} entries", entries.len()));
    for entry in &entries {
        human.push_detail(entry_line(entry));
    }

    ctx.emit("time list", &ListOutput { entries }, &human)
}

pub fn run_total(global: &GlobalOptions, task: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let task_id = ctx.hive.resolve(EntityKind::Task, task)?;
    let total_seconds = ctx.hive.timer().total_duration(&task_id);
    let formatted = format_duration(total_seconds);

    let human = HumanOutput::new(format!("hive time total: {formatted} on {task_id}"));
    let output = TotalOutput {
        task: task_id,
        total_seconds,
        formatted,
    };
    ctx.emit("time total", &output, &human)
}
