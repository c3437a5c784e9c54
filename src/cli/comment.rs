//! hive comment command implementations

use crate::cli::{load_context, GlobalOptions};
use crate::comment::{require_content, Comment};
use crate::error::Result;
use crate::output::HumanOutput;
use crate::repository::EntityKind;

#[derive(serde::Serialize)]
struct CommentListOutput {
    task: String,
    comments: Vec<Comment>,
}

pub fn run_add(global: &GlobalOptions, task: &str, content: &str) -> Result<()> {
    let content = require_content(content)?;
    let ctx = load_context(global)?;
    let task_id = ctx.hive.resolve(EntityKind::Task, task)?;
    let comment = ctx.hive.comments().add(&task_id, &ctx.actor, content)?;

    let mut human = HumanOutput::new(format!("hive comment add: commented on {task_id}"));
    human.push_summary("id", comment.id.clone());
    human.push_summary("by", comment.user_display_name.clone());
    ctx.emit("comment add", &comment, &human)
}

pub fn run_edit(global: &GlobalOptions, id: &str, content: &str) -> Result<()> {
    let content = require_content(content)?;
    let ctx = load_context(global)?;
    let comment_id = ctx.hive.resolve(EntityKind::Comment, id)?;
    let comment = ctx.hive.comments().update(&comment_id, content, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("hive comment edit: updated {}", comment.id));
    human.push_summary("task", comment.task_id.clone());
    ctx.emit("comment edit", &comment, &human)
}

pub fn run_rm(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let comment_id = ctx.hive.resolve(EntityKind::Comment, id)?;
    let comment = ctx.hive.comments().delete(&comment_id, &ctx.actor)?;

    let mut human = HumanOutput::new(format!("hive comment rm: deleted {}", comment.id));
    human.push_summary("task", comment.task_id.clone());
    ctx.emit("comment rm", &comment, &human)
}

pub fn run_list(global: &GlobalOptions, task: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let task_id = ctx.hive.resolve(EntityKind::Task, task)?;
    let comments = ctx.hive.comments().list_for_task(&task_id);

    let mut human = HumanOutput::new(format!("hive comment list: {} comment(s) on {task_id}", comments.len()));
    for comment in &comments {
        let edited = if comment.updated_at.is_some() { " (edited)" } else { "" };
        human.push_detail(format!(
            "{} {} {}{}: {}",
            comment.id,
            comment.created_at.format("%Y-%m-%d %H:%M"),
            comment.user_display_name,
            edited,
            comment.content
        ));
    }

    ctx.emit(
        "comment list",
        &CommentListOutput {
            task: task_id,
            comments,
        },
        &human,
    )
}
