//! hive notify command implementations

use crate::cli::{load_context, GlobalOptions};
use crate::error::Result;
use crate::notification::Notification;
use crate::output::HumanOutput;
use crate::repository::EntityKind;

#[derive(serde::Serialize)]
struct NotifyListOutput {
    unread: usize,
    notifications: Vec<Notification>,
}

#[derive(serde::Serialize)]
struct ReadAllOutput {
    marked: usize,
}

pub fn run_list(global: &GlobalOptions, unread_only: bool) -> Result<()> {
    let ctx = load_context(global)?;
    ctx.hive.sync_notifications()?;
    let mut notifications = ctx.hive.notifications().list();
    if unread_only {
        notifications.retain(|n| !n.read);
    }
    let unread = ctx.hive.notifications().unread_count();

    let mut human = HumanOutput::new(format!("hive notify list: {unread} unread"));
    for n in &notifications {
        let marker = if n.read { " " } else { "*" };
        human.push_detail(format!(
            "{marker} {} [{}] {}: {}",
            n.id, n.kind, n.title, n.message
        ));
    }
    if unread > 0 {
        human.push_next_step("hive notify read-all");
    }

    ctx.emit(
        "notify list",
        &NotifyListOutput {
            unread,
            notifications,
        },
        &human,
    )
}

pub fn run_read(global: &GlobalOptions, id: &str) -> Result<()> {
    let ctx = load_context(global)?;
    let notification_id = ctx.hive.resolve(EntityKind::Notification, id)?;
    let notification = ctx.hive.notifications().mark_read(&notification_id)?;

    let mut human = HumanOutput::new(format!("hive notify read: {}", notification.title));
    human.push_summary("id", notification.id.clone());
    ctx.emit("notify read", &notification, &human)
}

pub fn run_read_all(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    ctx.hive.sync_notifications()?;
    let marked = ctx.hive.notifications().mark_all_read()?;

    let human = HumanOutput::new(format!("hive notify read-all: marked {marked} read"));
    ctx.emit("notify read-all", &ReadAllOutput { marked }, &human)
}
