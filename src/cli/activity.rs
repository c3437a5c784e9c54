//! hive activity command implementation

use crate::activity::{ActivityLogEntry, ActivityQuery, EntityType};
use crate::cli::{load_context, GlobalOptions};
use crate::error::Result;
use crate::output::HumanOutput;

pub struct ActivityOptions {
    pub limit: Option<usize>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

#[derive(serde::Serialize)]
struct ActivityOutput {
    entries: Vec<ActivityLogEntry>,
}

/// One feed line: when, who, what
pub(crate) fn activity_line(entry: &ActivityLogEntry) -> String {
    format!(
        "{} {} {} {} {}: {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.user_display_name,
        entry.action,
        entry.entity_type,
        entry.entity_id,
        entry.details
    )
}

pub fn run(global: &GlobalOptions, options: ActivityOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let entity_type = options
        .entity_type
        .as_deref()
        .map(str::parse::<EntityType>)
        .transpose()?;
    let query = ActivityQuery {
        limit: options
            .limit
            .unwrap_or(ctx.hive.config().activity.default_limit),
        entity_type,
        entity_id: options.entity_id,
    };
    let entries = ctx.hive.log().query(&query);

    let mut human = HumanOutput::new(format!("hive activity: {} entries", entries.len()));
    for entry in &entries {
        human.push_detail(activity_line(entry));
    }

    ctx.emit("activity", &ActivityOutput { entries }, &human)
}
