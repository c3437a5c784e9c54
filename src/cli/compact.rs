//! hive compact command implementation

use crate::cli::{load_context, GlobalOptions};
use crate::error::Result;
use crate::output::HumanOutput;
use crate::repository::CompactReport;

#[derive(serde::Serialize)]
struct CompactOutput {
    collections: Vec<CompactReport>,
}

pub fn run(global: &GlobalOptions) -> Result<()> {
    let ctx = load_context(global)?;
    let collections = ctx.hive.compact()?;
    let dropped: usize = collections
        .iter()
        .map(|report| report.before_lines.saturating_sub(report.after_lines))
        .sum();

    let mut human = HumanOutput::new(format!("hive compact: dropped {dropped} superseded line(s)"));
    for report in &collections {
        human.push_detail(format!(
            "{}: {} -> {}",
            report.kind, report.before_lines, report.after_lines
        ));
    }
    if collections.is_empty() {
        human.push_warning("memory backend has nothing to compact");
    }

    ctx.emit("compact", &CompactOutput { collections }, &human)
}
