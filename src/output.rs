//! Shared output formatting for hive CLI commands.

use serde::Serialize;

use crate::error::Result;

pub const SCHEMA_VERSION: &str = "hive.v1";

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human rendering of a command result: a header line followed by
/// optional summary, details, warnings and next-step sections.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        println!("{}", success_envelope(command, data, human)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

/// The JSON document printed for a successful command
pub fn success_envelope<T: Serialize>(
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<String> {
    #[derive(Serialize)]
    struct Envelope<'a, T: Serialize> {
        schema_version: &'static str,
        command: &'a str,
        status: &'static str,
        data: &'a T,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        next_steps: Vec<String>,
    }

    let payload = Envelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "success",
        data,
        warnings: human.map(|h| h.warnings.clone()).unwrap_or_default(),
        next_steps: human.map(|h| h.next_steps.clone()).unwrap_or_default(),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn emit_error(command: &str, err: &crate::error::Error, json: bool) -> Result<()> {
    if json {
        println!("{}", error_envelope(command, err)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = error_next_steps(err).first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// The JSON document printed for a failed command
pub fn error_envelope(command: &str, err: &crate::error::Error) -> Result<String> {
    #[derive(Serialize)]
    struct ErrorBody<'a> {
        message: &'a str,
        code: i32,
        kind: &'static str,
        class: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    }

    #[derive(Serialize)]
    struct Envelope<'a> {
        schema_version: &'static str,
        command: &'a str,
        status: &'static str,
        error: ErrorBody<'a>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        next_steps: Vec<String>,
    }

    let message = err.to_string();
    let payload = Envelope {
        schema_version: SCHEMA_VERSION,
        command,
        status: "error",
        error: ErrorBody {
            message: &message,
            code: err.exit_code(),
            kind: err.kind(),
            class: error_class(err),
            details: err.details(),
        },
        next_steps: error_next_steps(err),
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

pub fn infer_command_name_from_args() -> String {
    command_name_from(std::env::args().skip(1))
}

fn command_name_from(args: impl IntoIterator<Item = String>) -> String {
    let mut words = args.into_iter().filter(|arg| !arg.starts_with('-'));
    let Some(command) = words.next() else {
        return "hive".to_string();
    };

    if matches!(
        command.as_str(),
        "project" | "task" | "comment" | "time" | "notify"
    ) {
        if let Some(sub) = words.next() {
            return format!("{command} {sub}");
        }
    }
    command
}

fn error_class(err: &crate::error::Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "policy_blocked",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &crate::error::Error) -> Vec<String> {
    use crate::error::Error;
    use crate::repository::EntityKind;

    match err {
        Error::NotFound { kind, .. } => match kind {
            EntityKind::Project => vec!["hive project list".to_string()],
            EntityKind::Task => vec!["hive task list".to_string()],
            EntityKind::TimeEntry => vec!["hive time status".to_string()],
            EntityKind::Notification => vec!["hive notify list".to_string()],
            EntityKind::Comment | EntityKind::Activity => Vec::new(),
        },
        Error::CycleDetected { task, .. } => vec![format!("hive task candidates {task}")],
        Error::EmptyContent => vec!["hive comment add <task> \"...\"".to_string()],
        Error::EmptyDescription => vec!["hive time start <task> \"...\"".to_string()],
        Error::LockFailed(_) => vec!["retry once the other hive process finishes".to_string()],
        Error::InvalidConfig(_) => vec!["fix .hive.toml then retry".to_string()],
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::repository::EntityKind;

    #[test]
    fn human_output_renders_sections_in_order() {
        let mut human = HumanOutput::new("hive task new: created");
        human.push_summary("id", "task-1");
        human.push_summary("blocked", "");
        human.push_detail("depends on task-0");
        human.push_warning("project is on hold");
        human.push_next_step("hive task show task-1");

        let rendered = format_human(&human);
        assert_eq!(
            rendered,
            [
                "hive task new: created",
                "",
                "Summary:",
                "- id: task-1",
                "- blocked",
                "",
                "Details:",
                "- depends on task-0",
                "",
                "Warnings:",
                "- project is on hold",
                "",
                "Next steps:",
                "- hive task show task-1",
            ]
            .join("\n")
        );
    }

    #[test]
    fn header_only_output_has_no_sections() {
        assert_eq!(format_human(&HumanOutput::new("nothing")), "nothing");
    }

    #[test]
    fn command_names_include_group_subcommands() {
        let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(command_name_from(args(&[])), "hive");
        assert_eq!(command_name_from(args(&["--json", "init"])), "init");
        assert_eq!(command_name_from(args(&["task", "--json", "depend", "a", "b"])), "task depend");
        assert_eq!(command_name_from(args(&["activity", "--limit", "5"])), "activity");
    }

    #[test]
    fn error_envelope_carries_kind_class_and_details() {
        let err = Error::not_found(EntityKind::Task, "task-x");
        let value: serde_json::Value =
            serde_json::from_str(&error_envelope("task show", &err).expect("envelope")).expect("json");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["kind"], "not_found");
        assert_eq!(value["error"]["class"], "user_error");
        assert_eq!(value["error"]["details"]["id"], "task-x");
        assert_eq!(value["next_steps"][0], "hive task list");
    }
}
