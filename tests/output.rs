use hive::error::Error;
use hive::output::{error_envelope, format_human, success_envelope, HumanOutput, SCHEMA_VERSION};
use serde_json::Value;

#[test]
fn format_human_includes_sections() {
    let mut human = HumanOutput::new("hive init: initialized");
    human.push_summary("root", "/tmp/hive");
    human.push_detail("created .hive.toml");
    human.push_warning("no actor configured");
    human.push_next_step("hive project new <name>");

    let rendered = format_human(&human);
    assert!(rendered.contains("hive init: initialized"));
    assert!(rendered.contains("- root: /tmp/hive"));
    assert!(rendered.contains("- created .hive.toml"));
    assert!(rendered.contains("Warnings:"));
    assert!(rendered.contains("- hive project new <name>"));
}

#[test]
fn success_envelope_wraps_data() {
    let mut human = HumanOutput::new("done");
    human.push_next_step("hive task list");
    let data = serde_json::json!({ "id": "task-1" });

    let value: Value =
        serde_json::from_str(&success_envelope("task new", &data, Some(&human)).expect("envelope"))
            .expect("json");
    assert_eq!(value["schema_version"], SCHEMA_VERSION);
    assert_eq!(value["command"], "task new");
    assert_eq!(value["status"], "success");
    assert_eq!(value["data"]["id"], "task-1");
    assert_eq!(value["next_steps"][0], "hive task list");
    assert!(value.get("warnings").is_none());
}

#[test]
fn error_envelope_reports_code() {
    let value: Value = serde_json::from_str(
        &error_envelope("comment add", &Error::EmptyContent).expect("envelope"),
    )
    .expect("json");
    assert_eq!(value["status"], "error");
    assert_eq!(value["error"]["code"], 2);
    assert_eq!(value["error"]["kind"], "empty_content");
    assert!(value["error"].get("details").is_none());
}
