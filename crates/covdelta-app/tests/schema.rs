//! JSON output conformance against `schemas/covdelta.report.v1.schema.json`.

use covdelta_app::{SummaryRequest, summarize};
use covdelta_types::{DiffOptions, OutputFormat};
use jsonschema::Validator;

const SCHEMA: &str = include_str!("../../../schemas/covdelta.report.v1.schema.json");

fn validator() -> Validator {
    let schema: serde_json::Value = serde_json::from_str(SCHEMA).expect("schema is valid JSON");
    Validator::new(&schema).expect("schema compiles")
}

fn json_body(current: &str, base: Option<&str>, options: DiffOptions) -> serde_json::Value {
    let request = SummaryRequest {
        current_text: current.to_string(),
        base_text: base.map(str::to_string),
        options,
        format: OutputFormat::Json,
        ..Default::default()
    };
    let summary = summarize(&request).expect("summary should succeed");
    serde_json::from_str(&summary.body).expect("body should be JSON")
}

fn assert_valid(value: &serde_json::Value) {
    let errors: Vec<String> = validator()
        .iter_errors(value)
        .map(|e| e.to_string())
        .collect();
    assert!(errors.is_empty(), "schema violations: {errors:?}");
}

#[test]
fn fixture_comparison_conforms() {
    let value = json_body(
        include_str!("../../../fixtures/lcov/current.info"),
        Some(include_str!("../../../fixtures/lcov/base.info")),
        DiffOptions {
            repository: Some("octo/repo".to_string()),
            commit: Some("abc123".to_string()),
            head: Some("feature".to_string()),
            base: Some("main".to_string()),
            prefix: Some("/workspace/".to_string()),
        },
    );

    assert_valid(&value);
    assert_eq!(value["files"][2]["base_pct"], serde_json::Value::Null);
}

#[test]
fn current_only_conforms() {
    let value = json_body(
        include_str!("../../../fixtures/lcov/uncovered.info"),
        None,
        DiffOptions::default(),
    );

    assert_valid(&value);
    assert!(value.get("base").is_none());
    assert!(value.get("delta").is_none());
}

#[test]
fn empty_report_conforms() {
    let value = json_body("", None, DiffOptions::default());

    assert_valid(&value);
    assert_eq!(value["current"]["files"], 0);
    assert_eq!(value["files"], serde_json::json!([]));
}

#[test]
fn schema_rejects_wrong_id() {
    let mut value = json_body(
        include_str!("../../../fixtures/lcov/covered.info"),
        None,
        DiffOptions::default(),
    );
    value["schema"] = serde_json::json!("covdelta.report.v0");

    assert!(!validator().is_valid(&value));
}
