// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deep validation tests for `ingest-config`.

use ingest_config::{ConfigError, ConfigWarning, parse_toml, validate_config};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const BASE_TOML: &str = r#"
    version = 1
    profile = "dev"

    [paths]
    configs_root = "configs"
    data_root = "data"
    raw_root = "data/raw"
    preprocessed_root = "data/preprocessed"

    [cache_configs.raw]
    name = "fs-raw"

    [cache_configs.preprocessed]
    name = "fs-preprocessed"

    [transform_configs]
    ir_version = 1

    [transform_configs.target]
    js_abi_version = 1
    module_format = "esm"
    layout = "single"
    path_prefix = "out"

    plugins = ["sources::demo", "transform::demo"]
"#;

fn with_jobs(jobs_toml: &str) -> String {
    format!("{BASE_TOML}\n{jobs_toml}")
}

fn one_job_toml(name: &str) -> String {
    with_jobs(&format!(
        r#"
        [[jobs]]
        name = "{name}"

        [jobs.source]
        name = "demo-source"

        [jobs.transform.frontend]
        name = "json-passthrough"

        [jobs.transform.optimizer]
        name = "plain"

        [jobs.transform.backend]
        name = "json-artifact"
        "#
    ))
}

fn validation_reasons(err: ConfigError) -> Vec<String> {
    match err {
        ConfigError::ValidationError { reasons } => reasons,
        other => panic!("expected ValidationError, got {other:?}"),
    }
}

// ===========================================================================
// 1. Valid configs pass validation with no hard errors
// ===========================================================================

#[test]
fn fully_specified_config_validates() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    validate_config(&cfg, &[]).unwrap();
}

#[test]
fn default_execution_block_is_serial_parallelism_one_fail_fast() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    assert_eq!(cfg.execution.parallelism, 1);
    assert!(cfg.execution.fail_fast);
}

#[test]
fn default_log_level_is_info() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    assert_eq!(cfg.log_level, "info");
}

// ===========================================================================
// 2. Empty jobs is a hard error
// ===========================================================================

#[test]
fn empty_jobs_is_error() {
    let toml = with_jobs("jobs = []");
    let cfg = parse_toml(&toml).unwrap();
    let reasons = validation_reasons(validate_config(&cfg, &[]).unwrap_err());
    assert!(reasons.iter().any(|r| r.contains("jobs must not be empty")));
}

// ===========================================================================
// 3. Duplicate job names is a hard error
// ===========================================================================

#[test]
fn duplicate_job_name_is_error() {
    let toml = with_jobs(
        r#"
        [[jobs]]
        name = "dup"

        [jobs.source]
        name = "demo-source"

        [jobs.transform.frontend]
        name = "json-passthrough"

        [jobs.transform.optimizer]
        name = "plain"

        [jobs.transform.backend]
        name = "json-artifact"

        [[jobs]]
        name = "dup"

        [jobs.source]
        name = "demo-source"

        [jobs.transform.frontend]
        name = "json-passthrough"

        [jobs.transform.optimizer]
        name = "plain"

        [jobs.transform.backend]
        name = "json-artifact"
        "#,
    );
    let cfg = parse_toml(&toml).unwrap();
    let reasons = validation_reasons(validate_config(&cfg, &[]).unwrap_err());
    assert!(reasons.iter().any(|r| r.contains("duplicate job name")));
}

// ===========================================================================
// 4. Non-positive parallelism is a hard error
// ===========================================================================

#[test]
fn zero_parallelism_is_error() {
    let mut cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    cfg.execution.parallelism = 0;
    let reasons = validation_reasons(validate_config(&cfg, &[]).unwrap_err());
    assert!(reasons.iter().any(|r| r.contains("parallelism")));
}

// ===========================================================================
// 5. Unknown / duplicate plugin names
// ===========================================================================

#[test]
fn unknown_plugin_name_is_error_when_table_provided() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    let reasons =
        validation_reasons(validate_config(&cfg, &["sources::other"]).unwrap_err());
    assert!(reasons.iter().any(|r| r.contains("unknown plugin")));
}

#[test]
fn known_plugin_names_pass() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    validate_config(&cfg, &["sources::demo", "transform::demo"]).unwrap();
}

#[test]
fn empty_known_plugins_table_disables_unknown_plugin_check() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    validate_config(&cfg, &[]).unwrap();
}

#[test]
fn duplicate_plugin_entry_is_error() {
    let toml = with_jobs(
        r#"
        [[jobs]]
        name = "demo-job"

        [jobs.source]
        name = "demo-source"

        [jobs.transform.frontend]
        name = "json-passthrough"

        [jobs.transform.optimizer]
        name = "plain"

        [jobs.transform.backend]
        name = "json-artifact"
        "#,
    )
    .replace(
        r#"plugins = ["sources::demo", "transform::demo"]"#,
        r#"plugins = ["sources::demo", "sources::demo"]"#,
    );
    let cfg = parse_toml(&toml).unwrap();
    let reasons = validation_reasons(validate_config(&cfg, &[]).unwrap_err());
    assert!(reasons.iter().any(|r| r.contains("duplicate plugin entry")));
}

// ===========================================================================
// 6. Unresolved transform/source stage names are a soft warning, not an error
// ===========================================================================

#[test]
fn unresolved_stage_name_is_warning_not_error() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    let warnings =
        validate_config(&cfg, &["sources::demo", "transform::demo"]).unwrap();
    assert!(warnings.iter().any(|w| matches!(
        w,
        ConfigWarning::UnresolvedStageName { slot, .. } if slot == "frontend"
    )));
}

#[test]
fn no_unresolved_warnings_when_plugin_table_empty() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    let warnings = validate_config(&cfg, &[]).unwrap();
    assert!(warnings.is_empty());
}

// ===========================================================================
// 7. Multiple errors accumulate
// ===========================================================================

#[test]
fn multiple_hard_errors_collected_together() {
    let toml = with_jobs("jobs = []");
    let mut cfg = parse_toml(&toml).unwrap();
    cfg.execution.parallelism = 0;
    let reasons = validation_reasons(validate_config(&cfg, &[]).unwrap_err());
    assert!(reasons.len() >= 2);
    assert!(reasons.iter().any(|r| r.contains("jobs must not be empty")));
    assert!(reasons.iter().any(|r| r.contains("parallelism")));
}

// ===========================================================================
// 8. Idempotency: validating twice gives the same result
// ===========================================================================

#[test]
fn idempotent_valid_config() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    let w1 = validate_config(&cfg, &["sources::demo", "transform::demo"]).unwrap();
    let w2 = validate_config(&cfg, &["sources::demo", "transform::demo"]).unwrap();
    assert_eq!(w1, w2);
}

#[test]
fn idempotent_invalid_config() {
    let toml = with_jobs("jobs = []");
    let cfg = parse_toml(&toml).unwrap();
    let r1 = validation_reasons(validate_config(&cfg, &[]).unwrap_err());
    let r2 = validation_reasons(validate_config(&cfg, &[]).unwrap_err());
    assert_eq!(r1, r2);
}

// ===========================================================================
// 9. Edge cases: many jobs, long names, unicode
// ===========================================================================

#[test]
fn many_distinct_job_names_all_valid() {
    let mut jobs_toml = String::new();
    for i in 0..50 {
        jobs_toml.push_str(&format!(
            r#"
            [[jobs]]
            name = "job-{i}"

            [jobs.source]
            name = "demo-source"

            [jobs.transform.frontend]
            name = "json-passthrough"

            [jobs.transform.optimizer]
            name = "plain"

            [jobs.transform.backend]
            name = "json-artifact"
            "#
        ));
    }
    let cfg = parse_toml(&with_jobs(&jobs_toml)).unwrap();
    validate_config(&cfg, &[]).unwrap();
}

#[test]
fn unicode_job_name_accepted() {
    let cfg = parse_toml(&one_job_toml("日本語ジョブ")).unwrap();
    validate_config(&cfg, &[]).unwrap();
}

// ===========================================================================
// 10. Schema conformance
// ===========================================================================

#[test]
fn json_schema_can_be_generated() {
    let schema = schemars::schema_for!(ingest_config::AppConfig);
    let json = serde_json::to_string_pretty(&schema).unwrap();
    assert!(json.contains("AppConfig"));
}

#[test]
fn config_roundtrips_via_json() {
    let cfg = parse_toml(&one_job_toml("demo-job")).unwrap();
    let json = serde_json::to_string(&cfg).unwrap();
    let back: ingest_config::AppConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(cfg, back);
}

#[test]
fn validation_error_display_contains_all_reasons() {
    let err = ConfigError::ValidationError {
        reasons: vec!["reason one".into(), "reason two".into()],
    };
    let s = err.to_string();
    assert!(s.contains("reason one"));
    assert!(s.contains("reason two"));
}
