//! Integration tests for quality gate evaluation and its audit trail.

use stagehand::fs::{latest_validation, list_validations, WorkDir};
use stagehand::gate::{GateEngine, GateStatus, QualityCheck};
use std::time::Duration;
use tempfile::TempDir;

fn setup(temp: &TempDir) -> (GateEngine, WorkDir) {
    let work = WorkDir::new(temp.path());
    work.initialize().unwrap();
    let engine = GateEngine::new(temp.path(), Duration::from_secs(30));
    (engine, work)
}

fn checks(yaml: &str) -> Vec<QualityCheck> {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn test_missing_blocking_file_blocks_stage() {
    let temp = TempDir::new().unwrap();
    let (engine, _work) = setup(&temp);

    let checks = checks(
        r#"
- name: architecture-doc
  severity: blocking
  type: file_exists
  files: [architecture.md]
"#,
    );

    let result = engine.evaluate("01-planning", &checks).unwrap();
    assert_eq!(result.status, GateStatus::Blocked);
    assert_eq!(result.outcomes.len(), 1);
    assert_eq!(result.outcomes[0].name, "architecture-doc");
    assert!(!result.outcomes[0].passed);
    assert!(result.outcomes[0].message.contains("architecture.md"));
}

#[test]
fn test_stage_output_dir_satisfies_existence_checks() {
    let temp = TempDir::new().unwrap();
    let (engine, work) = setup(&temp);

    let stage_dir = work.outputs_dir("01-planning");
    std::fs::create_dir_all(&stage_dir).unwrap();
    std::fs::write(stage_dir.join("architecture.md"), "# Architecture\n").unwrap();

    let checks = checks(
        r#"
- name: architecture-doc
  severity: blocking
  type: file_exists
  files: [architecture.md]
"#,
    );

    let result = engine.evaluate("01-planning", &checks).unwrap();
    assert_eq!(result.status, GateStatus::Passed);
}

#[test]
fn test_existence_check_falls_back_to_project_root() {
    let temp = TempDir::new().unwrap();
    let (engine, _work) = setup(&temp);

    std::fs::write(temp.path().join("README.md"), "# Readme\n").unwrap();

    let checks = checks(
        r#"
- name: readme
  severity: critical
  type: file_exists
  files: [README.md]
"#,
    );

    let result = engine.evaluate("01-planning", &checks).unwrap();
    assert_eq!(result.status, GateStatus::Passed);
}

#[test]
fn test_aggregation_precedence_is_order_independent() {
    let temp = TempDir::new().unwrap();
    let (engine, _work) = setup(&temp);

    let forward = checks(
        r#"
- name: advisory
  severity: non_critical
  type: file_exists
  files: [notes.md]
- name: hard-gate
  severity: blocking
  type: file_exists
  files: [required.md]
"#,
    );
    let reversed = checks(
        r#"
- name: hard-gate
  severity: blocking
  type: file_exists
  files: [required.md]
- name: advisory
  severity: non_critical
  type: file_exists
  files: [notes.md]
"#,
    );

    let a = engine.evaluate("02-design", &forward).unwrap();
    let b = engine.evaluate("02-design", &reversed).unwrap();
    assert_eq!(a.status, GateStatus::Blocked);
    assert_eq!(b.status, GateStatus::Blocked);
}

#[test]
fn test_section_checks() {
    let temp = TempDir::new().unwrap();
    let (engine, work) = setup(&temp);

    let stage_dir = work.outputs_dir("02-design");
    std::fs::create_dir_all(&stage_dir).unwrap();
    std::fs::write(
        stage_dir.join("design.md"),
        "# Overview\n\ntext\n\n## Data Model\n\n## API\n",
    )
    .unwrap();

    let passing = checks(
        r#"
- name: sections
  severity: critical
  type: section_present
  file: design.md
  sections: ["overview", "data model"]
- name: enough-sections
  severity: critical
  type: section_count
  file: design.md
  min: 3
"#,
    );
    let result = engine.evaluate("02-design", &passing).unwrap();
    assert_eq!(result.status, GateStatus::Passed);

    let failing = checks(
        r#"
- name: sections
  severity: critical
  type: section_present
  file: design.md
  sections: ["Deployment"]
"#,
    );
    let result = engine.evaluate("02-design", &failing).unwrap();
    assert_eq!(result.status, GateStatus::RetryableFailure);
    assert!(result.outcomes[0].message.contains("Deployment"));
}

#[test]
fn test_component_and_file_counts() {
    let temp = TempDir::new().unwrap();
    let (engine, work) = setup(&temp);

    let stage_dir = work.outputs_dir("03-implementation");
    std::fs::create_dir_all(&stage_dir).unwrap();
    std::fs::write(stage_dir.join("a.md"), "x").unwrap();
    std::fs::write(stage_dir.join("b.md"), "x").unwrap();
    std::fs::write(
        stage_dir.join("tasks.md"),
        "- [ ] one\n- [x] two\n- [ ] three\n",
    )
    .unwrap();

    let checks = checks(
        r#"
- name: enough-docs
  severity: critical
  type: file_count
  pattern: "*.md"
  min: 3
- name: enough-tasks
  severity: critical
  type: component_count
  file: tasks.md
  pattern: '^- \[.\]'
  min: 3
"#,
    );

    let result = engine.evaluate("03-implementation", &checks).unwrap();
    assert_eq!(result.status, GateStatus::Passed, "{:?}", result.outcomes);
}

#[test]
fn test_command_check_exit_code() {
    let temp = TempDir::new().unwrap();
    let (engine, _work) = setup(&temp);

    let passing = checks(
        r#"
- name: ok-command
  severity: critical
  type: command
  command: "true"
"#,
    );
    let result = engine.evaluate("04-verify", &passing).unwrap();
    assert_eq!(result.status, GateStatus::Passed);

    let failing = checks(
        r#"
- name: failing-command
  severity: critical
  type: command
  command: "exit 3"
"#,
    );
    let result = engine.evaluate("04-verify", &failing).unwrap();
    assert_eq!(result.status, GateStatus::RetryableFailure);
    assert!(result.outcomes[0].message.contains("exit code"));
}

#[test]
fn test_command_check_min_pass_rate() {
    let temp = TempDir::new().unwrap();
    let (engine, _work) = setup(&temp);

    // 7/8 = 0.875: passes a 0.8 threshold even though the exit code is 1
    let lenient = checks(
        r#"
- name: suite
  severity: critical
  type: command
  command: "echo '7 passed, 1 failed'; exit 1"
  min_pass_rate: 0.8
"#,
    );
    let result = engine.evaluate("04-verify", &lenient).unwrap();
    assert_eq!(result.status, GateStatus::Passed, "{:?}", result.outcomes);

    let strict = checks(
        r#"
- name: suite
  severity: critical
  type: command
  command: "echo '7 passed, 1 failed'"
  min_pass_rate: 0.9
"#,
    );
    let result = engine.evaluate("04-verify", &strict).unwrap();
    assert_eq!(result.status, GateStatus::RetryableFailure);
}

#[test]
fn test_command_timeout_fails_check() {
    let temp = TempDir::new().unwrap();
    let (engine, _work) = setup(&temp);

    let checks = checks(
        r#"
- name: hung-command
  severity: critical
  type: command
  command: "sleep 5"
  timeout_secs: 1
"#,
    );
    let result = engine.evaluate("04-verify", &checks).unwrap();
    assert_eq!(result.status, GateStatus::RetryableFailure);
    assert!(result.outcomes[0].message.contains("timed out"));
}

#[test]
fn test_empty_gate_passes() {
    let temp = TempDir::new().unwrap();
    let (engine, _work) = setup(&temp);

    let result = engine.evaluate("05-ship", &[]).unwrap();
    assert_eq!(result.status, GateStatus::Passed);
    assert!(result.outcomes.is_empty());
}

#[test]
fn test_every_evaluation_is_persisted() {
    let temp = TempDir::new().unwrap();
    let (engine, work) = setup(&temp);

    let gate = checks(
        r#"
- name: doc
  severity: critical
  type: file_exists
  files: [doc.md]
"#,
    );

    engine.evaluate("01-planning", &gate).unwrap();
    std::fs::write(temp.path().join("doc.md"), "x").unwrap();
    engine.evaluate("01-planning", &gate).unwrap();

    let records = list_validations(&work, "01-planning").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, GateStatus::RetryableFailure);
    assert_eq!(records[1].status, GateStatus::Passed);

    let latest = latest_validation(&work, "01-planning").unwrap().unwrap();
    assert_eq!(latest.status, GateStatus::Passed);
}
