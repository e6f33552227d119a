//! Integration tests for the fallback gate's producer ordering and the
//! retry controller wrapped around real (shell-backed) producers.

use stagehand::gate::{GateEngine, GateStatus, QualityCheck};
use stagehand::models::FallbackSignal;
use stagehand::producer::{FallbackGate, ProducerSpec, TaskSpec};
use stagehand::retry::{run_with_retry, AttemptStrategy};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn task(output_dir: PathBuf) -> TaskSpec {
    TaskSpec {
        stage_id: "01-planning".to_string(),
        instructions: "produce the plan".to_string(),
        prior_handoff: None,
        reference_text: Vec::new(),
        output_dir,
    }
}

fn shell_producer(id: &str, script: &str) -> ProducerSpec {
    // `sh -c <script>` ignores the appended prompt argument ($0)
    ProducerSpec {
        id: id.to_string(),
        bin: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
    }
}

fn missing_producer(id: &str) -> ProducerSpec {
    ProducerSpec {
        id: id.to_string(),
        bin: "definitely-not-a-real-binary-xyz".to_string(),
        args: Vec::new(),
    }
}

#[test]
fn test_first_available_producer_wins() {
    let temp = TempDir::new().unwrap();
    let gate = FallbackGate::new(Duration::from_secs(5));

    let producers = vec![
        missing_producer("unavailable"),
        shell_producer("fallback", "echo produced"),
    ];
    let outcome = gate
        .invoke(&task(temp.path().to_path_buf()), "prompt", &producers)
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.used_producer.as_deref(), Some("fallback"));
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(
        outcome.attempts[0].signal,
        FallbackSignal::ProducerNotFound
    );
}

#[test]
fn test_producer_order_is_strict() {
    let temp = TempDir::new().unwrap();
    let gate = FallbackGate::new(Duration::from_secs(5));

    // Both succeed; the first configured one must be used
    let producers = vec![
        shell_producer("primary", "echo primary-output"),
        shell_producer("secondary", "echo secondary-output"),
    ];
    let outcome = gate
        .invoke(&task(temp.path().to_path_buf()), "prompt", &producers)
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.used_producer.as_deref(), Some("primary"));
    assert_eq!(outcome.output.as_deref().map(str::trim), Some("primary-output"));
    assert!(outcome.attempts.is_empty());
}

#[test]
fn test_error_pattern_falls_through_to_next_producer() {
    let temp = TempDir::new().unwrap();
    let gate = FallbackGate::new(Duration::from_secs(5));

    let producers = vec![
        shell_producer("limited", "echo 'rate limit exceeded' >&2; exit 1"),
        shell_producer("healthy", "echo ok"),
    ];
    let outcome = gate
        .invoke(&task(temp.path().to_path_buf()), "prompt", &producers)
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.used_producer.as_deref(), Some("healthy"));
    assert_eq!(outcome.attempts[0].signal, FallbackSignal::ProducerError);
}

#[test]
fn test_exhaustion_reports_last_signal() {
    let temp = TempDir::new().unwrap();
    let gate = FallbackGate::new(Duration::from_secs(5));

    let producers = vec![
        missing_producer("gone"),
        shell_producer("broken", "exit 7"),
    ];
    let outcome = gate
        .invoke(&task(temp.path().to_path_buf()), "prompt", &producers)
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.used_producer.is_none());
    assert_eq!(outcome.signal, Some(FallbackSignal::OutputInvalid));
    assert_eq!(outcome.attempts.len(), 2);
    assert!(outcome.failure_reason().contains("gone"));
    assert!(outcome.failure_reason().contains("broken"));
}

#[test]
fn test_hung_producer_is_killed_and_classified_as_timeout() {
    let temp = TempDir::new().unwrap();
    let gate = FallbackGate::new(Duration::from_millis(300));

    let producers = vec![shell_producer("hung", "sleep 5")];
    let outcome = gate
        .invoke(&task(temp.path().to_path_buf()), "prompt", &producers)
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.signal, Some(FallbackSignal::Timeout));
}

#[test]
fn test_silent_producer_is_classified_as_timeout() {
    let temp = TempDir::new().unwrap();
    let gate = FallbackGate::new(Duration::from_secs(5));

    let producers = vec![shell_producer("silent", "true")];
    let outcome = gate
        .invoke(&task(temp.path().to_path_buf()), "prompt", &producers)
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.signal, Some(FallbackSignal::Timeout));
}

/// End-to-end: a producer that writes a real artifact on its second attempt,
/// validated by a real gate, driven by the retry controller.
#[test]
fn test_retry_loop_with_real_producer_and_gate() {
    let temp = TempDir::new().unwrap();
    let work = stagehand::fs::WorkDir::new(temp.path());
    work.initialize().unwrap();
    let stage_dir = work.outputs_dir("01-planning");
    std::fs::create_dir_all(&stage_dir).unwrap();

    let gate = GateEngine::new(temp.path(), Duration::from_secs(30));
    let checks: Vec<QualityCheck> = serde_yaml::from_str(
        r#"
- name: architecture-doc
  severity: critical
  type: file_exists
  files: [architecture.md]
"#,
    )
    .unwrap();

    // First attempt produces nothing; the feedback attempt writes the file
    let fallback = FallbackGate::new(Duration::from_secs(5));
    let marker = stage_dir.join("architecture.md");
    let write_cmd = format!("echo '# Architecture' > '{}'", marker.display());
    let task = task(stage_dir.clone());

    let outcome = run_with_retry(
        "01-planning",
        3,
        |strategy, state| {
            let producers = if strategy == AttemptStrategy::Initial {
                vec![shell_producer("lazy", "echo did nothing useful")]
            } else {
                // The injected feedback names the failing check
                assert!(state.errors.iter().any(|e| e.contains("architecture-doc")));
                vec![shell_producer("diligent", &format!("{write_cmd}; echo done"))]
            };
            let result = fallback.invoke(&task, "prompt", &producers).unwrap();
            assert!(result.success);
            Ok(())
        },
        || gate.evaluate("01-planning", &checks),
    )
    .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.attempts[0].status, GateStatus::RetryableFailure);
    assert_eq!(outcome.attempts[1].status, GateStatus::Passed);
    assert!(marker.exists());
}
