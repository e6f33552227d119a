//! Multi-producer fallback gate.
//!
//! Tries producers strictly in the configured order: probe availability,
//! invoke with a timeout, classify the outcome into a typed fallback signal,
//! and stop at the first success. Order is config-driven and never
//! randomized, so behavior is reproducible given the same config and
//! environment.

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{matches_error_pattern, ProducerSpec, TaskSpec};
use crate::models::FallbackSignal;
use crate::process;

/// One producer attempt and how it failed.
#[derive(Debug, Clone)]
pub struct InvocationAttempt {
    pub producer: String,
    pub signal: FallbackSignal,
    pub detail: String,
}

/// Result of running the fallback chain.
#[derive(Debug)]
pub struct FallbackOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub used_producer: Option<String>,
    /// Last signal seen when every producer failed.
    pub signal: Option<FallbackSignal>,
    pub attempts: Vec<InvocationAttempt>,
}

impl FallbackOutcome {
    /// Human-readable summary of why the chain failed.
    pub fn failure_reason(&self) -> String {
        self.attempts
            .iter()
            .map(|a| format!("{} ({}): {}", a.producer, a.signal, a.detail))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct FallbackGate {
    timeout: Duration,
}

impl FallbackGate {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Cheap presence probe: is the producer binary on PATH?
    pub fn is_available(spec: &ProducerSpec) -> bool {
        which::which(&spec.bin).is_ok()
    }

    /// Invoke producers in preference order until one succeeds.
    pub fn invoke(
        &self,
        task: &TaskSpec,
        prompt: &str,
        producers: &[ProducerSpec],
    ) -> Result<FallbackOutcome> {
        let mut attempts = Vec::new();

        for spec in producers {
            if !Self::is_available(spec) {
                debug!(producer = %spec.id, bin = %spec.bin, "producer not on PATH");
                attempts.push(InvocationAttempt {
                    producer: spec.id.clone(),
                    signal: FallbackSignal::ProducerNotFound,
                    detail: format!("binary '{}' not found", spec.bin),
                });
                continue;
            }

            let mut args = spec.args.clone();
            args.push(prompt.to_string());

            debug!(producer = %spec.id, stage = %task.stage_id, "invoking producer");
            let result =
                process::run_command(&spec.bin, &args, Some(&task.output_dir), self.timeout)?;

            match classify(&result) {
                None => {
                    debug!(producer = %spec.id, "producer succeeded");
                    return Ok(FallbackOutcome {
                        success: true,
                        output: Some(result.stdout),
                        used_producer: Some(spec.id.clone()),
                        signal: None,
                        attempts,
                    });
                }
                Some((signal, detail)) => {
                    warn!(
                        producer = %spec.id,
                        signal = %signal,
                        "producer failed, trying next: {detail}"
                    );
                    attempts.push(InvocationAttempt {
                        producer: spec.id.clone(),
                        signal,
                        detail,
                    });
                }
            }
        }

        let signal = attempts.last().map(|a| a.signal);
        Ok(FallbackOutcome {
            success: false,
            output: None,
            used_producer: None,
            signal,
            attempts,
        })
    }
}

/// Classify a finished producer invocation. `None` means success.
fn classify(result: &process::ProcessResult) -> Option<(FallbackSignal, String)> {
    if result.timed_out {
        return Some((
            FallbackSignal::Timeout,
            format!("no completion within timeout ({:?})", result.duration),
        ));
    }

    let combined = result.combined_output();
    if let Some(pattern) = matches_error_pattern(&combined) {
        return Some((
            FallbackSignal::ProducerError,
            format!("output matched error pattern '{pattern}'"),
        ));
    }

    if !result.success() {
        return Some((
            FallbackSignal::OutputInvalid,
            format!("exit code {:?} without recognizable output", result.exit_code),
        ));
    }

    // Empty output from a clean exit is indistinguishable from a hang that
    // was cut short; treat it as a timeout-class failure.
    if result.stdout.trim().is_empty() {
        return Some((
            FallbackSignal::Timeout,
            "producer returned no output".to_string(),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn process_result(
        exit_code: Option<i32>,
        stdout: &str,
        stderr: &str,
        timed_out: bool,
    ) -> process::ProcessResult {
        process::ProcessResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            timed_out,
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_classify_success() {
        assert!(classify(&process_result(Some(0), "artifact written", "", false)).is_none());
    }

    #[test]
    fn test_classify_timeout() {
        let (signal, _) = classify(&process_result(None, "", "", true)).unwrap();
        assert_eq!(signal, FallbackSignal::Timeout);
    }

    #[test]
    fn test_classify_error_pattern() {
        let (signal, detail) =
            classify(&process_result(Some(0), "Error: rate limit hit", "", false)).unwrap();
        assert_eq!(signal, FallbackSignal::ProducerError);
        assert!(detail.contains("rate limit"));
    }

    #[test]
    fn test_classify_error_pattern_beats_exit_code() {
        let (signal, _) =
            classify(&process_result(Some(1), "", "quota exceeded", false)).unwrap();
        assert_eq!(signal, FallbackSignal::ProducerError);
    }

    #[test]
    fn test_classify_bad_exit_is_output_invalid() {
        let (signal, _) = classify(&process_result(Some(2), "garbage", "", false)).unwrap();
        assert_eq!(signal, FallbackSignal::OutputInvalid);
    }

    #[test]
    fn test_classify_empty_output_is_timeout() {
        let (signal, _) = classify(&process_result(Some(0), "  \n", "", false)).unwrap();
        assert_eq!(signal, FallbackSignal::Timeout);
    }
}
