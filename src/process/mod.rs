//! Timeout-bounded child process execution.
//!
//! All external work (producer invocations, command-type quality checks)
//! funnels through here: processes are spawned with piped output, drained on
//! reader threads, waited on with a hard timeout, and killed on expiry. A
//! timed-out process is never left running.

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Timeout for collecting output from child process pipes after exit.
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum captured output size per stream (10MB).
const MAX_OUTPUT_SIZE: usize = 10 * 1024 * 1024;

/// Outcome of one child process invocation.
///
/// `exit_code` is `None` when the process was killed (timeout) or terminated
/// by a signal.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl ProcessResult {
    /// Clean zero exit within the timeout.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Both streams joined, for pattern classification.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Run a shell command (`sh -c` on Unix, `cmd /C` on Windows) with a timeout.
pub fn run_shell(
    command: &str,
    working_dir: Option<&Path>,
    timeout: Duration,
) -> Result<ProcessResult> {
    let mut cmd = if cfg!(target_family = "unix") {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    } else {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    };
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    let child = spawn_piped(cmd).with_context(|| format!("Failed to spawn command: {command}"))?;
    wait_with_timeout(child, command, timeout)
}

/// Run a binary directly (no shell) with a timeout.
pub fn run_command(
    bin: &str,
    args: &[String],
    working_dir: Option<&Path>,
    timeout: Duration,
) -> Result<ProcessResult> {
    let mut cmd = Command::new(bin);
    cmd.args(args);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    let child = spawn_piped(cmd).with_context(|| format!("Failed to spawn producer: {bin}"))?;
    wait_with_timeout(child, bin, timeout)
}

fn spawn_piped(mut cmd: Command) -> std::io::Result<Child> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd.spawn()
}

/// Wait for a spawned child, draining its pipes concurrently.
///
/// Output must be read BEFORE waiting for exit: if we wait first, the child
/// can block on write() once the pipe buffer fills (~64KB on Linux), which
/// deadlocks against our wait.
fn wait_with_timeout(mut child: Child, label: &str, timeout: Duration) -> Result<ProcessResult> {
    let start = Instant::now();

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let (stdout_tx, stdout_rx) = mpsc::channel();
    let (stderr_tx, stderr_rx) = mpsc::channel();

    if let Some(stdout) = stdout_handle {
        thread::spawn(move || {
            let _ = stdout_tx.send(read_stream_to_string(stdout));
        });
    } else {
        let _ = stdout_tx.send(String::new());
    }

    if let Some(stderr) = stderr_handle {
        thread::spawn(move || {
            let _ = stderr_tx.send(read_stream_to_string(stderr));
        });
    } else {
        let _ = stderr_tx.send(String::new());
    }

    let wait_result = child
        .wait_timeout(timeout)
        .with_context(|| format!("Failed to wait for: {label}"))?;

    let duration = start.elapsed();

    let stdout = stdout_rx
        .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
        .unwrap_or_else(|_| "[output collection timed out]".to_string());
    let stderr = stderr_rx
        .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
        .unwrap_or_else(|_| "[output collection timed out]".to_string());

    match wait_result {
        Some(status) => Ok(ProcessResult {
            exit_code: status.code(),
            stdout,
            stderr,
            timed_out: false,
            duration,
        }),
        None => {
            // Timed out: kill and reap so nothing is left running
            let _ = child.kill();
            let _ = child.wait();

            Ok(ProcessResult {
                exit_code: None,
                stdout,
                stderr: format!(
                    "{}\n[process killed after {}s timeout]",
                    stderr,
                    timeout.as_secs()
                ),
                timed_out: true,
                duration,
            })
        }
    }
}

/// Read a stream to string, bounded at MAX_OUTPUT_SIZE.
///
/// Past the limit the remaining data is drained and discarded to avoid
/// broken-pipe errors in the child.
fn read_stream_to_string<R: Read>(mut stream: R) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break, // EOF
            Ok(n) => {
                let remaining = MAX_OUTPUT_SIZE.saturating_sub(buf.len());
                let to_copy = n.min(remaining);
                buf.extend_from_slice(&chunk[..to_copy]);
                if to_copy < n {
                    let mut discard = [0u8; 8192];
                    while stream.read(&mut discard).unwrap_or(0) > 0 {}
                    buf.extend_from_slice(b"\n[output truncated at 10MB]");
                    break;
                }
            }
            Err(_) => {
                if buf.is_empty() {
                    return "[error reading output]".to_string();
                }
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}
