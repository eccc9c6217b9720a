use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use common::error::IndexerError;

use super::RetryPolicy;
use crate::util::snippet;

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code:?}: {stderr}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("`{command}` failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        command: String,
        attempts: u32,
        #[source]
        last: Box<ProcessError>,
    },
}

impl IndexerError for ProcessError {}

/// Executes a single attempt of a command
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> Result<CommandOutput, ProcessError>;
}

/// Runs commands through `sh -c`
///
/// The child is killed if the attempt's future is dropped, e.g. on timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str) -> Result<CommandOutput, ProcessError> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProcessError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let detail = if stderr.trim().is_empty() {
                &stdout
            } else {
                &stderr
            };
            return Err(ProcessError::NonZeroExit {
                command: command.to_string(),
                code: output.status.code(),
                stderr: snippet(detail),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Observer invoked before every retry with the failed attempt number, its
/// error and the delay about to be slept
pub type RetryHook = Arc<dyn Fn(u32, &ProcessError, Duration) + Send + Sync>;

fn log_retry(attempt: u32, error: &ProcessError, delay: Duration) {
    warn!(
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "Command attempt failed, retrying"
    );
}

/// Timeout and backoff wrapper around a [`CommandExecutor`]
#[derive(Clone)]
pub struct ProcessRunner {
    executor: Arc<dyn CommandExecutor>,
    on_retry: RetryHook,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::with_executor(Arc::new(ShellExecutor))
    }

    pub fn with_executor(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            on_retry: Arc::new(log_retry),
        }
    }

    /// Replace the retry observer
    pub fn on_retry(mut self, hook: RetryHook) -> Self {
        self.on_retry = hook;
        self
    }

    /// Run `command` until it succeeds or `policy.max_retries + 1` attempts fail
    pub async fn run(
        &self,
        command: &str,
        policy: &RetryPolicy,
    ) -> Result<CommandOutput, ProcessError> {
        let attempts = policy.total_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match timeout(policy.timeout, self.executor.execute(command)).await {
                Ok(result) => result,
                Err(_) => Err(ProcessError::Timeout {
                    command: command.to_string(),
                    timeout_ms: policy.timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(output) => {
                    if attempt > 1 {
                        debug!(attempt, "Command succeeded after retry");
                    }
                    return Ok(output);
                }
                Err(error) if attempt < attempts => {
                    let delay = policy.delay_for_attempt(attempt);
                    (self.on_retry)(attempt, &error, delay);
                    sleep(delay).await;
                }
                Err(error) => {
                    warn!(attempts, error = %error, "All command attempts exhausted");
                    return Err(ProcessError::RetriesExhausted {
                        command: command.to_string(),
                        attempts,
                        last: Box::new(error),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Fails the first `failures` calls, then echoes the command
    struct FlakyExecutor {
        failures: u32,
        calls: AtomicU32,
        started: Mutex<Vec<Instant>>,
        hang: Option<Duration>,
    }

    impl FlakyExecutor {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                started: Mutex::new(Vec::new()),
                hang: None,
            }
        }

        fn hanging(duration: Duration) -> Self {
            Self {
                hang: Some(duration),
                ..Self::failing(0)
            }
        }
    }

    #[async_trait]
    impl CommandExecutor for FlakyExecutor {
        async fn execute(&self, command: &str) -> Result<CommandOutput, ProcessError> {
            self.started.lock().unwrap().push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(duration) = self.hang {
                sleep(duration).await;
            }
            if call < self.failures {
                return Err(ProcessError::NonZeroExit {
                    command: command.to_string(),
                    code: Some(1),
                    stderr: "boom".to_string(),
                });
            }
            Ok(CommandOutput {
                stdout: command.to_string(),
                stderr: String::new(),
            })
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(1),
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_attempts_and_delays() {
        let executor = Arc::new(FlakyExecutor::failing(u32::MAX));
        let hooks = Arc::new(Mutex::new(Vec::new()));
        let hooks_clone = hooks.clone();

        let runner = ProcessRunner::with_executor(executor.clone()).on_retry(Arc::new(
            move |attempt: u32, _error: &ProcessError, delay: Duration| {
                hooks_clone.lock().unwrap().push((attempt, delay));
            },
        ));

        let err = runner.run("false", &fast_policy(2)).await.unwrap_err();

        match err {
            ProcessError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ProcessError::NonZeroExit { .. }));
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }

        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);

        let started = executor.started.lock().unwrap().clone();
        assert_eq!(started[1] - started[0], Duration::from_millis(100));
        assert_eq!(started[2] - started[1], Duration::from_millis(200));

        assert_eq!(
            *hooks.lock().unwrap(),
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(200))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failure() {
        let executor = Arc::new(FlakyExecutor::failing(1));
        let runner = ProcessRunner::with_executor(executor.clone());

        let output = runner.run("echo ok", &fast_policy(3)).await.unwrap();

        assert_eq!(output.stdout, "echo ok");
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let executor = Arc::new(FlakyExecutor::hanging(Duration::from_secs(30)));
        let runner = ProcessRunner::with_executor(executor.clone());

        let err = runner.run("sleep 30", &fast_policy(1)).await.unwrap_err();

        match err {
            ProcessError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(
                    *last,
                    ProcessError::Timeout {
                        timeout_ms: 1000,
                        ..
                    }
                ));
            }
            other => panic!("Expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_executor_captures_stdout() {
        let output = ShellExecutor.execute("echo hello").await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_executor_reports_exit_code() {
        let err = ShellExecutor
            .execute("echo nope >&2; exit 3")
            .await
            .unwrap_err();
        match err {
            ProcessError::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "nope");
            }
            other => panic!("Expected NonZeroExit, got {other:?}"),
        }
    }
}
