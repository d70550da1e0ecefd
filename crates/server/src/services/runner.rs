// Adapter for the code execution service.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("execution timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("execution failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, source: &str, stdin: &str) -> Result<RunOutput, RunError>;
}

/// Runs code with a local interpreter under a wall-clock limit.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.run_program.clone(),
            config.run_args.clone(),
            Duration::from_secs(config.run_timeout_secs),
        )
    }
}

#[async_trait]
impl CodeRunner for ProcessRunner {
    async fn run(&self, source: &str, stdin: &str) -> Result<RunOutput, RunError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut pipe) = child.stdin.take() {
            let input = stdin.to_owned();
            tokio::spawn(async move {
                // Programs that never read stdin close the pipe early.
                if let Err(err) = pipe.write_all(input.as_bytes()).await {
                    debug!(%err, "stdin not fully consumed");
                }
            });
        }

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(program = %self.program, timeout = ?self.timeout, "execution timed out");
                return Err(RunError::Timeout(self.timeout));
            }
        };

        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

const ERROR_KEYWORDS: [&str; 4] = ["Error", "Exception", "error:", "panicked"];

/// Reduce interpreter stderr to the one line worth showing a student.
pub fn simplify_error(stderr: &str) -> Option<String> {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines
        .iter()
        .rev()
        .find(|line| ERROR_KEYWORDS.iter().any(|keyword| line.contains(keyword)))
        .or_else(|| lines.last())
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(timeout_secs: u64) -> ProcessRunner {
        ProcessRunner::new(
            "sh",
            vec!["-c".to_string()],
            Duration::from_secs(timeout_secs),
        )
    }

    #[test]
    fn simplify_picks_the_last_error_line() {
        let stderr = "Traceback (most recent call last):\n  File \"main.py\", line 2, in <module>\n    x = int('a')\nValueError: invalid literal for int() with base 10: 'a'\n";
        assert_eq!(
            simplify_error(stderr).as_deref(),
            Some("ValueError: invalid literal for int() with base 10: 'a'")
        );
        assert_eq!(
            simplify_error("thread 'main' panicked at src/main.rs:2:5\nnote: run with RUST_BACKTRACE=1\n")
                .as_deref(),
            Some("thread 'main' panicked at src/main.rs:2:5")
        );
    }

    #[test]
    fn simplify_falls_back_to_the_last_line() {
        assert_eq!(
            simplify_error("warning one\nsomething odd\n\n").as_deref(),
            Some("something odd")
        );
        assert_eq!(simplify_error("  \n"), None);
    }

    #[tokio::test]
    async fn runs_with_stdin() {
        let output = shell(5)
            .run("read n; echo \"got $n\"; echo oops >&2", "41\n")
            .await
            .unwrap();
        assert_eq!(output.stdout, "got 41\n");
        assert_eq!(output.stderr, "oops\n");
        assert_eq!(output.exit_code, Some(0));
    }

    #[tokio::test]
    async fn reports_nonzero_exit() {
        let output = shell(5).run("exit 3", "").await.unwrap();
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn times_out_long_runs() {
        let started = std::time::Instant::now();
        let err = shell(1).run("sleep 10", "").await.unwrap_err();
        assert!(matches!(err, RunError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_spawn_error() {
        let runner = ProcessRunner::new("pairlab-no-such-binary", vec![], Duration::from_secs(1));
        assert!(matches!(
            runner.run("", "").await,
            Err(RunError::Spawn { .. })
        ));
    }
}
