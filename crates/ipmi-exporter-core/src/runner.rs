//! Execution of the external sensor-query command.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::{Error, Result};

/// Captured result of one command invocation.
///
/// `stdout` and `error` are independent of each other: a command that exits
/// unsuccessfully still hands back whatever it printed.
#[derive(Debug, Default)]
pub struct CommandOutput {
    /// Standard output bytes (possibly empty).
    pub stdout: Vec<u8>,
    /// Wall-clock time spent waiting for the command.
    pub duration: Duration,
    /// Why the command failed, if it did.
    pub error: Option<Error>,
}

/// Runs an external command line.
///
/// `argv[0]` is the program. A `timeout` of `None` waits indefinitely.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[String], timeout: Option<Duration>) -> CommandOutput;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, argv: &[String], timeout: Option<Duration>) -> CommandOutput {
        let start = Instant::now();
        let (stdout, failure) = match spawn_and_wait(argv, timeout).await {
            Ok(output) if output.status.success() => (output.stdout, None),
            Ok(output) => {
                let failure = Error::ExitStatus {
                    program: argv[0].clone(),
                    status: output.status,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                };
                (output.stdout, Some(failure))
            }
            Err(e) => (Vec::new(), Some(e)),
        };
        let duration = start.elapsed();

        match &failure {
            Some(e) => debug!("Command failed after {:?}: {}", duration, e),
            None => debug!("{} finished in {:?}", argv[0], duration),
        }

        CommandOutput {
            stdout,
            duration,
            error: failure,
        }
    }
}

/// Spawns the child and collects its output, killing it if the timeout expires.
async fn spawn_and_wait(argv: &[String], timeout: Option<Duration>) -> Result<Output> {
    let (program, args) = argv.split_first().ok_or(Error::EmptyCommand)?;
    debug!("Running {} {}", program, args.join(" "));

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::Spawn {
            program: program.clone(),
            source,
        })?;

    // Dropping the wait future drops the child, which kills it.
    let wait = child.wait_with_output();
    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| Error::Timeout {
                program: program.clone(),
                timeout: limit,
            })?,
        None => wait.await,
    };

    output.map_err(|source| Error::Spawn {
        program: program.clone(),
        source,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = ProcessRunner.run(&sh("printf 'a | 1 | volts'"), None).await;
        assert!(out.error.is_none());
        assert_eq!(out.stdout, b"a | 1 | volts");
    }

    #[tokio::test]
    async fn test_nonzero_exit_keeps_output() {
        let out = ProcessRunner.run(&sh("printf partial; exit 3"), None).await;
        assert_eq!(out.stdout, b"partial");
        assert!(matches!(out.error, Some(Error::ExitStatus { .. })));
    }

    #[tokio::test]
    async fn test_timeout_cancels_child() {
        let limit = Duration::from_millis(100);
        let out = ProcessRunner.run(&sh("sleep 5"), Some(limit)).await;
        assert!(matches!(out.error, Some(Error::Timeout { .. })));
        assert!(out.duration >= limit);
        assert!(out.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let argv = vec!["/nonexistent/ipmitool".to_string(), "sensor".to_string()];
        let out = ProcessRunner.run(&argv, None).await;
        assert!(out.stdout.is_empty());
        assert!(matches!(out.error, Some(Error::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let out = ProcessRunner.run(&[], None).await;
        assert!(matches!(out.error, Some(Error::EmptyCommand)));
    }
}
