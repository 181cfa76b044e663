//! External command invocation.
//!
//! Captures stdout verbatim. Exit status is logged but not interpreted:
//! qmicli may print usable fields alongside a non-zero status.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::InvokeError;

/// Seam over process execution so the modem pipeline can run against
/// canned output in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and return its stdout as text.
    async fn run(&self, program: &str, args: &[String]) -> Result<String, InvokeError>;
}

/// Runs real child processes, killing any that outlive the timeout.
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, InvokeError> {
        debug!("Executing: {} {:?}", program, args);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, child).await {
            Ok(result) => result.map_err(|source| InvokeError::Spawn {
                program: program.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(InvokeError::Timeout {
                    program: program.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            debug!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Split a command line made of a program and its arguments.
pub fn split_command(command: &[String]) -> Result<(&str, &[String]), InvokeError> {
    command
        .split_first()
        .map(|(program, args)| (program.as_str(), args))
        .ok_or(InvokeError::EmptyCommand)
}
