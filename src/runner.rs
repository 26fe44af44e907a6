//! Shell command execution for the AWS CLI backend
//!
//! Two entry points:
//! - [`CommandRunner::run`] fails with [`Error::CommandFailed`] carrying the
//!   captured stdout/stderr.
//! - [`CommandRunner::run_safe`] never fails; it returns a [`CommandOutcome`]
//!   so callers can recognise expected failures such as a no-op stack update.

use crate::error::{Error, Result};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

/// Cap on captured output per stream; reading stops once it is exceeded
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Text CloudFormation reports when an update changes nothing
pub const NO_UPDATES_MARKER: &str = "No updates are to be performed";

/// Result of a safe command run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success {
        stdout: String,
    },
    Failed {
        error: String,
        stdout: String,
        stderr: String,
    },
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success { .. })
    }

    /// A failure that only says the stack is already up to date
    pub fn is_no_op_update(&self) -> bool {
        match self {
            CommandOutcome::Success { .. } => false,
            CommandOutcome::Failed {
                error,
                stdout,
                stderr,
            } => [error, stdout, stderr]
                .iter()
                .any(|text| text.contains(NO_UPDATES_MARKER)),
        }
    }

    /// Everything captured, for matching on error text
    pub fn failure_text(&self) -> String {
        match self {
            CommandOutcome::Success { .. } => String::new(),
            CommandOutcome::Failed {
                error,
                stdout,
                stderr,
            } => format!("{error}\n{stdout}\n{stderr}"),
        }
    }

    /// Convert into the strict form
    pub fn into_result(self, description: &str) -> Result<String> {
        match self {
            CommandOutcome::Success { stdout } => Ok(stdout),
            CommandOutcome::Failed {
                error,
                stdout,
                stderr,
            } => Err(Error::CommandFailed {
                description: description.to_string(),
                error,
                stdout,
                stderr,
            }),
        }
    }
}

/// Runs command strings through `sh -c`
#[derive(Debug, Clone)]
pub struct CommandRunner {
    shell: String,
    max_output: usize,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            max_output: MAX_OUTPUT_BYTES,
        }
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    /// Run a command, failing with the captured output on a non-zero exit
    pub async fn run(&self, command: &str, description: &str) -> Result<String> {
        self.run_safe(command, description)
            .await
            .into_result(description)
    }

    /// Run a command and report the outcome without failing
    pub async fn run_safe(&self, command: &str, description: &str) -> CommandOutcome {
        info!("{}", description);
        debug!(command = %command, "Executing");

        let mut child = match Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return CommandOutcome::Failed {
                    error: format!("failed to spawn {}: {}", self.shell, e),
                    stdout: String::new(),
                    stderr: String::new(),
                }
            }
        };

        let captured = tokio::try_join!(
            read_capped(child.stdout.take(), self.max_output),
            read_capped(child.stderr.take(), self.max_output),
        );
        let (stdout, stderr) = match captured {
            Ok(streams) => streams,
            Err(e) => {
                let _ = child.kill().await;
                let error = match e {
                    CaptureError::Overflow => {
                        format!("output exceeded the {} byte buffer", self.max_output)
                    }
                    CaptureError::Io(e) => format!("failed to read output: {e}"),
                };
                return CommandOutcome::Failed {
                    error,
                    stdout: String::new(),
                    stderr: String::new(),
                };
            }
        };

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                return CommandOutcome::Failed {
                    error: format!("failed to wait for {}: {}", self.shell, e),
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                }
            }
        };
        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if status.success() {
            CommandOutcome::Success { stdout }
        } else {
            debug!(status = %status, stderr = %stderr.trim(), "Command failed");
            CommandOutcome::Failed {
                error: status.to_string(),
                stdout,
                stderr,
            }
        }
    }
}

enum CaptureError {
    Overflow,
    Io(std::io::Error),
}

/// Read a pipe to EOF, giving up as soon as it yields more than `limit` bytes
async fn read_capped<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    limit: usize,
) -> std::result::Result<Vec<u8>, CaptureError> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        pipe.take(limit as u64 + 1)
            .read_to_end(&mut buf)
            .await
            .map_err(CaptureError::Io)?;
    }
    if buf.len() > limit {
        return Err(CaptureError::Overflow);
    }
    Ok(buf)
}
