//! External converter invocations.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::contract::ToolRunner;
use crate::error::ProcessError;

/// One call of an external converter: program, ordered arguments and the
/// file it is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub output: PathBuf,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, args: Vec<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            output: output.into(),
        }
    }

    /// Program name followed by its arguments.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line().join(" "))
    }
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Runs converters as child processes of this one.
#[derive(Debug, Clone, Default)]
pub struct SystemToolRunner {
    timeout: Option<Duration>,
}

impl SystemToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kills the child and fails once `timeout` has elapsed. Without a
    /// timeout the call waits for as long as the child runs.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ToolRunner for SystemToolRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<(), ProcessError> {
        let program = invocation.program.as_str();
        let mut command = Command::new(program);
        command.args(&invocation.args).kill_on_drop(true);

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.status()).await {
                Ok(status) => status,
                Err(_) => {
                    tracing::error!(
                        program,
                        seconds = limit.as_secs(),
                        "External tool timed out"
                    );
                    return Err(ProcessError::Timeout {
                        program: program.to_string(),
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => command.status().await,
        };

        match status {
            Ok(s) if s.success() => {
                tracing::info!(
                    program,
                    output = %invocation.output.display(),
                    status = ?s,
                    "External tool finished"
                );
                Ok(())
            }
            Ok(s) => {
                tracing::error!(
                    program,
                    output = %invocation.output.display(),
                    "External tool exited with non-zero code: {}", s
                );
                Err(ProcessError::Exit {
                    program: program.to_string(),
                    status: s.to_string(),
                })
            }
            Err(e) => {
                tracing::error!(error = ?e, program, "Failed to launch external tool");
                Err(ProcessError::Launch {
                    program: program.to_string(),
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_starts_with_program() {
        let invocation = ToolInvocation::new(
            "pmtiles",
            vec!["convert".into(), "a.mbtiles".into(), "a.pmtiles".into()],
            "a.pmtiles",
        );
        assert_eq!(
            invocation.command_line(),
            vec!["pmtiles", "convert", "a.mbtiles", "a.pmtiles"]
        );
        assert_eq!(invocation.to_string(), "pmtiles convert a.mbtiles a.pmtiles");
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let runner = SystemToolRunner::new();
        let invocation = ToolInvocation::new(
            "cloudtile-definitely-not-installed",
            vec![],
            "never.out",
        );
        let err = runner.run(&invocation).await.unwrap_err();
        assert!(matches!(err, ProcessError::Launch { .. }));
    }
}
