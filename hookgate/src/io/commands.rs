//! Command runner seam for validation commands.
//!
//! The [`CommandRunner`] trait decouples the validation checker from process
//! spawning. Tests use scripted runners that return fixed outcomes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::io::process::{run_command_with_timeout, shell_command};

#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Shell command line, already expanded.
    pub command: String,
    pub workdir: PathBuf,
    pub timeout: Duration,
    /// Bytes of stdout/stderr kept per stream.
    pub output_limit_bytes: usize,
}

/// What a finished (or killed) command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub timed_out: bool,
    pub output: String,
}

pub trait CommandRunner {
    /// Run one command. `Err` means it could not be started or awaited.
    fn run(&self, request: &CommandRequest) -> Result<CommandOutcome>;
}

/// Runs commands through `sh -c` in the project root.
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        let cmd = shell_command(&request.command, &request.workdir);
        let output = run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)
            .with_context(|| format!("run `{}`", request.command))?;
        Ok(CommandOutcome {
            exit_code: output.status.code(),
            success: output.status.success() && !output.timed_out,
            timed_out: output.timed_out,
            output: output.combined_text(),
        })
    }
}
