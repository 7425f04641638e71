//! Post-edit validation: run the configured commands for an edited file.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::checks::{active_task, config_or_default};
use crate::core::budget::bounded_timeout;
use crate::core::classifier::project_relative;
use crate::core::pattern::GlobPattern;
use crate::core::shell::shell_quote;
use crate::core::types::{CheckResult, CommandFailure, CommandResult, Reason, ValidationSummary};
use crate::io::commands::{CommandRequest, CommandRunner};
use crate::io::config::ValidationConfig;
use crate::io::store::StateStore;

/// Run every validation command whose rule matches `file_path`.
///
/// `timeout` caps each command; `deadline` caps the whole run. Commands that
/// cannot start before the deadline are recorded as timed out without running.
pub fn run_validation<S, R>(
    store: &S,
    runner: &R,
    file_path: &str,
    timeout: Duration,
    deadline: Instant,
) -> CheckResult
where
    S: StateStore + ?Sized,
    R: CommandRunner + ?Sized,
{
    let config = config_or_default(store);
    let relative = project_relative(store.root(), Path::new(file_path));
    let task = active_task(store);

    let gate = config.quality_gate(task.as_ref().and_then(|t| t.task_type.as_deref()));
    if !gate.validate {
        let mut result = CheckResult::allow(Reason::ValidationDisabled);
        result.task = task;
        return result;
    }

    let relative_str = relative.to_string_lossy().replace('\\', "/");
    let commands = matching_commands(&config.validation, &relative, &relative_str);
    if commands.is_empty() {
        debug!(path = %relative_str, "no validation rules match");
        let mut result = CheckResult::allow(Reason::NoValidationConfigured);
        result.validation = Some(ValidationSummary {
            skipped: true,
            passed: true,
            results: Vec::new(),
        });
        result.task = task;
        return result;
    }

    let limit = Duration::from_secs(config.validation.timeout_secs).min(timeout);
    let excerpt_bytes = config.validation.output_excerpt_bytes;
    let results: Vec<CommandResult> = commands
        .into_iter()
        .map(|command| run_one(runner, store.root(), command, limit, deadline, excerpt_bytes))
        .collect();

    let passed = results.iter().all(|result| result.passed);
    let summary = ValidationSummary {
        skipped: false,
        passed,
        results,
    };
    info!(
        path = %relative_str,
        commands = summary.results.len(),
        passed,
        "validation finished"
    );

    let mut result = if passed {
        CheckResult::allow(Reason::ValidationPassed).with_message(format!(
            "Validation passed for {relative_str} ({} command(s)).",
            summary.results.len()
        ))
    } else {
        let message = failure_message(&relative_str, &summary);
        if gate.block_on_failure {
            CheckResult::block(Reason::ValidationFailed, message)
        } else {
            CheckResult::warn(Reason::ValidationFailed, message)
        }
    };
    result.validation = Some(summary);
    result.task = task;
    result
}

/// Expanded commands of every matching rule, deduplicated in rule order.
fn matching_commands(config: &ValidationConfig, relative: &Path, relative_str: &str) -> Vec<String> {
    let quoted = shell_quote(relative_str);
    let mut commands: Vec<String> = Vec::new();
    for rule in &config.rules {
        let pattern = match GlobPattern::new(&rule.pattern) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(pattern = %rule.pattern, err = %format!("{err:#}"), "skipping invalid validation pattern");
                continue;
            }
        };
        if !pattern.matches(relative) {
            continue;
        }
        debug!(pattern = pattern.as_str(), file = relative_str, "validation rule matched");
        for command in &rule.commands {
            let expanded = command.replace("{file}", &quoted);
            if !commands.contains(&expanded) {
                commands.push(expanded);
            }
        }
    }
    commands
}

fn run_one<R: CommandRunner + ?Sized>(
    runner: &R,
    workdir: &Path,
    command: String,
    limit: Duration,
    deadline: Instant,
    excerpt_bytes: usize,
) -> CommandResult {
    let timeout = match bounded_timeout(limit, deadline) {
        Ok(timeout) => timeout,
        Err(err) => {
            warn!(command = %command, "not started: {err}");
            return CommandResult {
                command,
                exit_code: None,
                passed: false,
                failure: Some(CommandFailure::Timeout),
                output_excerpt: format!("not started: {err}"),
            };
        }
    };

    let request = CommandRequest {
        command,
        workdir: workdir.to_path_buf(),
        timeout,
        output_limit_bytes: excerpt_bytes,
    };
    debug!(command = %request.command, timeout_ms = timeout.as_millis() as u64, "running validation command");

    match runner.run(&request) {
        Ok(outcome) => {
            let failure = if outcome.timed_out {
                Some(CommandFailure::Timeout)
            } else if !outcome.success {
                Some(CommandFailure::ExitCode)
            } else {
                None
            };
            CommandResult {
                command: request.command,
                exit_code: outcome.exit_code,
                passed: failure.is_none(),
                failure,
                output_excerpt: excerpt(&outcome.output, excerpt_bytes),
            }
        }
        Err(err) => {
            warn!(command = %request.command, err = %format!("{err:#}"), "validation command failed to run");
            CommandResult {
                command: request.command,
                exit_code: None,
                passed: false,
                failure: Some(CommandFailure::Spawn),
                output_excerpt: excerpt(&format!("{err:#}"), excerpt_bytes),
            }
        }
    }
}

fn failure_message(relative: &str, summary: &ValidationSummary) -> String {
    let failed: Vec<&CommandResult> = summary.results.iter().filter(|r| !r.passed).collect();
    let mut message = format!(
        "Validation failed for {relative} ({} of {} command(s)):",
        failed.len(),
        summary.results.len()
    );
    for result in failed {
        let status = match (result.failure, result.exit_code) {
            (Some(CommandFailure::Timeout), _) => "timed out".to_string(),
            (Some(CommandFailure::Spawn), _) => "could not run".to_string(),
            (_, Some(code)) => format!("exit code {code}"),
            (_, None) => "terminated by signal".to_string(),
        };
        message.push_str(&format!("\n\n$ {}\n{status}", result.command));
        if !result.output_excerpt.is_empty() {
            message.push('\n');
            message.push_str(&result.output_excerpt);
        }
    }
    message
}

/// Trimmed output cut to at most `limit` bytes on a char boundary.
pub fn excerpt(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... [{} more bytes]", &text[..end], text.len() - end)
}
