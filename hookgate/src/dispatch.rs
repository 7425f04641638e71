//! Hook entry dispatch.
//!
//! One invocation handles one host event: read the envelope, normalize it
//! through the adapter, run the event's checkers against the project's state
//! store, and render the merged result back into the host's response.
//!
//! Dispatch fails open. A malformed envelope, an unreadable store, an
//! unexpected error or a panic all produce the adapter's "continue" response;
//! the detail goes to stderr through `tracing`.

use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapters::HostAdapter;
use crate::checks::component_reuse::check_component_reuse;
use crate::checks::config_or_default;
use crate::checks::loop_check::{check_loop, check_stop};
use crate::checks::session_context::gather_session_context;
use crate::checks::task_gate::check_task_gate;
use crate::checks::validation::run_validation;
use crate::core::merge::merge_results;
use crate::core::types::{CheckResult, HookEvent, HookRequest, Operation, Reason};
use crate::io::commands::{CommandRunner, ShellCommandRunner};
use crate::io::config::{HookConfig, HookMode};
use crate::io::store::{FsStateStore, StateStore};

/// Time reserved for writing the response before the host's timeout.
const RESPONSE_MARGIN: Duration = Duration::from_millis(500);

/// Handle one hook invocation end to end. Never fails.
pub fn run_hook(
    adapter: &dyn HostAdapter,
    event: HookEvent,
    input: &str,
    root_override: Option<&Path>,
) -> Value {
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        try_run_hook(adapter, event, input, root_override, started)
    }));
    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!(event = event.as_str(), err = %format!("{err:#}"), "hook failed, allowing");
            adapter.fail_open(event)
        }
        Err(_) => {
            error!(event = event.as_str(), "hook panicked, allowing");
            adapter.fail_open(event)
        }
    }
}

fn try_run_hook(
    adapter: &dyn HostAdapter,
    event: HookEvent,
    input: &str,
    root_override: Option<&Path>,
    started: Instant,
) -> Result<Value> {
    let raw = parse_envelope(input)?;
    let request = adapter
        .parse_input(&raw)
        .with_context(|| format!("parse {} envelope", adapter.kind().as_str()))?;
    if let Some(named) = request.event.filter(|named| *named != event) {
        warn!(
            expected = event.as_str(),
            envelope = named.as_str(),
            "envelope names a different event"
        );
    }

    let root = project_root(root_override, &request)?;
    debug!(
        root = %root.display(),
        event = event.as_str(),
        session_id = request.session_id.as_deref().unwrap_or("-"),
        source = request.source.as_deref().unwrap_or("-"),
        "dispatching hook"
    );
    let store = FsStateStore::new(root);
    Ok(respond(adapter, &store, &ShellCommandRunner, event, &request, started))
}

/// Evaluate and render, converting panics in the checkers into a fail-open response.
pub fn respond<S, R>(
    adapter: &dyn HostAdapter,
    store: &S,
    runner: &R,
    event: HookEvent,
    request: &HookRequest,
    started: Instant,
) -> Value
where
    S: StateStore + ?Sized,
    R: CommandRunner + ?Sized,
{
    let evaluated = panic::catch_unwind(AssertUnwindSafe(|| {
        evaluate(store, runner, event, request, started)
    }));
    match evaluated {
        Ok(result) => {
            info!(
                event = event.as_str(),
                reason = ?result.reason,
                blocked = result.blocked,
                warning = result.warning,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "hook evaluated"
            );
            adapter.transform_result(event, &result)
        }
        Err(_) => {
            error!(event = event.as_str(), "checker panicked, allowing");
            adapter.fail_open(event)
        }
    }
}

/// Run the checkers for `event` and apply the configured hook policy.
pub fn evaluate<S, R>(
    store: &S,
    runner: &R,
    event: HookEvent,
    request: &HookRequest,
    started: Instant,
) -> CheckResult
where
    S: StateStore + ?Sized,
    R: CommandRunner + ?Sized,
{
    let config = config_or_default(store);
    let policy = config.hooks.policy(event);
    if !policy.enabled {
        debug!(event = event.as_str(), "hook disabled in config");
        return CheckResult::allow(Reason::HookDisabled);
    }

    let budget = Duration::from_secs(config.hooks.timeout_secs(event));
    let deadline = started + budget.saturating_sub(RESPONSE_MARGIN);

    let result = match event {
        HookEvent::SessionStart => gather_session_context(store, &config.session_context),
        HookEvent::PreEdit => pre_edit(store, request),
        HookEvent::PostEdit => post_edit(store, runner, request, &config, deadline),
        HookEvent::Stop => check_stop(store, request.stop_hook_active),
        HookEvent::SessionEnd => check_loop(store).downgrade_to_warning(),
    };

    match policy.mode {
        HookMode::Block => result,
        HookMode::Warn => result.downgrade_to_warning(),
    }
}

fn pre_edit<S: StateStore + ?Sized>(store: &S, request: &HookRequest) -> CheckResult {
    let Some(file_path) = edited_path(request) else {
        return CheckResult::allow(Reason::NotAnEdit);
    };

    let mut results = vec![check_task_gate(store, file_path, request.operation)];
    if request.operation == Operation::Create {
        let content = request.content.as_deref().unwrap_or_default();
        results.push(check_component_reuse(store, file_path, content));
    }
    merge_results(results).unwrap_or_else(|| CheckResult::allow(Reason::NotAnEdit))
}

fn post_edit<S, R>(
    store: &S,
    runner: &R,
    request: &HookRequest,
    config: &HookConfig,
    deadline: Instant,
) -> CheckResult
where
    S: StateStore + ?Sized,
    R: CommandRunner + ?Sized,
{
    if request.tool_failed {
        return CheckResult::allow(Reason::ToolFailed);
    }
    let Some(file_path) = edited_path(request) else {
        return CheckResult::allow(Reason::NotAnEdit);
    };
    let timeout = Duration::from_secs(config.validation.timeout_secs);
    run_validation(store, runner, file_path, timeout, deadline)
}

fn edited_path(request: &HookRequest) -> Option<&str> {
    request
        .file_path
        .as_deref()
        .filter(|_| request.operation.is_edit())
}

/// Empty input is treated as an empty envelope.
fn parse_envelope(input: &str) -> Result<Value> {
    if input.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(input).context("parse hook envelope")
}

fn project_root(root_override: Option<&Path>, request: &HookRequest) -> Result<PathBuf> {
    if let Some(root) = root_override {
        return Ok(root.to_path_buf());
    }
    if let Some(cwd) = request.cwd.as_ref() {
        return Ok(cwd.clone());
    }
    env::current_dir().context("resolve current directory")
}
