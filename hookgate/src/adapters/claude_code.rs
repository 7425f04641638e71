//! Claude Code hook adapter.
//!
//! Envelopes arrive as JSON on stdin with `hook_event_name`, `tool_name` and
//! `tool_input`; responses use the `hookSpecificOutput` / `decision` fields of
//! the Claude Code hook protocol.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::adapters::{HookRules, HostAdapter, HostKind, binary_on_path};
use crate::core::shell::shell_quote;
use crate::core::types::{CheckResult, HookEvent, HookRequest, Operation};

/// Tools that write files.
const EDIT_TOOLS_MATCHER: &str = "Write|Edit|MultiEdit|NotebookEdit";

pub struct ClaudeCodeAdapter;

impl HostAdapter for ClaudeCodeAdapter {
    fn kind(&self) -> HostKind {
        HostKind::ClaudeCode
    }

    fn parse_input(&self, raw: &Value) -> Result<HookRequest> {
        let envelope = raw
            .as_object()
            .ok_or_else(|| anyhow!("hook envelope must be a JSON object"))?;

        let cwd = string_field(envelope, "cwd").map(PathBuf::from);
        let tool_name = string_field(envelope, "tool_name");
        let tool_input = envelope.get("tool_input").and_then(Value::as_object);

        let file_path = tool_input
            .and_then(|input| {
                string_field(input, "file_path").or_else(|| string_field(input, "notebook_path"))
            })
            .filter(|path| !path.trim().is_empty());

        let operation = match (tool_name.as_deref(), file_path.as_deref()) {
            (Some("Write"), Some(path)) => {
                if resolve(cwd.as_deref(), path).exists() {
                    Operation::Overwrite
                } else {
                    Operation::Create
                }
            }
            (Some("Edit" | "MultiEdit" | "NotebookEdit"), Some(_)) => Operation::Edit,
            _ => Operation::Other,
        };

        let request = HookRequest {
            event: string_field(envelope, "hook_event_name")
                .as_deref()
                .and_then(event_from_name),
            session_id: string_field(envelope, "session_id"),
            cwd,
            content: tool_input.and_then(|input| edit_content(tool_name.as_deref(), input)),
            tool_name,
            operation,
            file_path,
            tool_failed: envelope
                .get("tool_response")
                .is_some_and(tool_response_failed),
            stop_hook_active: envelope
                .get("stop_hook_active")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            source: string_field(envelope, "source"),
        };
        debug!(
            event = ?request.event,
            tool = ?request.tool_name,
            operation = ?request.operation,
            "parsed claude code envelope"
        );
        Ok(request)
    }

    fn transform_result(&self, event: HookEvent, result: &CheckResult) -> Value {
        let message = result.message.as_deref().filter(|m| !m.trim().is_empty());
        match event {
            HookEvent::PreEdit => {
                if result.blocked {
                    json!({
                        "hookSpecificOutput": {
                            "hookEventName": "PreToolUse",
                            "permissionDecision": "deny",
                            "permissionDecisionReason": message.unwrap_or("Blocked by workflow policy."),
                        }
                    })
                } else {
                    advisory(result.warning.then_some(message).flatten())
                }
            }
            HookEvent::PostEdit => {
                if result.blocked {
                    json!({
                        "decision": "block",
                        "reason": message.unwrap_or("Post-edit validation failed."),
                    })
                } else if let Some(text) = result.warning.then_some(message).flatten() {
                    json!({
                        "continue": true,
                        "hookSpecificOutput": {
                            "hookEventName": "PostToolUse",
                            "additionalContext": text,
                        }
                    })
                } else {
                    advisory(None)
                }
            }
            HookEvent::Stop => {
                if result.blocked {
                    json!({
                        "decision": "block",
                        "reason": stop_reason(result, message),
                    })
                } else {
                    advisory(message)
                }
            }
            HookEvent::SessionStart => match result.context.as_deref() {
                Some(context) => json!({
                    "hookSpecificOutput": {
                        "hookEventName": "SessionStart",
                        "additionalContext": context,
                    }
                }),
                None => advisory(None),
            },
            HookEvent::SessionEnd => advisory(message),
        }
    }

    fn generate_config(&self, rules: &HookRules, project_root: &Path) -> Result<Value> {
        let root = project_root.to_string_lossy();
        let mut hooks = Map::new();
        for registration in &rules.hooks {
            let command = format!(
                "{} hook {} --host {} --root {}",
                shell_quote(&rules.binary),
                registration.event.as_str(),
                HostKind::ClaudeCode.as_str(),
                shell_quote(&root),
            );
            let handler = json!({
                "type": "command",
                "command": command,
                "timeout": registration.timeout_secs,
            });
            let entry = match registration.event {
                HookEvent::PreEdit | HookEvent::PostEdit => json!({
                    "matcher": EDIT_TOOLS_MATCHER,
                    "hooks": [handler],
                }),
                _ => json!({ "hooks": [handler] }),
            };
            hooks.insert(event_name(registration.event).to_string(), json!([entry]));
        }
        Ok(json!({ "hooks": hooks }))
    }

    fn is_available(&self) -> bool {
        binary_on_path(HostKind::ClaudeCode.default_binary())
    }
}

/// Claude Code event name for a dispatcher event.
pub fn event_name(event: HookEvent) -> &'static str {
    match event {
        HookEvent::SessionStart => "SessionStart",
        HookEvent::PreEdit => "PreToolUse",
        HookEvent::PostEdit => "PostToolUse",
        HookEvent::Stop => "Stop",
        HookEvent::SessionEnd => "SessionEnd",
    }
}

fn event_from_name(name: &str) -> Option<HookEvent> {
    match name {
        "SessionStart" => Some(HookEvent::SessionStart),
        "PreToolUse" => Some(HookEvent::PreEdit),
        "PostToolUse" => Some(HookEvent::PostEdit),
        "Stop" | "SubagentStop" => Some(HookEvent::Stop),
        "SessionEnd" => Some(HookEvent::SessionEnd),
        _ => None,
    }
}

fn advisory(message: Option<&str>) -> Value {
    match message {
        Some(text) => json!({ "continue": true, "systemMessage": text }),
        None => json!({ "continue": true }),
    }
}

/// Block reason for a stop, carrying the next-task directive when continuing.
fn stop_reason(result: &CheckResult, message: Option<&str>) -> String {
    let mut reason = message
        .unwrap_or("Acceptance criteria are not met yet.")
        .to_string();
    let next = result
        .loop_status
        .as_ref()
        .and_then(|status| status.continue_to_next.as_deref());
    if let Some(next) = next {
        let directive = format!("/task-start {next}");
        if !reason.contains(&directive) {
            reason.push_str(&format!("\n\nRun: {directive}"));
        }
    }
    reason
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Text the edit introduces: full content for writes, replacement strings for edits.
fn edit_content(tool_name: Option<&str>, input: &Map<String, Value>) -> Option<String> {
    match tool_name {
        Some("Write") => string_field(input, "content"),
        Some("Edit") => string_field(input, "new_string"),
        Some("MultiEdit") => {
            let edits = input.get("edits")?.as_array()?;
            let parts: Vec<&str> = edits
                .iter()
                .filter_map(|edit| edit.get("new_string").and_then(Value::as_str))
                .collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        Some("NotebookEdit") => string_field(input, "new_source"),
        _ => None,
    }
}

fn tool_response_failed(response: &Value) -> bool {
    let Some(object) = response.as_object() else {
        return false;
    };
    object.get("success").and_then(Value::as_bool) == Some(false)
        || object.get("is_error").and_then(Value::as_bool) == Some(true)
        || object.get("error").is_some_and(|error| !error.is_null())
}

fn resolve(cwd: Option<&Path>, path: &str) -> PathBuf {
    let path = Path::new(path);
    match cwd {
        Some(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::HookRegistration;
    use crate::core::types::{LoopState, LoopStatus, Reason};

    fn pre_tool_use(tool: &str, tool_input: Value) -> Value {
        json!({
            "session_id": "abc",
            "cwd": "/nonexistent-project",
            "hook_event_name": "PreToolUse",
            "tool_name": tool,
            "tool_input": tool_input,
        })
    }

    #[test]
    fn write_to_missing_file_is_a_create() {
        let raw = pre_tool_use(
            "Write",
            json!({"file_path": "src/components/Button.tsx", "content": "export const Button = 1;"}),
        );
        let request = ClaudeCodeAdapter.parse_input(&raw).expect("parse");
        assert_eq!(request.event, Some(HookEvent::PreEdit));
        assert_eq!(request.operation, Operation::Create);
        assert_eq!(request.file_path.as_deref(), Some("src/components/Button.tsx"));
        assert_eq!(request.content.as_deref(), Some("export const Button = 1;"));
        assert_eq!(request.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn write_to_existing_file_is_an_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("app.ts"), "x").expect("write");
        let raw = json!({
            "cwd": temp.path(),
            "hook_event_name": "PreToolUse",
            "tool_name": "Write",
            "tool_input": {"file_path": "app.ts", "content": "y"},
        });
        let request = ClaudeCodeAdapter.parse_input(&raw).expect("parse");
        assert_eq!(request.operation, Operation::Overwrite);
    }

    #[test]
    fn multi_edit_collects_replacements() {
        let raw = pre_tool_use(
            "MultiEdit",
            json!({
                "file_path": "src/app.ts",
                "edits": [{"old_string": "a", "new_string": "b"}, {"old_string": "c", "new_string": "d"}]
            }),
        );
        let request = ClaudeCodeAdapter.parse_input(&raw).expect("parse");
        assert_eq!(request.operation, Operation::Edit);
        assert_eq!(request.content.as_deref(), Some("b\nd"));
    }

    #[test]
    fn non_edit_tools_are_other() {
        let raw = pre_tool_use("Bash", json!({"command": "ls"}));
        let request = ClaudeCodeAdapter.parse_input(&raw).expect("parse");
        assert_eq!(request.operation, Operation::Other);
        assert!(request.file_path.is_none());
    }

    #[test]
    fn failed_tool_response_is_detected() {
        let raw = json!({
            "hook_event_name": "PostToolUse",
            "tool_name": "Edit",
            "tool_input": {"file_path": "src/app.ts"},
            "tool_response": {"success": false},
        });
        let request = ClaudeCodeAdapter.parse_input(&raw).expect("parse");
        assert_eq!(request.event, Some(HookEvent::PostEdit));
        assert!(request.tool_failed);
    }

    #[test]
    fn stop_envelope_fields() {
        let raw = json!({"hook_event_name": "Stop", "stop_hook_active": true});
        let request = ClaudeCodeAdapter.parse_input(&raw).expect("parse");
        assert_eq!(request.event, Some(HookEvent::Stop));
        assert!(request.stop_hook_active);
    }

    #[test]
    fn empty_object_parses_to_defaults() {
        let request = ClaudeCodeAdapter.parse_input(&json!({})).expect("parse");
        assert_eq!(request, HookRequest::default());
    }

    #[test]
    fn non_object_envelope_is_rejected() {
        assert!(ClaudeCodeAdapter.parse_input(&json!([1, 2])).is_err());
    }

    #[test]
    fn pre_edit_block_becomes_deny() {
        let result = CheckResult::block(Reason::NoActiveTask, "no task");
        let value = ClaudeCodeAdapter.transform_result(HookEvent::PreEdit, &result);
        assert_eq!(
            value,
            json!({
                "hookSpecificOutput": {
                    "hookEventName": "PreToolUse",
                    "permissionDecision": "deny",
                    "permissionDecisionReason": "no task",
                }
            })
        );
    }

    #[test]
    fn pre_edit_warning_is_advisory() {
        let result = CheckResult::warn(Reason::NoActiveTask, "heads up");
        let value = ClaudeCodeAdapter.transform_result(HookEvent::PreEdit, &result);
        assert_eq!(value, json!({"continue": true, "systemMessage": "heads up"}));
    }

    #[test]
    fn post_edit_warning_adds_context() {
        let result = CheckResult::warn(Reason::ValidationFailed, "tsc failed");
        let value = ClaudeCodeAdapter.transform_result(HookEvent::PostEdit, &result);
        assert_eq!(
            value["hookSpecificOutput"]["additionalContext"],
            json!("tsc failed")
        );
        assert_eq!(value["continue"], json!(true));
    }

    #[test]
    fn post_edit_pass_message_is_not_surfaced() {
        let result =
            CheckResult::allow(Reason::ValidationPassed).with_message("Validation passed.");
        let value = ClaudeCodeAdapter.transform_result(HookEvent::PostEdit, &result);
        assert_eq!(value, json!({"continue": true}));
    }

    #[test]
    fn stop_block_carries_next_task_directive() {
        let mut result = CheckResult::block(Reason::QueueHasNext, "Task T1 is complete.");
        result.loop_status = Some(LoopStatus {
            state: LoopState::QueueHasNext,
            can_exit: false,
            continue_to_next: Some("T2".to_string()),
            remaining: 1,
            should_prompt: false,
            criteria_status: None,
        });
        let value = ClaudeCodeAdapter.transform_result(HookEvent::Stop, &result);
        assert_eq!(value["decision"], json!("block"));
        let reason = value["reason"].as_str().expect("reason");
        assert!(reason.starts_with("Task T1 is complete."));
        assert!(reason.ends_with("Run: /task-start T2"));
    }

    #[test]
    fn session_start_injects_context() {
        let mut result = CheckResult::allow(Reason::ContextGathered);
        result.context = Some("# Workflow context".to_string());
        let value = ClaudeCodeAdapter.transform_result(HookEvent::SessionStart, &result);
        assert_eq!(
            value,
            json!({
                "hookSpecificOutput": {
                    "hookEventName": "SessionStart",
                    "additionalContext": "# Workflow context",
                }
            })
        );
    }

    #[test]
    fn fail_open_always_continues() {
        for event in HookEvent::ALL {
            assert_eq!(ClaudeCodeAdapter.fail_open(event), json!({"continue": true}));
        }
    }

    #[test]
    fn generated_config_registers_enabled_events() {
        let rules = HookRules {
            binary: "/usr/local/bin/hookgate".to_string(),
            hooks: vec![
                HookRegistration {
                    event: HookEvent::PreEdit,
                    timeout_secs: 10,
                },
                HookRegistration {
                    event: HookEvent::Stop,
                    timeout_secs: 30,
                },
            ],
        };
        let value = ClaudeCodeAdapter
            .generate_config(&rules, Path::new("/work/my app"))
            .expect("config");

        let hooks = value["hooks"].as_object().expect("hooks");
        assert_eq!(hooks.len(), 2);
        let pre = &value["hooks"]["PreToolUse"][0];
        assert_eq!(pre["matcher"], json!(EDIT_TOOLS_MATCHER));
        assert_eq!(pre["hooks"][0]["type"], json!("command"));
        assert_eq!(pre["hooks"][0]["timeout"], json!(10));
        assert_eq!(
            pre["hooks"][0]["command"],
            json!("'/usr/local/bin/hookgate' hook pre-edit --host claude-code --root '/work/my app'")
        );
        assert!(value["hooks"]["Stop"][0].get("matcher").is_none());
    }
}
