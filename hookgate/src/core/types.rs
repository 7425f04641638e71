//! Normalized request and result types shared by checkers, adapters and dispatch.
//!
//! These types are the contract between host adapters and checkers. They carry
//! no host-specific vocabulary and must stay deterministic: the same state
//! always yields the same `CheckResult`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::state::TaskRef;

/// Hook events the dispatcher handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HookEvent {
    SessionStart,
    PreEdit,
    PostEdit,
    Stop,
    SessionEnd,
}

impl HookEvent {
    pub const ALL: [HookEvent; 5] = [
        HookEvent::SessionStart,
        HookEvent::PreEdit,
        HookEvent::PostEdit,
        HookEvent::Stop,
        HookEvent::SessionEnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookEvent::SessionStart => "session-start",
            HookEvent::PreEdit => "pre-edit",
            HookEvent::PostEdit => "post-edit",
            HookEvent::Stop => "stop",
            HookEvent::SessionEnd => "session-end",
        }
    }
}

/// What the host is about to do (or just did) to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Writing a file that does not exist yet.
    Create,
    /// Writing over an existing file.
    Overwrite,
    /// In-place edit of an existing file.
    Edit,
    /// Anything that is not a file edit.
    Other,
}

impl Operation {
    pub fn is_edit(self) -> bool {
        !matches!(self, Operation::Other)
    }

    pub fn verb(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Overwrite => "overwrite",
            Operation::Edit => "edit",
            Operation::Other => "modify",
        }
    }
}

/// Host envelope normalized by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRequest {
    /// Event named by the envelope, when the host sends one.
    pub event: Option<HookEvent>,
    pub session_id: Option<String>,
    pub cwd: Option<PathBuf>,
    pub tool_name: Option<String>,
    pub operation: Operation,
    pub file_path: Option<String>,
    pub content: Option<String>,
    /// Post-action events: the host reported the tool call as failed.
    pub tool_failed: bool,
    /// The host is already continuing because of an earlier stop decision.
    pub stop_hook_active: bool,
    /// Session start trigger (`startup`, `resume`, `compact`, ...).
    pub source: Option<String>,
}

impl Default for HookRequest {
    fn default() -> Self {
        Self {
            event: None,
            session_id: None,
            cwd: None,
            tool_name: None,
            operation: Operation::Other,
            file_path: None,
            content: None,
            tool_failed: false,
            stop_hook_active: false,
            source: None,
        }
    }
}

/// Machine-readable reason attached to every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    // Task gate
    WorkflowStateExempt,
    PlanFileExempt,
    TaskGatingDisabled,
    TaskActive,
    NoActiveTask,
    // Component reuse
    NotComponentPath,
    NoSimilarComponent,
    ExactComponentMatch,
    SimilarComponents,
    // Loop check
    NoSession,
    SessionInactive,
    CriteriaIncomplete,
    CriteriaComplete,
    QueueHasNext,
    PromptBeforeNext,
    QueueEmpty,
    RetryBudgetExhausted,
    IterationBudgetExhausted,
    StateUnreadable,
    // Validation runner
    NoValidationConfigured,
    ValidationDisabled,
    ValidationPassed,
    ValidationFailed,
    // Session context
    ContextGathered,
    NoContext,
    // Dispatch
    HookDisabled,
    NotAnEdit,
    ToolFailed,
    InternalError,
}

/// How a registry entry matched a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Alias,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarComponent {
    pub name: String,
    pub path: String,
    pub kind: MatchKind,
}

/// Why a validation command did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandFailure {
    ExitCode,
    Timeout,
    Spawn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command: String,
    pub exit_code: Option<i32>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CommandFailure>,
    pub output_excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub skipped: bool,
    pub passed: bool,
    pub results: Vec<CommandResult>,
}

/// States of the stop/loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    CriteriaIncomplete,
    CriteriaCompleteExit,
    QueueHasNext,
    QueueEmptyExit,
    PromptBeforeNext,
    BudgetExhaustedExit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaStatus {
    pub total: usize,
    pub completed: usize,
    /// Steps still pending, in progress, or failed within their retry budget.
    pub unmet: Vec<String>,
    /// Failed steps whose retry budget is spent.
    pub exhausted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStatus {
    pub state: LoopState,
    pub can_exit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_to_next: Option<String>,
    pub remaining: usize,
    pub should_prompt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_status: Option<CriteriaStatus>,
}

/// Normalized outcome returned by every checker.
///
/// `blocked` implies `!allowed`. The decision fields are authoritative: a hook
/// policy downgrade changes them without touching the checker-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub allowed: bool,
    pub blocked: bool,
    pub warning: bool,
    pub message: Option<String>,
    pub reason: Reason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub similar: Vec<SimilarComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_status: Option<LoopStatus>,
    /// Text to inject into the next turn (session start).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl CheckResult {
    pub fn allow(reason: Reason) -> Self {
        Self {
            allowed: true,
            blocked: false,
            warning: false,
            message: None,
            reason,
            task: None,
            similar: Vec::new(),
            validation: None,
            loop_status: None,
            context: None,
        }
    }

    pub fn warn(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            warning: true,
            message: Some(message.into()),
            ..Self::allow(reason)
        }
    }

    pub fn block(reason: Reason, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            blocked: true,
            message: Some(message.into()),
            ..Self::allow(reason)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_task(mut self, task: TaskRef) -> Self {
        self.task = Some(task);
        self
    }

    /// Turn a block into an advisory warning, keeping message and payload.
    pub fn downgrade_to_warning(mut self) -> Self {
        if self.blocked {
            self.blocked = false;
            self.allowed = true;
            self.warning = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&Reason::WorkflowStateExempt).expect("serialize");
        assert_eq!(json, "\"workflow_state_exempt\"");
    }

    #[test]
    fn block_is_never_allowed() {
        let result = CheckResult::block(Reason::NoActiveTask, "no task");
        assert!(result.blocked);
        assert!(!result.allowed);
        assert!(!result.warning);
    }

    #[test]
    fn downgrade_keeps_message_and_reason() {
        let result = CheckResult::block(Reason::NoActiveTask, "no task").downgrade_to_warning();
        assert!(result.allowed);
        assert!(!result.blocked);
        assert!(result.warning);
        assert_eq!(result.reason, Reason::NoActiveTask);
        assert_eq!(result.message.as_deref(), Some("no task"));
    }

    #[test]
    fn downgrade_leaves_allow_untouched() {
        let result = CheckResult::allow(Reason::TaskActive);
        assert_eq!(result.clone().downgrade_to_warning(), result);
    }

    #[test]
    fn result_serializes_camel_case_without_empty_payloads() {
        let value = serde_json::to_value(CheckResult::allow(Reason::TaskActive)).expect("json");
        assert_eq!(
            value,
            serde_json::json!({
                "allowed": true,
                "blocked": false,
                "warning": false,
                "message": null,
                "reason": "task_active"
            })
        );
    }
}
