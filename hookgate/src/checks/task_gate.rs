//! Task gate: edits require an active task.

use std::path::Path;

use tracing::debug;

use crate::checks::{active_task, config_or_default};
use crate::core::classifier::{PathClass, classify_path, project_relative};
use crate::core::types::{CheckResult, Operation, Reason};
use crate::io::store::StateStore;

/// Decide whether `file_path` may be edited.
///
/// With gating disabled every edit is allowed. Otherwise workflow state and
/// plan files are exempt, and any other edit needs an active task; without
/// one the result is a warning or a block depending on
/// `enforcement.block_without_task`.
pub fn check_task_gate<S: StateStore + ?Sized>(
    store: &S,
    file_path: &str,
    operation: Operation,
) -> CheckResult {
    let config = config_or_default(store);
    let relative = project_relative(store.root(), Path::new(file_path));

    if !config.enforcement.task_gating_enabled() {
        return CheckResult::allow(Reason::TaskGatingDisabled);
    }

    match classify_path(&relative, &config.enforcement.plan_dirs) {
        PathClass::WorkflowState => return CheckResult::allow(Reason::WorkflowStateExempt),
        PathClass::PlanFile => return CheckResult::allow(Reason::PlanFileExempt),
        PathClass::Project => {}
    }

    if let Some(task) = active_task(store) {
        debug!(task_id = %task.id, path = %relative.display(), "edit under active task");
        return CheckResult::allow(Reason::TaskActive).with_task(task);
    }

    let target = relative.display().to_string();
    if config.enforcement.block_without_task {
        CheckResult::block(Reason::NoActiveTask, blocked_message(operation, &target))
    } else {
        CheckResult::warn(Reason::NoActiveTask, warning_message(operation, &target))
    }
}

fn blocked_message(operation: Operation, target: &str) -> String {
    format!(
        "Blocked: cannot {} {target} without an active task.\n\n\
         To continue, do one of:\n  \
         1. List available tasks: /task-list\n  \
         2. Start a ready task: /task-start <task-id>\n  \
         3. Create a new task: /task-create \"<description>\"",
        operation.verb()
    )
}

fn warning_message(operation: Operation, target: &str) -> String {
    format!(
        "No active task while trying to {} {target}. \
         Check /task-list, start one with /task-start <task-id>, \
         or create one with /task-create.",
        operation.verb()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::HookConfig;
    use crate::state::{SessionStatus, TaskEntry, TaskRef};
    use crate::test_support::{FailingStateStore, MemoryStateStore, blocking_config, session};

    #[test]
    fn workflow_state_is_exempt_even_when_blocking() {
        let store = MemoryStateStore::new().with_config(blocking_config());
        for path in [
            ".workflow/state/ready.json",
            "/project/.workflow/config.toml",
        ] {
            let result = check_task_gate(&store, path, Operation::Edit);
            assert!(result.allowed, "{path}");
            assert_eq!(result.reason, Reason::WorkflowStateExempt);
        }
    }

    #[test]
    fn plan_files_are_exempt() {
        let store = MemoryStateStore::new().with_config(blocking_config());
        let result = check_task_gate(&store, "/home/dev/.claude/plans/p.md", Operation::Create);
        assert!(result.allowed);
        assert_eq!(result.reason, Reason::PlanFileExempt);
    }

    #[test]
    fn strict_mode_off_disables_gating() {
        let mut config = blocking_config();
        config.enforcement.strict_mode = false;
        let store = MemoryStateStore::new().with_config(config);

        let result = check_task_gate(&store, "src/app.ts", Operation::Edit);
        assert!(result.allowed);
        assert!(!result.warning);
        assert_eq!(result.reason, Reason::TaskGatingDisabled);
    }

    #[test]
    fn strict_mode_off_reports_disabled_for_exempt_paths_too() {
        let mut config = blocking_config();
        config.enforcement.strict_mode = false;
        let store = MemoryStateStore::new().with_config(config);

        for path in [".workflow/state/ready.json", ".claude/plans/p.md"] {
            let result = check_task_gate(&store, path, Operation::Edit);
            assert!(result.allowed, "{path}");
            assert_eq!(result.reason, Reason::TaskGatingDisabled, "{path}");
        }
    }

    #[test]
    fn in_progress_task_allows_and_is_attached() {
        let store = MemoryStateStore::new()
            .with_config(blocking_config())
            .with_in_progress(vec![TaskEntry::Task(TaskRef {
                id: "T1".to_string(),
                title: Some("Login form".to_string()),
                task_type: None,
            })]);

        let result = check_task_gate(&store, "src/app.ts", Operation::Edit);
        assert!(result.allowed);
        assert_eq!(result.reason, Reason::TaskActive);
        assert_eq!(result.task.map(|t| t.id), Some("T1".to_string()));
    }

    #[test]
    fn active_session_counts_as_active_task() {
        let store = MemoryStateStore::new()
            .with_config(blocking_config())
            .with_session(session("T4", SessionStatus::Active, Vec::new()));

        let result = check_task_gate(&store, "src/app.ts", Operation::Edit);
        assert_eq!(result.reason, Reason::TaskActive);
    }

    #[test]
    fn no_task_blocks_with_remediation_steps() {
        let store = MemoryStateStore::new().with_config(blocking_config());

        let result = check_task_gate(&store, "src/app.ts", Operation::Edit);
        assert!(result.blocked);
        assert!(!result.allowed);
        assert_eq!(result.reason, Reason::NoActiveTask);
        let message = result.message.expect("message");
        assert!(message.contains("src/app.ts"));
        assert!(message.contains("/task-list"));
        assert!(message.contains("/task-start"));
        assert!(message.contains("/task-create"));
    }

    #[test]
    fn no_task_only_warns_by_default() {
        let store = MemoryStateStore::new().with_config(HookConfig::default());

        let result = check_task_gate(&store, "src/app.ts", Operation::Create);
        assert!(result.allowed);
        assert!(result.warning);
        assert!(!result.blocked);
        assert_eq!(result.reason, Reason::NoActiveTask);
    }

    #[test]
    fn unreadable_store_degrades_to_no_task() {
        let store = FailingStateStore::new();

        let result = check_task_gate(&store, "src/app.ts", Operation::Edit);
        assert_eq!(result.reason, Reason::NoActiveTask);
        assert!(result.allowed);
        assert!(result.warning);
    }
}
