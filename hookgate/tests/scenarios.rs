//! End-to-end checker scenarios against a `.workflow/` tree on disk.

use std::time::{Duration, Instant};

use hookgate::checks::component_reuse::check_component_reuse;
use hookgate::checks::loop_check::check_loop;
use hookgate::checks::task_gate::check_task_gate;
use hookgate::checks::validation::run_validation;
use hookgate::core::types::{LoopState, MatchKind, Operation, Reason};
use hookgate::io::commands::ShellCommandRunner;
use hookgate::io::config::{HookConfig, ValidationRule};
use hookgate::io::store::FsStateStore;
use hookgate::state::{ComponentRegistry, ExecutionQueue, SessionStatus, StepStatus, TaskEntry, TaskQueue};
use hookgate::test_support::{
    WorkflowFixture, blocking_config, component, failed_step, session, step,
};

#[test]
fn edit_without_task_is_blocked() {
    let fixture = WorkflowFixture::new().expect("fixture");
    fixture.write_config(&blocking_config()).expect("config");
    fixture.write_task_queue(&TaskQueue::default()).expect("queue");
    let store = FsStateStore::new(fixture.root());

    let path = fixture.root().join("src/app.ts");
    let result = check_task_gate(&store, &path.to_string_lossy(), Operation::Edit);

    assert!(result.blocked);
    assert_eq!(result.reason, Reason::NoActiveTask);
}

#[test]
fn workflow_state_edit_is_exempt() {
    let fixture = WorkflowFixture::new().expect("fixture");
    fixture.write_config(&blocking_config()).expect("config");
    let store = FsStateStore::new(fixture.root());

    let path = fixture.paths().task_queue_path.clone();
    let result = check_task_gate(&store, &path.to_string_lossy(), Operation::Edit);

    assert!(result.allowed);
    assert_eq!(result.reason, Reason::WorkflowStateExempt);
}

#[test]
fn exhausted_retries_give_up() {
    let fixture = WorkflowFixture::new().expect("fixture");
    fixture
        .write_session(&session(
            "T1",
            SessionStatus::Active,
            vec![
                step("s1", StepStatus::Completed),
                step("s2", StepStatus::Completed),
                failed_step("s3", 6, Some(5)),
            ],
        ))
        .expect("session");
    fixture
        .write_execution_queue(&ExecutionQueue::default())
        .expect("queue");
    let store = FsStateStore::new(fixture.root());

    let result = check_loop(&store);
    let status = result.loop_status.expect("loop status");
    assert!(status.can_exit);
    assert_eq!(status.state, LoopState::BudgetExhaustedExit);
    assert!(result.message.expect("message").contains("Gave up"));
}

#[test]
fn completed_session_continues_with_queue() {
    let fixture = WorkflowFixture::new().expect("fixture");
    fixture
        .write_session(&session(
            "T1",
            SessionStatus::Active,
            vec![step("s1", StepStatus::Completed)],
        ))
        .expect("session");
    fixture
        .write_execution_queue(&ExecutionQueue {
            tasks: vec![TaskEntry::Id("T2".to_string()), TaskEntry::Id("T3".to_string())],
        })
        .expect("queue");
    let store = FsStateStore::new(fixture.root());

    let result = check_loop(&store);
    let status = result.loop_status.expect("loop status");
    assert_eq!(status.continue_to_next.as_deref(), Some("T2"));
    assert_eq!(status.remaining, 1);
    assert!(!status.can_exit);
}

#[test]
fn creating_registered_component_is_flagged() {
    let fixture = WorkflowFixture::new().expect("fixture");
    fixture
        .write_registry(&ComponentRegistry {
            components: vec![component("Button", "src/components/Button.tsx")],
        })
        .expect("registry");
    let store = FsStateStore::new(fixture.root());

    let result = check_component_reuse(&store, "src/components/Button.tsx", "");
    assert!(result.warning);
    assert_eq!(result.reason, Reason::ExactComponentMatch);
    assert_eq!(result.similar[0].path, "src/components/Button.tsx");
    assert_eq!(result.similar[0].kind, MatchKind::Exact);

    let mut strict = HookConfig::default();
    strict.components.block_on_exact = true;
    fixture.write_config(&strict).expect("config");
    let result = check_component_reuse(&store, "src/components/Button.tsx", "");
    assert!(result.blocked);
}

#[test]
fn malformed_documents_degrade_without_blocking() {
    let fixture = WorkflowFixture::new().expect("fixture");
    fixture
        .write_raw(&fixture.paths().task_queue_path, "{ not json")
        .expect("queue");
    fixture
        .write_raw(&fixture.paths().session_path, r#"{"status": "active"}"#)
        .expect("session");
    let store = FsStateStore::new(fixture.root());

    let gate = check_task_gate(&store, "src/app.ts", Operation::Edit);
    assert!(gate.allowed);
    assert_eq!(gate.reason, Reason::NoActiveTask);

    let stop = check_loop(&store);
    assert!(stop.allowed);
    assert_eq!(stop.reason, Reason::StateUnreadable);
}

#[test]
fn invalid_config_falls_back_to_defaults() {
    let fixture = WorkflowFixture::new().expect("fixture");
    fixture
        .write_config_text("[loop]\nmax_iterations = 0\n")
        .expect("config");
    let store = FsStateStore::new(fixture.root());

    let result = check_task_gate(&store, "src/app.ts", Operation::Edit);
    assert!(result.allowed);
    assert!(result.warning);
}

#[test]
fn validation_runs_real_commands() {
    let fixture = WorkflowFixture::new().expect("fixture");
    let mut config = HookConfig::default();
    config.validation.rules = vec![ValidationRule {
        pattern: "*.txt".to_string(),
        commands: vec!["test -s {file}".to_string(), "grep -q ok {file}".to_string()],
    }];
    fixture.write_config(&config).expect("config");
    std::fs::write(fixture.root().join("notes.txt"), "not yet\n").expect("write notes");
    let store = FsStateStore::new(fixture.root());
    let deadline = Instant::now() + Duration::from_secs(30);

    let result = run_validation(
        &store,
        &ShellCommandRunner,
        "notes.txt",
        Duration::from_secs(10),
        deadline,
    );
    assert!(result.warning);
    assert_eq!(result.reason, Reason::ValidationFailed);
    let summary = result.validation.expect("summary");
    assert!(summary.results[0].passed);
    assert!(!summary.results[1].passed);

    std::fs::write(fixture.root().join("notes.txt"), "ok\n").expect("write notes");
    let result = run_validation(
        &store,
        &ShellCommandRunner,
        "notes.txt",
        Duration::from_secs(10),
        deadline,
    );
    assert_eq!(result.reason, Reason::ValidationPassed);
}
