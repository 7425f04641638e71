//! Stop-time loop state machine.
//!
//! Decides whether the agent may stop: unmet acceptance steps keep it working,
//! a finished task hands off to the next queued task, and iteration or retry
//! budgets force an exit so the loop always terminates.

use tracing::{debug, warn};

use crate::checks::config_or_default;
use crate::core::types::{CheckResult, CriteriaStatus, LoopState, LoopStatus, Reason};
use crate::io::config::LoopConfig;
use crate::io::store::StateStore;
use crate::state::{DurableSession, ExecutionQueue, SessionStatus, SessionStep, StepStatus, TaskRef};

/// Outcome of [`evaluate_loop`] before it is shaped into a [`CheckResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopDecision {
    pub status: LoopStatus,
    pub reason: Reason,
    pub message: Option<String>,
}

/// Evaluate the loop state for a stop request.
pub fn check_loop<S: StateStore + ?Sized>(store: &S) -> CheckResult {
    check_stop(store, false)
}

/// Like [`check_loop`], for a stop that follows a continuation the hook
/// already forced (`stop_hook_active`). A repeated queue hand-off is released.
pub fn check_stop<S: StateStore + ?Sized>(store: &S, stop_hook_active: bool) -> CheckResult {
    let config = config_or_default(store);

    let session = match store.session() {
        Ok(session) => session,
        Err(err) => return state_unreadable("session", &err),
    };
    let queue = match store.execution_queue() {
        Ok(queue) => queue,
        Err(err) => return state_unreadable("execution queue", &err),
    };

    let mut decision = evaluate_loop(session.as_ref(), queue.as_ref(), &config.loop_);
    if stop_hook_active {
        decision = release_handoff(decision);
    }
    debug!(
        stop_hook_active,
        state = ?decision.status.state,
        can_exit = decision.status.can_exit,
        reason = ?decision.reason,
        "loop evaluated"
    );
    into_result(decision, session.as_ref())
}

/// Pure transition function over the session and execution queue.
pub fn evaluate_loop(
    session: Option<&DurableSession>,
    queue: Option<&ExecutionQueue>,
    config: &LoopConfig,
) -> LoopDecision {
    let Some(session) = session else {
        return queue_phase(None, queue, config, Reason::NoSession);
    };

    if session.status == SessionStatus::Suspended {
        return LoopDecision {
            status: exit_status(LoopState::CriteriaCompleteExit, None),
            reason: Reason::SessionInactive,
            message: None,
        };
    }

    let criteria = criteria_status(session, config);
    if session.status == SessionStatus::Completed {
        return queue_phase(Some(session), queue, config, Reason::CriteriaComplete);
    }

    if !criteria.unmet.is_empty() {
        let max_iterations = session.max_iterations.unwrap_or(config.max_iterations);
        if session.iteration >= max_iterations {
            let message = format!(
                "Gave up on task {} after {} iterations (limit {}). \
                 These criteria still need manual attention:\n{}",
                session.task_ref().label(),
                session.iteration,
                max_iterations,
                bullet_list(&criteria.unmet),
            );
            return LoopDecision {
                status: exit_status(LoopState::BudgetExhaustedExit, Some(criteria)),
                reason: Reason::IterationBudgetExhausted,
                message: Some(message),
            };
        }

        let message = format!(
            "Task {} has unmet acceptance criteria ({}/{} steps completed):\n{}\n\n\
             Keep working on these before stopping.",
            session.task_ref().label(),
            criteria.completed,
            criteria.total,
            bullet_list(&criteria.unmet),
        );
        return LoopDecision {
            status: LoopStatus {
                state: LoopState::CriteriaIncomplete,
                can_exit: false,
                continue_to_next: None,
                remaining: 0,
                should_prompt: false,
                criteria_status: Some(criteria),
            },
            reason: Reason::CriteriaIncomplete,
            message: Some(message),
        };
    }

    if !criteria.exhausted.is_empty() {
        let message = format!(
            "Gave up on task {}: these steps used up their retry budget:\n{}\n\n\
             Review the failures manually.",
            session.task_ref().label(),
            bullet_list(&criteria.exhausted),
        );
        return LoopDecision {
            status: exit_status(LoopState::BudgetExhaustedExit, Some(criteria)),
            reason: Reason::RetryBudgetExhausted,
            message: Some(message),
        };
    }

    let mut decision = queue_phase(Some(session), queue, config, Reason::CriteriaComplete);
    decision.status.criteria_status = Some(criteria);
    decision
}

/// Turn a forced queue hand-off into a prompt.
///
/// Nothing on the hand-off path advances a budget, so a hand-off the agent
/// ignored once would otherwise block every later stop.
pub fn release_handoff(decision: LoopDecision) -> LoopDecision {
    if decision.status.state != LoopState::QueueHasNext {
        return decision;
    }
    LoopDecision {
        status: LoopStatus {
            state: LoopState::PromptBeforeNext,
            can_exit: true,
            should_prompt: true,
            ..decision.status
        },
        reason: Reason::PromptBeforeNext,
        message: decision.message.map(|message| {
            format!("{message}\n\nThis hand-off was already requested once; stopping is allowed.")
        }),
    }
}

/// Classify the session's steps against their retry budgets.
pub fn criteria_status(session: &DurableSession, config: &LoopConfig) -> CriteriaStatus {
    let mut status = CriteriaStatus {
        total: session.steps.len(),
        completed: session.completed_steps(),
        ..CriteriaStatus::default()
    };
    for step in &session.steps {
        let max_attempts = step.max_attempts.unwrap_or(config.max_retries);
        match step.status {
            StepStatus::Completed => {}
            StepStatus::Pending | StepStatus::InProgress => {
                status.unmet.push(describe_step(step, None));
            }
            StepStatus::Failed if step.attempts < max_attempts => {
                status.unmet.push(describe_step(step, Some(max_attempts)));
            }
            StepStatus::Failed => {
                status.exhausted.push(describe_step(step, Some(max_attempts)));
            }
        }
    }
    status
}

fn describe_step(step: &SessionStep, max_attempts: Option<u32>) -> String {
    match max_attempts {
        Some(max) => format!(
            "{} ({}, attempt {}/{})",
            step.label(),
            step.status.as_str(),
            step.attempts,
            max
        ),
        None => format!("{} ({})", step.label(), step.status.as_str()),
    }
}

fn queue_phase(
    session: Option<&DurableSession>,
    queue: Option<&ExecutionQueue>,
    config: &LoopConfig,
    complete_reason: Reason,
) -> LoopDecision {
    let Some(queue) = queue else {
        return LoopDecision {
            status: exit_status(LoopState::CriteriaCompleteExit, None),
            reason: complete_reason,
            message: None,
        };
    };

    let current = session.map(|session| session.task_id.as_str());
    let pending: Vec<TaskRef> = queue
        .tasks
        .iter()
        .filter(|entry| Some(entry.id()) != current)
        .map(|entry| entry.to_task_ref())
        .collect();

    let Some(next) = pending.first() else {
        return LoopDecision {
            status: exit_status(LoopState::QueueEmptyExit, None),
            reason: Reason::QueueEmpty,
            message: Some("All queued tasks are complete.".to_string()),
        };
    };

    let remaining = pending.len() - 1;
    let finished = match session {
        Some(session) => format!("Task {} is complete. ", session.task_ref().label()),
        None => String::new(),
    };
    let after = match remaining {
        0 => "the last one in the queue".to_string(),
        n => format!("{n} more queued after it"),
    };

    // Without a session there are no finished criteria to hand off from.
    if config.pause_between_tasks || session.is_none() {
        return LoopDecision {
            status: LoopStatus {
                state: LoopState::PromptBeforeNext,
                can_exit: true,
                continue_to_next: Some(next.id.clone()),
                remaining,
                should_prompt: true,
                criteria_status: None,
            },
            reason: Reason::PromptBeforeNext,
            message: Some(format!(
                "{finished}Next queued task: {} ({after}). \
                 Ask the user before starting it with /task-start {}.",
                next.label(),
                next.id
            )),
        };
    }

    LoopDecision {
        status: LoopStatus {
            state: LoopState::QueueHasNext,
            can_exit: false,
            continue_to_next: Some(next.id.clone()),
            remaining,
            should_prompt: false,
            criteria_status: None,
        },
        reason: Reason::QueueHasNext,
        message: Some(format!(
            "{finished}Continue with the next queued task: {} ({after}).\n\n\
             Start it with: /task-start {}",
            next.label(),
            next.id
        )),
    }
}

fn exit_status(state: LoopState, criteria_status: Option<CriteriaStatus>) -> LoopStatus {
    LoopStatus {
        state,
        can_exit: true,
        continue_to_next: None,
        remaining: 0,
        should_prompt: false,
        criteria_status,
    }
}

fn into_result(decision: LoopDecision, session: Option<&DurableSession>) -> CheckResult {
    let LoopDecision {
        status,
        reason,
        message,
    } = decision;

    let mut result = if !status.can_exit {
        CheckResult::block(reason, message.unwrap_or_default())
    } else if status.should_prompt || status.state == LoopState::BudgetExhaustedExit {
        CheckResult::warn(reason, message.unwrap_or_default())
    } else {
        let mut result = CheckResult::allow(reason);
        result.message = message;
        result
    };
    result.task = session.map(DurableSession::task_ref);
    result.loop_status = Some(status);
    result
}

fn state_unreadable(document: &str, err: &anyhow::Error) -> CheckResult {
    warn!(document, err = %format!("{err:#}"), "loop state unreadable, allowing exit");
    let mut result = CheckResult::allow(Reason::StateUnreadable);
    result.loop_status = Some(exit_status(LoopState::CriteriaCompleteExit, None));
    result
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
