//! Checkers evaluated by the hook dispatcher.
//!
//! Every checker reads what it needs from an injected [`StateStore`] and
//! returns a [`CheckResult`](crate::core::types::CheckResult). Checkers never
//! return errors: an unreadable document degrades to its empty form so that
//! broken project state cannot itself cause a block.

pub mod component_reuse;
pub mod loop_check;
pub mod session_context;
pub mod task_gate;
pub mod validation;

use tracing::warn;

use crate::io::config::HookConfig;
use crate::io::store::StateStore;
use crate::state::{DurableSession, SessionStatus, TaskQueue, TaskRef};

/// Load config, falling back to defaults when it cannot be read.
pub fn config_or_default<S: StateStore + ?Sized>(store: &S) -> HookConfig {
    match store.config() {
        Ok(config) => config,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "config unreadable, using defaults");
            HookConfig::default()
        }
    }
}

/// Active task: first `inProgress` entry, else the task of an active durable session.
pub fn resolve_active_task(queue: &TaskQueue, session: Option<&DurableSession>) -> Option<TaskRef> {
    if let Some(entry) = queue.in_progress.first() {
        return Some(entry.to_task_ref());
    }
    session
        .filter(|session| session.status == SessionStatus::Active)
        .map(DurableSession::task_ref)
}

/// Resolve the active task from the store; unreadable documents count as empty.
pub fn active_task<S: StateStore + ?Sized>(store: &S) -> Option<TaskRef> {
    let queue = store.task_queue().unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "task queue unreadable, treating as empty");
        TaskQueue::default()
    });
    let session = store.session().unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "session unreadable, treating as absent");
        None
    });
    resolve_active_task(&queue, session.as_ref())
}
