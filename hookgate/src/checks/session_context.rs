//! Session-start context: a short summary of where the workflow stands.

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::{debug, warn};

use crate::checks::active_task;
use crate::core::types::{CheckResult, Reason};
use crate::io::config::SessionContextConfig;
use crate::io::store::StateStore;
use crate::state::{ChangeEntry, DecisionEntry, DurableSession, SessionStatus};

const SESSION_CONTEXT_TEMPLATE: &str = include_str!("templates/session_context.md");

#[derive(Debug, Clone, Serialize)]
struct ActiveContext {
    label: String,
    progress: Option<String>,
    next_step: Option<String>,
}

/// Gathered sections; an empty section is left out of the rendered text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionContext {
    active: Option<ActiveContext>,
    suspended: Vec<String>,
    decisions: Vec<String>,
    activity: Vec<String>,
}

impl SessionContext {
    pub fn is_empty(&self) -> bool {
        self.active.is_none()
            && self.suspended.is_empty()
            && self.decisions.is_empty()
            && self.activity.is_empty()
    }

    pub fn render(&self) -> Result<String> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("session_context", SESSION_CONTEXT_TEMPLATE)?;
        let template = env.get_template("session_context")?;
        let rendered = template.render(context! {
            active => self.active,
            suspended => self.suspended,
            decisions => self.decisions,
            activity => self.activity,
        })?;
        Ok(rendered.trim().to_string())
    }
}

/// Collect context for a new or resumed session.
///
/// Each section is read independently; one unreadable document drops only its
/// own section.
pub fn gather_session_context<S: StateStore + ?Sized>(
    store: &S,
    options: &SessionContextConfig,
) -> CheckResult {
    let gathered = collect(store, options);
    if gathered.is_empty() {
        return CheckResult::allow(Reason::NoContext);
    }

    match gathered.render() {
        Ok(text) => {
            debug!(bytes = text.len(), "session context rendered");
            let mut result = CheckResult::allow(Reason::ContextGathered);
            result.task = active_task(store);
            result.context = Some(text);
            result
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "session context template failed");
            CheckResult::allow(Reason::NoContext)
        }
    }
}

fn collect<S: StateStore + ?Sized>(store: &S, options: &SessionContextConfig) -> SessionContext {
    let session = store.session().unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "session unreadable, omitting progress");
        None
    });

    let active = active_task(store).map(|task| {
        let progress_source = session
            .as_ref()
            .filter(|session| session.task_id == task.id && !session.steps.is_empty());
        ActiveContext {
            label: task.label(),
            progress: progress_source.map(progress),
            next_step: progress_source
                .and_then(DurableSession::next_open_step)
                .map(|step| step.label()),
        }
    });

    let mut gathered = SessionContext {
        active,
        ..SessionContext::default()
    };
    let max_items = options.max_items;

    if options.include_suspended {
        match store.suspended_sessions() {
            Ok(mut sessions) => {
                if let Some(current) = session
                    .as_ref()
                    .filter(|session| session.status == SessionStatus::Suspended)
                {
                    if !sessions.iter().any(|s| s.task_id == current.task_id) {
                        sessions.insert(0, current.clone());
                    }
                }
                gathered.suspended = sessions
                    .iter()
                    .take(max_items)
                    .map(describe_suspended)
                    .collect();
            }
            Err(err) => warn!(err = %format!("{err:#}"), "suspended sessions unreadable, omitting"),
        }
    }

    if options.include_decisions {
        match store.decisions() {
            Ok(entries) => gathered.decisions = tail(&entries, max_items, describe_decision),
            Err(err) => warn!(err = %format!("{err:#}"), "decision log unreadable, omitting"),
        }
    }

    if options.include_activity {
        match store.change_log() {
            Ok(entries) => gathered.activity = tail(&entries, max_items, describe_change),
            Err(err) => warn!(err = %format!("{err:#}"), "change log unreadable, omitting"),
        }
    }

    gathered
}

fn tail<T>(entries: &[T], max_items: usize, describe: fn(&T) -> String) -> Vec<String> {
    let start = entries.len().saturating_sub(max_items);
    entries[start..].iter().map(describe).collect()
}

fn progress(session: &DurableSession) -> String {
    format!(
        "{}/{} steps completed",
        session.completed_steps(),
        session.steps.len()
    )
}

fn describe_suspended(session: &DurableSession) -> String {
    let mut line = session.task_ref().label();
    if !session.steps.is_empty() {
        line.push_str(&format!(", {}", progress(session)));
    }
    if let Some(updated) = session.updated_at.as_deref() {
        line.push_str(&format!(", suspended {updated}"));
    }
    line
}

fn describe_decision(entry: &DecisionEntry) -> String {
    let mut line = entry.summary.trim().to_string();
    if let Some(task_id) = entry.task_id.as_deref() {
        line.push_str(&format!(" [{task_id}]"));
    }
    line
}

fn describe_change(entry: &ChangeEntry) -> String {
    let mut line = entry.action.clone();
    if let Some(file) = entry.file.as_deref() {
        line.push_str(&format!(" {file}"));
    }
    if let Some(summary) = entry.summary.as_deref() {
        line.push_str(&format!(": {}", summary.trim()));
    }
    if let Some(task_id) = entry.task_id.as_deref() {
        line.push_str(&format!(" [{task_id}]"));
    }
    line
}
