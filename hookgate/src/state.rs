//! Documents of the workflow state store (`.workflow/`).
//!
//! The task, execution and registry commands own these files; the hook layer
//! only deserializes them. Field names follow the on-disk camelCase JSON.

use serde::{Deserialize, Serialize};

/// A task as listed in the task queue: either a bare id or a small object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskEntry {
    Id(String),
    Task(TaskRef),
}

impl TaskEntry {
    pub fn id(&self) -> &str {
        match self {
            TaskEntry::Id(id) => id,
            TaskEntry::Task(task) => &task.id,
        }
    }

    pub fn to_task_ref(&self) -> TaskRef {
        match self {
            TaskEntry::Id(id) => TaskRef::new(id),
            TaskEntry::Task(task) => task.clone(),
        }
    }
}

/// Minimal task identity carried on results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Task type used to select a quality gate (`feature`, `bugfix`, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
}

impl TaskRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            task_type: None,
        }
    }

    /// `T1 (Add login form)` or just `T1` when untitled.
    pub fn label(&self) -> String {
        match self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => format!("{} ({})", self.id, title),
            None => self.id.clone(),
        }
    }
}

/// Task queue document (`.workflow/state/ready.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskQueue {
    pub ready: Vec<TaskEntry>,
    pub in_progress: Vec<TaskEntry>,
    pub recently_completed: Vec<TaskEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Suspended,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

/// One acceptance step of a durable session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStep {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: StepStatus,
    #[serde(default)]
    pub attempts: u32,
    /// Per-step retry budget; falls back to `loop.max_retries`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl SessionStep {
    pub fn label(&self) -> String {
        match self.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(description) => format!("{}: {}", self.id, description),
            None => self.id.clone(),
        }
    }
}

/// Durable per-task execution session (`.workflow/state/session.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableSession {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    pub status: SessionStatus,
    /// Loop iterations already spent on this task (maintained by the execution loop).
    #[serde(default)]
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub steps: Vec<SessionStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl DurableSession {
    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            id: self.task_id.clone(),
            title: self.title.clone(),
            task_type: self.task_type.clone(),
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .count()
    }

    /// First step that is not yet completed.
    pub fn next_open_step(&self) -> Option<&SessionStep> {
        self.steps
            .iter()
            .find(|step| step.status != StepStatus::Completed)
    }
}

/// Queue of tasks for bulk execution (`.workflow/state/queue.json`).
///
/// The file only exists while queued execution is active.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionQueue {
    pub tasks: Vec<TaskEntry>,
}

/// Component registry (`.workflow/registry/components.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComponentRegistry {
    pub components: Vec<ComponentEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEntry {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// One line of `.workflow/state/decisions.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub summary: String,
}

/// One line of `.workflow/state/changelog.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_queue_accepts_ids_and_objects() {
        let raw = r#"{
            "ready": ["T3"],
            "inProgress": [{"id": "T1", "title": "Login form", "type": "feature"}],
            "recentlyCompleted": []
        }"#;
        let queue: TaskQueue = serde_json::from_str(raw).expect("parse queue");
        assert_eq!(queue.ready[0].id(), "T3");
        let active = queue.in_progress[0].to_task_ref();
        assert_eq!(active.label(), "T1 (Login form)");
        assert_eq!(active.task_type.as_deref(), Some("feature"));
    }

    #[test]
    fn task_queue_missing_stages_default_to_empty() {
        let queue: TaskQueue = serde_json::from_str("{}").expect("parse queue");
        assert_eq!(queue, TaskQueue::default());
    }

    #[test]
    fn session_parses_step_statuses() {
        let raw = r#"{
            "taskId": "T1",
            "status": "active",
            "steps": [
                {"id": "s1", "status": "completed"},
                {"id": "s2", "status": "in_progress", "attempts": 1, "maxAttempts": 3}
            ]
        }"#;
        let session: DurableSession = serde_json::from_str(raw).expect("parse session");
        assert_eq!(session.completed_steps(), 1);
        assert_eq!(session.next_open_step().map(|s| s.id.as_str()), Some("s2"));
        assert_eq!(session.steps[1].max_attempts, Some(3));
        assert_eq!(session.iteration, 0);
    }
}
