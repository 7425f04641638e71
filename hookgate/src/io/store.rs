//! Read-only access to the workflow state store under `.workflow/`.
//!
//! Every accessor re-reads its document; nothing is cached between calls and
//! nothing is ever written. A missing document loads as its empty/absent form;
//! a malformed one is an error that the calling checker degrades.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::io::config::{HookConfig, load_config};
use crate::state::{
    ChangeEntry, ComponentRegistry, DecisionEntry, DurableSession, ExecutionQueue, SessionStatus,
    TaskQueue,
};

const SESSION_SCHEMA: &str = include_str!("../../schemas/session.v1.schema.json");

/// All canonical paths within `.workflow/` for a project root.
#[derive(Debug, Clone)]
pub struct WorkflowPaths {
    pub root: PathBuf,
    pub workflow_dir: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub task_queue_path: PathBuf,
    pub session_path: PathBuf,
    pub sessions_dir: PathBuf,
    pub execution_queue_path: PathBuf,
    pub registry_path: PathBuf,
    pub decisions_path: PathBuf,
    pub changelog_path: PathBuf,
}

impl WorkflowPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let workflow_dir = root.join(".workflow");
        let state_dir = workflow_dir.join("state");
        Self {
            root: root.clone(),
            workflow_dir: workflow_dir.clone(),
            state_dir: state_dir.clone(),
            config_path: workflow_dir.join("config.toml"),
            task_queue_path: state_dir.join("ready.json"),
            session_path: state_dir.join("session.json"),
            sessions_dir: state_dir.join("sessions"),
            execution_queue_path: state_dir.join("queue.json"),
            registry_path: workflow_dir.join("registry").join("components.json"),
            decisions_path: state_dir.join("decisions.jsonl"),
            changelog_path: state_dir.join("changelog.jsonl"),
        }
    }
}

/// Source of the persisted documents the checkers consult.
///
/// Implemented over the filesystem by [`FsStateStore`]; tests substitute an
/// in-memory store.
pub trait StateStore {
    /// Project root that edited paths are resolved against.
    fn root(&self) -> &Path;
    fn config(&self) -> Result<HookConfig>;
    fn task_queue(&self) -> Result<TaskQueue>;
    fn session(&self) -> Result<Option<DurableSession>>;
    /// Parked sessions other than the current one.
    fn suspended_sessions(&self) -> Result<Vec<DurableSession>>;
    /// Present only while queued execution is active.
    fn execution_queue(&self) -> Result<Option<ExecutionQueue>>;
    fn registry(&self) -> Result<ComponentRegistry>;
    fn decisions(&self) -> Result<Vec<DecisionEntry>>;
    fn change_log(&self) -> Result<Vec<ChangeEntry>>;
}

/// Filesystem-backed state store rooted at a project directory.
#[derive(Debug, Clone)]
pub struct FsStateStore {
    paths: WorkflowPaths,
}

impl FsStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: WorkflowPaths::new(root),
        }
    }

    pub fn paths(&self) -> &WorkflowPaths {
        &self.paths
    }
}

impl StateStore for FsStateStore {
    fn root(&self) -> &Path {
        &self.paths.root
    }

    fn config(&self) -> Result<HookConfig> {
        load_config(&self.paths.config_path)
    }

    fn task_queue(&self) -> Result<TaskQueue> {
        Ok(read_json(&self.paths.task_queue_path)?.unwrap_or_default())
    }

    fn session(&self) -> Result<Option<DurableSession>> {
        if !self.paths.session_path.exists() {
            return Ok(None);
        }
        load_session(&self.paths.session_path).map(Some)
    }

    fn suspended_sessions(&self) -> Result<Vec<DurableSession>> {
        let dir = &self.paths.sessions_dir;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
            let path = entry
                .with_context(|| format!("read entry in {}", dir.display()))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut sessions = Vec::new();
        for path in files {
            let session = load_session(&path)?;
            if session.status == SessionStatus::Suspended {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    fn execution_queue(&self) -> Result<Option<ExecutionQueue>> {
        read_json(&self.paths.execution_queue_path)
    }

    fn registry(&self) -> Result<ComponentRegistry> {
        Ok(read_json(&self.paths.registry_path)?.unwrap_or_default())
    }

    fn decisions(&self) -> Result<Vec<DecisionEntry>> {
        read_json_lines(&self.paths.decisions_path)
    }

    fn change_log(&self) -> Result<Vec<ChangeEntry>> {
        read_json_lines(&self.paths.changelog_path)
    }
}

/// Load a durable session document, checking it against the session schema first.
pub fn load_session(path: &Path) -> Result<DurableSession> {
    debug!(path = %path.display(), "loading session");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse session {}", path.display()))?;
    validate_session_schema(&value).with_context(|| format!("validate {}", path.display()))?;
    let session: DurableSession = serde_json::from_value(value)
        .with_context(|| format!("deserialize session {}", path.display()))?;
    debug!(task_id = %session.task_id, status = ?session.status, "session loaded");
    Ok(session)
}

fn validate_session_schema(session: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SESSION_SCHEMA).context("parse session schema")?;
    let compiled =
        validator_for(&schema).map_err(|err| anyhow!("invalid session schema: {}", err))?;
    if !compiled.is_valid(session) {
        let messages = compiled
            .iter_errors(session)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "session schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        debug!(path = %path.display(), "document missing");
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        debug!(path = %path.display(), "log missing");
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))
        })
        .collect()
}
