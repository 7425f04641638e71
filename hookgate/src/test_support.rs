//! Test-only helpers: in-memory state stores, scripted command runners and
//! on-disk workflow fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::Serialize;
use tempfile::TempDir;

use crate::io::commands::{CommandOutcome, CommandRequest, CommandRunner};
use crate::io::config::HookConfig;
use crate::io::store::{StateStore, WorkflowPaths};
use crate::state::{
    ChangeEntry, ComponentEntry, ComponentRegistry, DecisionEntry, DurableSession, ExecutionQueue,
    SessionStatus, SessionStep, StepStatus, TaskEntry, TaskQueue,
};

/// State store backed by plain fields.
#[derive(Debug, Clone)]
pub struct MemoryStateStore {
    pub root: PathBuf,
    pub config: HookConfig,
    pub task_queue: TaskQueue,
    pub session: Option<DurableSession>,
    pub suspended: Vec<DurableSession>,
    pub execution_queue: Option<ExecutionQueue>,
    pub registry: ComponentRegistry,
    pub decisions: Vec<DecisionEntry>,
    pub change_log: Vec<ChangeEntry>,
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStateStore {
    /// Empty store rooted at `/project`.
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/project"),
            config: HookConfig::default(),
            task_queue: TaskQueue::default(),
            session: None,
            suspended: Vec::new(),
            execution_queue: None,
            registry: ComponentRegistry::default(),
            decisions: Vec::new(),
            change_log: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: HookConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_in_progress(mut self, tasks: Vec<TaskEntry>) -> Self {
        self.task_queue.in_progress = tasks;
        self
    }

    pub fn with_session(mut self, session: DurableSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_suspended(mut self, sessions: Vec<DurableSession>) -> Self {
        self.suspended = sessions;
        self
    }

    pub fn with_execution_queue(mut self, ids: &[&str]) -> Self {
        self.execution_queue = Some(ExecutionQueue {
            tasks: ids.iter().map(|id| TaskEntry::Id(id.to_string())).collect(),
        });
        self
    }

    pub fn with_components(mut self, components: Vec<ComponentEntry>) -> Self {
        self.registry.components = components;
        self
    }

    pub fn with_decisions(mut self, decisions: Vec<DecisionEntry>) -> Self {
        self.decisions = decisions;
        self
    }

    pub fn with_change_log(mut self, entries: Vec<ChangeEntry>) -> Self {
        self.change_log = entries;
        self
    }
}

impl StateStore for MemoryStateStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> Result<HookConfig> {
        Ok(self.config.clone())
    }

    fn task_queue(&self) -> Result<TaskQueue> {
        Ok(self.task_queue.clone())
    }

    fn session(&self) -> Result<Option<DurableSession>> {
        Ok(self.session.clone())
    }

    fn suspended_sessions(&self) -> Result<Vec<DurableSession>> {
        Ok(self.suspended.clone())
    }

    fn execution_queue(&self) -> Result<Option<ExecutionQueue>> {
        Ok(self.execution_queue.clone())
    }

    fn registry(&self) -> Result<ComponentRegistry> {
        Ok(self.registry.clone())
    }

    fn decisions(&self) -> Result<Vec<DecisionEntry>> {
        Ok(self.decisions.clone())
    }

    fn change_log(&self) -> Result<Vec<ChangeEntry>> {
        Ok(self.change_log.clone())
    }
}

/// Store whose every read fails.
#[derive(Debug, Clone)]
pub struct FailingStateStore {
    root: PathBuf,
}

impl Default for FailingStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FailingStateStore {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/project"),
        }
    }

    fn fail<T>(&self, document: &str) -> Result<T> {
        Err(anyhow!("{document} unavailable"))
    }
}

impl StateStore for FailingStateStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> Result<HookConfig> {
        self.fail("config")
    }

    fn task_queue(&self) -> Result<TaskQueue> {
        self.fail("task queue")
    }

    fn session(&self) -> Result<Option<DurableSession>> {
        self.fail("session")
    }

    fn suspended_sessions(&self) -> Result<Vec<DurableSession>> {
        self.fail("suspended sessions")
    }

    fn execution_queue(&self) -> Result<Option<ExecutionQueue>> {
        self.fail("execution queue")
    }

    fn registry(&self) -> Result<ComponentRegistry> {
        self.fail("registry")
    }

    fn decisions(&self) -> Result<Vec<DecisionEntry>> {
        self.fail("decisions")
    }

    fn change_log(&self) -> Result<Vec<ChangeEntry>> {
        self.fail("change log")
    }
}

/// Runner that replays scripted outcomes in order and records requests.
///
/// `Err(message)` entries become runner errors. Running out of script is an error.
#[derive(Debug, Default)]
pub struct ScriptedCommandRunner {
    outcomes: RefCell<VecDeque<Result<CommandOutcome, String>>>,
    calls: RefCell<Vec<CommandRequest>>,
}

impl ScriptedCommandRunner {
    pub fn new(outcomes: Vec<Result<CommandOutcome, String>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedCommandRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        self.calls.borrow_mut().push(request.clone());
        match self.outcomes.borrow_mut().pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted outcome for `{}`", request.command)),
        }
    }
}

/// Config that blocks edits without an active task.
pub fn blocking_config() -> HookConfig {
    let mut config = HookConfig::default();
    config.enforcement.block_without_task = true;
    config
}

pub fn session(task_id: &str, status: SessionStatus, steps: Vec<SessionStep>) -> DurableSession {
    DurableSession {
        task_id: task_id.to_string(),
        title: None,
        task_type: None,
        status,
        iteration: 0,
        max_iterations: None,
        steps,
        updated_at: None,
    }
}

pub fn step(id: &str, status: StepStatus) -> SessionStep {
    SessionStep {
        id: id.to_string(),
        description: None,
        status,
        attempts: 0,
        max_attempts: None,
    }
}

pub fn failed_step(id: &str, attempts: u32, max_attempts: Option<u32>) -> SessionStep {
    SessionStep {
        attempts,
        max_attempts,
        ..step(id, StepStatus::Failed)
    }
}

pub fn component(name: &str, path: &str) -> ComponentEntry {
    ComponentEntry {
        name: name.to_string(),
        path: path.to_string(),
        description: None,
        variants: Vec::new(),
        aliases: Vec::new(),
    }
}

/// A project directory with a `.workflow/` tree on disk.
pub struct WorkflowFixture {
    dir: TempDir,
    paths: WorkflowPaths,
}

impl WorkflowFixture {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let paths = WorkflowPaths::new(dir.path());
        fs::create_dir_all(&paths.state_dir)?;
        Ok(Self { dir, paths })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> &WorkflowPaths {
        &self.paths
    }

    pub fn write_config(&self, config: &HookConfig) -> Result<()> {
        write_file(&self.paths.config_path, &toml::to_string(config)?)
    }

    pub fn write_config_text(&self, text: &str) -> Result<()> {
        write_file(&self.paths.config_path, text)
    }

    pub fn write_task_queue(&self, queue: &TaskQueue) -> Result<()> {
        write_json(&self.paths.task_queue_path, queue)
    }

    pub fn write_session(&self, session: &DurableSession) -> Result<()> {
        write_json(&self.paths.session_path, session)
    }

    pub fn write_suspended(&self, session: &DurableSession) -> Result<()> {
        let path = self
            .paths
            .sessions_dir
            .join(format!("{}.json", session.task_id));
        write_json(&path, session)
    }

    pub fn write_execution_queue(&self, queue: &ExecutionQueue) -> Result<()> {
        write_json(&self.paths.execution_queue_path, queue)
    }

    pub fn write_registry(&self, registry: &ComponentRegistry) -> Result<()> {
        write_json(&self.paths.registry_path, registry)
    }

    pub fn write_raw(&self, path: &Path, contents: &str) -> Result<()> {
        write_file(path, contents)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_file(path, &serde_json::to_string_pretty(value)?)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
