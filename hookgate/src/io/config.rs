//! Hook configuration stored under `.workflow/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::pattern::GlobPattern;
use crate::core::types::HookEvent;

/// Hook configuration (TOML).
///
/// Edited by humans and read fresh on every hook invocation. Missing fields
/// default to the values below.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HookConfig {
    pub enforcement: EnforcementConfig,
    pub hooks: HooksConfig,
    pub components: ComponentConfig,
    #[serde(rename = "loop")]
    pub loop_: LoopConfig,
    pub validation: ValidationConfig,
    /// Quality gate per task type; `default` applies to untyped tasks.
    pub quality_gates: BTreeMap<String, QualityGate>,
    pub session_context: SessionContextConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnforcementConfig {
    pub strict_mode: bool,
    pub require_task_for_implementation: bool,
    /// Deny edits without an active task instead of warning.
    pub block_without_task: bool,
    /// Plan-storage locations exempt from task gating.
    pub plan_dirs: Vec<String>,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            require_task_for_implementation: true,
            block_without_task: false,
            plan_dirs: vec![".claude/plans".to_string()],
        }
    }
}

impl EnforcementConfig {
    pub fn task_gating_enabled(&self) -> bool {
        self.strict_mode && self.require_task_for_implementation
    }
}

/// Whether a hook's blocks are enforced or reported as warnings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    #[default]
    Block,
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HookPolicy {
    pub enabled: bool,
    pub mode: HookMode,
    /// Host-side timeout; falls back to a per-event default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for HookPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: HookMode::Block,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HooksConfig {
    pub session_start: HookPolicy,
    pub pre_edit: HookPolicy,
    pub post_edit: HookPolicy,
    pub stop: HookPolicy,
    pub session_end: HookPolicy,
}

impl HooksConfig {
    pub fn policy(&self, event: HookEvent) -> &HookPolicy {
        match event {
            HookEvent::SessionStart => &self.session_start,
            HookEvent::PreEdit => &self.pre_edit,
            HookEvent::PostEdit => &self.post_edit,
            HookEvent::Stop => &self.stop,
            HookEvent::SessionEnd => &self.session_end,
        }
    }

    /// Execution-time budget for one invocation of `event`, in seconds.
    pub fn timeout_secs(&self, event: HookEvent) -> u64 {
        self.policy(event)
            .timeout_secs
            .unwrap_or_else(|| default_timeout_secs(event))
    }
}

fn default_timeout_secs(event: HookEvent) -> u64 {
    match event {
        HookEvent::SessionStart | HookEvent::PreEdit | HookEvent::SessionEnd => 10,
        HookEvent::PostEdit => 120,
        HookEvent::Stop => 30,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComponentConfig {
    /// Directory names that hold reusable components.
    pub directories: Vec<String>,
    /// Block (rather than warn) when a new file exactly matches a registry entry.
    pub block_on_exact: bool,
    /// Cap on similar components reported.
    pub max_similar: usize,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            directories: ["components", "services", "hooks", "composables", "stores"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            block_on_exact: false,
            max_similar: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Session iterations after which the stop check gives up.
    pub max_iterations: u32,
    /// Attempts per failed step before it counts as exhausted.
    pub max_retries: u32,
    /// Ask the user before starting the next queued task.
    pub pause_between_tasks: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            max_retries: 5,
            pause_between_tasks: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Per-command timeout.
    pub timeout_secs: u64,
    /// Bytes of command output kept in the result excerpt.
    pub output_excerpt_bytes: usize,
    pub rules: Vec<ValidationRule>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            output_excerpt_bytes: 2_000,
            rules: Vec::new(),
        }
    }
}

/// Commands to run after editing a file matching `pattern`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationRule {
    pub pattern: String,
    /// Shell commands; `{file}` is replaced by the quoted file path.
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QualityGate {
    /// Run validation commands for this task type.
    pub validate: bool,
    /// Failed validation blocks instead of warning.
    pub block_on_failure: bool,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            validate: true,
            block_on_failure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionContextConfig {
    pub include_suspended: bool,
    pub include_decisions: bool,
    pub include_activity: bool,
    /// Entries kept per section.
    pub max_items: usize,
}

impl Default for SessionContextConfig {
    fn default() -> Self {
        Self {
            include_suspended: true,
            include_decisions: true,
            include_activity: true,
            max_items: 5,
        }
    }
}

impl HookConfig {
    pub fn validate(&self) -> Result<()> {
        if self.loop_.max_iterations == 0 {
            return Err(anyhow!("loop.max_iterations must be > 0"));
        }
        if self.loop_.max_retries == 0 {
            return Err(anyhow!("loop.max_retries must be > 0"));
        }
        if self.validation.timeout_secs == 0 {
            return Err(anyhow!("validation.timeout_secs must be > 0"));
        }
        if self.validation.output_excerpt_bytes == 0 {
            return Err(anyhow!("validation.output_excerpt_bytes must be > 0"));
        }
        for event in HookEvent::ALL {
            if self.hooks.timeout_secs(event) == 0 {
                return Err(anyhow!(
                    "hooks.{}.timeout_secs must be > 0",
                    event.as_str().replace('-', "_")
                ));
            }
        }
        for rule in &self.validation.rules {
            GlobPattern::new(&rule.pattern)?;
            if rule.commands.iter().any(|command| command.trim().is_empty()) {
                return Err(anyhow!(
                    "validation rule '{}' has an empty command",
                    rule.pattern
                ));
            }
        }
        Ok(())
    }

    /// Quality gate for a task type, falling back to `default`, then built-in defaults.
    pub fn quality_gate(&self, task_type: Option<&str>) -> QualityGate {
        task_type
            .and_then(|kind| self.quality_gates.get(kind))
            .or_else(|| self.quality_gates.get("default"))
            .cloned()
            .unwrap_or_default()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HookConfig::default()`.
pub fn load_config(path: &Path) -> Result<HookConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        return Ok(HookConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HookConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
