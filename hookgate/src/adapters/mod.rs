//! Host adapters.
//!
//! An adapter is the only code that understands a host runtime's hook
//! envelopes. It normalizes incoming envelopes into a [`HookRequest`], turns a
//! [`CheckResult`] back into the host's response vocabulary, and describes how
//! the host should register the hook commands. Supporting another host means
//! adding a [`HostKind`] variant and one [`HostAdapter`] implementation; the
//! checkers stay untouched.

pub mod claude_code;

use std::env;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;

use crate::core::types::{CheckResult, HookEvent, HookRequest, Reason};
use crate::io::config::HookConfig;

/// Host runtimes with a built-in adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum HostKind {
    #[default]
    ClaudeCode,
}

impl HostKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HostKind::ClaudeCode => "claude-code",
        }
    }

    /// Executable the host ships as, used for availability detection.
    pub fn default_binary(self) -> &'static str {
        match self {
            HostKind::ClaudeCode => "claude",
        }
    }
}

/// Supported host runtimes.
pub const SUPPORTED_HOSTS: [HostKind; 1] = [HostKind::ClaudeCode];

/// Translation layer between one host runtime and the checkers.
pub trait HostAdapter {
    fn kind(&self) -> HostKind;

    /// Normalize a raw host envelope.
    fn parse_input(&self, raw: &Value) -> Result<HookRequest>;

    /// Render a result as the host's response envelope for `event`.
    fn transform_result(&self, event: HookEvent, result: &CheckResult) -> Value;

    /// Response that lets the host continue untouched.
    fn fail_open(&self, event: HookEvent) -> Value {
        self.transform_result(event, &CheckResult::allow(Reason::InternalError))
    }

    /// Hook registration block for the host's own settings file.
    fn generate_config(&self, rules: &HookRules, project_root: &Path) -> Result<Value>;

    /// Whether the host runtime is installed on this machine.
    fn is_available(&self) -> bool;
}

/// Build the adapter for `kind`.
pub fn adapter_for(kind: HostKind) -> Box<dyn HostAdapter> {
    match kind {
        HostKind::ClaudeCode => Box::new(claude_code::ClaudeCodeAdapter),
    }
}

/// One event the host should invoke the dispatcher for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRegistration {
    pub event: HookEvent,
    pub timeout_secs: u64,
}

/// What to register: the dispatcher binary and the enabled events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRules {
    /// Command used to invoke the dispatcher.
    pub binary: String,
    pub hooks: Vec<HookRegistration>,
}

impl HookRules {
    /// Enabled hooks from config, with their execution-time budgets.
    pub fn from_config(config: &HookConfig, binary: impl Into<String>) -> Self {
        let hooks = HookEvent::ALL
            .into_iter()
            .filter(|event| config.hooks.policy(*event).enabled)
            .map(|event| HookRegistration {
                event,
                timeout_secs: config.hooks.timeout_secs(event),
            })
            .collect();
        Self {
            binary: binary.into(),
            hooks,
        }
    }

    pub fn registration(&self, event: HookEvent) -> Option<&HookRegistration> {
        self.hooks.iter().find(|hook| hook.event == event)
    }
}

/// Look for an executable named `name` on `PATH`.
pub fn binary_on_path(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(name).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_hosts_resolve_to_matching_adapters() {
        for kind in SUPPORTED_HOSTS {
            assert_eq!(adapter_for(kind).kind(), kind);
        }
    }

    #[test]
    fn rules_skip_disabled_hooks() {
        let mut config = HookConfig::default();
        config.hooks.session_end.enabled = false;
        config.hooks.stop.timeout_secs = Some(45);

        let rules = HookRules::from_config(&config, "hookgate");
        assert_eq!(rules.hooks.len(), 4);
        assert!(rules.registration(HookEvent::SessionEnd).is_none());
        assert_eq!(
            rules.registration(HookEvent::Stop).map(|h| h.timeout_secs),
            Some(45)
        );
        assert_eq!(
            rules.registration(HookEvent::PostEdit).map(|h| h.timeout_secs),
            Some(120)
        );
    }

    #[test]
    fn missing_binary_is_not_on_path() {
        assert!(!binary_on_path("hookgate-definitely-not-installed"));
    }
}
