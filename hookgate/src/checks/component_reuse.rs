//! Component reuse: warn before creating a component that already exists.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::checks::config_or_default;
use crate::core::classifier::{is_component_path, project_relative};
use crate::core::types::{CheckResult, MatchKind, Reason, SimilarComponent};
use crate::io::store::StateStore;
use crate::state::ComponentEntry;

static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const)\s+([A-Z][A-Za-z0-9_]*)")
        .unwrap()
});

/// Shortest normalized name considered for substring matching.
const MIN_FUZZY_LEN: usize = 3;

/// Compare a file about to be created against the component registry.
pub fn check_component_reuse<S: StateStore + ?Sized>(
    store: &S,
    file_path: &str,
    content: &str,
) -> CheckResult {
    let config = config_or_default(store);
    let relative = project_relative(store.root(), Path::new(file_path));

    if !is_component_path(&relative, &config.components.directories) {
        return CheckResult::allow(Reason::NotComponentPath);
    }

    let candidates = candidate_names(&relative, content);
    if candidates.is_empty() {
        return CheckResult::allow(Reason::NoSimilarComponent);
    }

    let registry = match store.registry() {
        Ok(registry) => registry,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "component registry unreadable, skipping reuse check");
            return CheckResult::allow(Reason::NoSimilarComponent);
        }
    };

    let relative_str = normalize_path(&relative.to_string_lossy());
    let mut similar = find_similar(&registry.components, &relative_str, &candidates);
    debug!(
        path = %relative_str,
        candidates = ?candidates,
        matches = similar.len(),
        "component reuse evaluated"
    );
    if similar.is_empty() {
        return CheckResult::allow(Reason::NoSimilarComponent);
    }
    similar.truncate(config.components.max_similar.max(1));

    let mut result = if similar[0].kind == MatchKind::Exact {
        let existing = &similar[0];
        let message = format!(
            "Component `{}` already exists at {}. Reuse or extend it instead of creating {}.",
            existing.name, existing.path, relative_str
        );
        if config.components.block_on_exact {
            CheckResult::block(Reason::ExactComponentMatch, message)
        } else {
            CheckResult::warn(Reason::ExactComponentMatch, message)
        }
    } else {
        let listing = similar
            .iter()
            .map(|component| format!("  - {} ({})", component.name, component.path))
            .collect::<Vec<_>>()
            .join("\n");
        CheckResult::warn(
            Reason::SimilarComponents,
            format!(
                "Similar components already exist:\n{listing}\n\n\
                 Consider reusing one of them before creating {relative_str}."
            ),
        )
    };
    result.similar = similar;
    result
}

/// Names the new file would introduce: its stem plus exported identifiers.
///
/// For `index.*` files the parent directory names the component.
pub fn candidate_names(relative: &Path, content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    };

    let file_name = relative
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    if stem.eq_ignore_ascii_case("index") {
        if let Some(dir) = relative
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
        {
            push(&dir);
        }
    } else {
        push(stem);
    }

    for captures in EXPORT_RE.captures_iter(content) {
        if let Some(name) = captures.get(1) {
            push(name.as_str());
        }
    }
    names
}

/// Registry entries matching any candidate, exact matches first.
pub fn find_similar(
    components: &[ComponentEntry],
    relative_path: &str,
    candidates: &[String],
) -> Vec<SimilarComponent> {
    let normalized: Vec<String> = candidates.iter().map(|c| normalize_name(c)).collect();

    let mut matches: Vec<SimilarComponent> = components
        .iter()
        .filter_map(|entry| {
            match_kind(entry, relative_path, candidates, &normalized).map(|kind| SimilarComponent {
                name: entry.name.clone(),
                path: entry.path.clone(),
                kind,
            })
        })
        .collect();
    matches.sort_by_key(|component| match component.kind {
        MatchKind::Exact => 0,
        MatchKind::Alias => 1,
        MatchKind::Fuzzy => 2,
    });
    matches
}

fn match_kind(
    entry: &ComponentEntry,
    relative_path: &str,
    candidates: &[String],
    normalized: &[String],
) -> Option<MatchKind> {
    if normalize_path(&entry.path) == relative_path
        || candidates.iter().any(|c| c.eq_ignore_ascii_case(&entry.name))
    {
        return Some(MatchKind::Exact);
    }

    let alternates = entry.aliases.iter().chain(entry.variants.iter());
    for alternate in alternates {
        let alternate = normalize_name(alternate);
        if !alternate.is_empty() && normalized.iter().any(|c| *c == alternate) {
            return Some(MatchKind::Alias);
        }
    }

    let name = normalize_name(&entry.name);
    if name.len() < MIN_FUZZY_LEN {
        return None;
    }
    let fuzzy = normalized
        .iter()
        .filter(|c| c.len() >= MIN_FUZZY_LEN)
        .any(|c| c.contains(name.as_str()) || name.contains(c.as_str()));
    fuzzy.then_some(MatchKind::Fuzzy)
}

/// Lowercase alphanumerics only: `user-card`, `UserCard` and `user_card` compare equal.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn normalize_path(path: &str) -> String {
    path.trim_start_matches("./").replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::HookConfig;
    use crate::test_support::{MemoryStateStore, component};

    fn registry_store() -> MemoryStateStore {
        let mut button = component("Button", "src/components/Button.tsx");
        button.variants = vec!["primary".to_string(), "icon".to_string()];
        let mut modal = component("Modal", "src/components/Modal.tsx");
        modal.aliases = vec!["Dialog".to_string()];
        MemoryStateStore::new().with_components(vec![
            button,
            modal,
            component("UserCard", "src/components/user/UserCard.tsx"),
        ])
    }

    #[test]
    fn paths_outside_component_dirs_are_ignored() {
        let result = check_component_reuse(&registry_store(), "src/lib/Button.ts", "");
        assert_eq!(result.reason, Reason::NotComponentPath);
        assert!(!result.warning);
    }

    #[test]
    fn exact_name_warns_by_default() {
        let result =
            check_component_reuse(&registry_store(), "src/components/forms/button.tsx", "");
        assert!(result.allowed);
        assert!(result.warning);
        assert_eq!(result.reason, Reason::ExactComponentMatch);
        assert_eq!(result.similar[0].name, "Button");
        assert_eq!(result.similar[0].kind, MatchKind::Exact);
        assert!(result.message.expect("message").contains("src/components/Button.tsx"));
    }

    #[test]
    fn exact_name_blocks_when_configured() {
        let mut config = HookConfig::default();
        config.components.block_on_exact = true;
        let store = registry_store().with_config(config);

        let result = check_component_reuse(&store, "src/components/Button.tsx", "");
        assert!(result.blocked);
        assert_eq!(result.reason, Reason::ExactComponentMatch);
    }

    #[test]
    fn fuzzy_and_alias_matches_warn() {
        let result = check_component_reuse(
            &registry_store(),
            "src/components/PrimaryButton.tsx",
            "export const Dialog = () => null;\n",
        );
        assert!(result.warning);
        assert_eq!(result.reason, Reason::SimilarComponents);
        let names: Vec<&str> = result.similar.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"Button"));
        assert!(names.contains(&"Modal"));
    }

    #[test]
    fn alias_match_ranks_before_fuzzy() {
        let result = check_component_reuse(&registry_store(), "src/components/Dialog.tsx", "");
        assert_eq!(result.similar[0].name, "Modal");
        assert_eq!(result.similar[0].kind, MatchKind::Alias);
    }

    #[test]
    fn unrelated_component_passes() {
        let result = check_component_reuse(&registry_store(), "src/components/Toolbar.tsx", "");
        assert!(result.allowed);
        assert!(!result.warning);
        assert_eq!(result.reason, Reason::NoSimilarComponent);
    }

    #[test]
    fn similar_list_is_capped() {
        let mut config = HookConfig::default();
        config.components.max_similar = 1;
        let store = registry_store().with_config(config);

        let result = check_component_reuse(
            &store,
            "src/components/ButtonModal.tsx",
            "",
        );
        assert_eq!(result.similar.len(), 1);
    }

    #[test]
    fn index_files_use_directory_name() {
        let names = candidate_names(Path::new("src/components/UserCard/index.tsx"), "");
        assert_eq!(names, vec!["UserCard".to_string()]);
    }

    #[test]
    fn exported_names_are_candidates() {
        let content = "export default function ProfileHeader() {}\nexport class Avatar {}\nconst Hidden = 1;\n";
        let names = candidate_names(Path::new("src/components/profile.tsx"), content);
        assert_eq!(
            names,
            vec![
                "profile".to_string(),
                "ProfileHeader".to_string(),
                "Avatar".to_string()
            ]
        );
    }

    #[test]
    fn short_names_do_not_fuzzy_match() {
        let components = vec![component("Button", "src/components/Button.tsx")];
        let similar = find_similar(&components, "src/components/Bu.tsx", &["Bu".to_string()]);
        assert!(similar.is_empty());
    }
}
