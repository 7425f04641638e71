//! Deterministic classification of edited paths.

use std::path::{Component, Path, PathBuf};

/// Where an edited path lives, as far as task gating is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Under `.workflow/`, the state store's own bookkeeping.
    WorkflowState,
    /// Under one of the configured plan directories.
    PlanFile,
    /// Regular project file.
    Project,
}

/// Express `path` relative to `root` when it lies under it.
///
/// Relative paths are returned with `./` components removed; absolute paths
/// outside `root` are returned unchanged.
pub fn project_relative(root: &Path, path: &Path) -> PathBuf {
    let stripped = if path.is_absolute() {
        path.strip_prefix(root).unwrap_or(path)
    } else {
        path
    };
    stripped
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

/// Classify a project-relative path.
///
/// - `WorkflowState` if the first component is `.workflow`.
/// - `PlanFile` if any plan dir (e.g. `.claude/plans`) appears as a run of
///   consecutive components, anywhere in the path.
/// - `Project` otherwise.
pub fn classify_path<S: AsRef<str>>(relative: &Path, plan_dirs: &[S]) -> PathClass {
    if is_workflow_path(relative) {
        return PathClass::WorkflowState;
    }
    let names = normal_components(relative);
    let is_plan = plan_dirs.iter().any(|dir| {
        let needle: Vec<&str> = dir
            .as_ref()
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();
        !needle.is_empty()
            && names.len() > needle.len()
            && names
                .windows(needle.len())
                .any(|window| window == needle.as_slice())
    });
    if is_plan {
        PathClass::PlanFile
    } else {
        PathClass::Project
    }
}

/// Whether any parent directory of `relative` is a conventional component directory.
///
/// Comparison is case-insensitive; the file name itself is not considered.
pub fn is_component_path<S: AsRef<str>>(relative: &Path, component_dirs: &[S]) -> bool {
    let names = normal_components(relative);
    let Some((_, parents)) = names.split_last() else {
        return false;
    };
    parents.iter().any(|name| {
        component_dirs
            .iter()
            .any(|dir| dir.as_ref().eq_ignore_ascii_case(name))
    })
}

fn is_workflow_path(path: &Path) -> bool {
    let mut components = path
        .components()
        .filter(|component| !matches!(component, Component::CurDir | Component::RootDir));

    match components.next() {
        Some(Component::Normal(name)) => name == ".workflow",
        _ => false,
    }
}

fn normal_components(path: &Path) -> Vec<&str> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect()
}
