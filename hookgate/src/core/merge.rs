//! Combining results from several checkers run for one event.

use crate::core::types::CheckResult;

/// Merge checker results with precedence block > warning > allow.
///
/// The highest-precedence result (first one on ties) supplies the decision and
/// reason. Messages of every blocking or warning result are kept, in order.
/// `task` and `similar` are filled from any result that carries them.
/// Returns `None` for an empty input.
pub fn merge_results<I>(results: I) -> Option<CheckResult>
where
    I: IntoIterator<Item = CheckResult>,
{
    let results: Vec<CheckResult> = results.into_iter().collect();
    let primary = results
        .iter()
        .position(|result| result.blocked)
        .or_else(|| results.iter().position(|result| result.warning))
        .or_else(|| (!results.is_empty()).then_some(0))?;

    let mut merged = results[primary].clone();

    let messages: Vec<&str> = results
        .iter()
        .filter(|result| result.blocked || result.warning)
        .filter_map(|result| result.message.as_deref())
        .collect();
    if messages.len() > 1 {
        merged.message = Some(messages.join("\n\n"));
    }

    for result in &results {
        if merged.task.is_none() {
            merged.task.clone_from(&result.task);
        }
        if merged.similar.is_empty() {
            merged.similar.clone_from(&result.similar);
        }
    }

    Some(merged)
}
