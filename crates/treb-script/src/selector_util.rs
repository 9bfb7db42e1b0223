//! Shared fan-in helper: turns a list of candidate matches into exactly one value, deferring to
//! a [`Selector`] when there is more than one.

use treb_common::error::{Result, TrebError};
use treb_contracts::Selector;

/// Resolves `matches` to a single value using `label`, a human-readable key per match. Zero
/// matches is `NotFound`; more than one defers to `selector`.
pub fn resolve_ambiguous_by<T: Clone>(
    matches: Vec<T>,
    label: impl Fn(&T) -> String,
    selector: &dyn Selector<T>,
    reference: &str,
) -> Result<T> {
    match matches.len() {
        0 => Err(TrebError::NotFound(format!("no match for `{reference}`"))),
        1 => Ok(matches.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<(String, T)> = matches.into_iter().map(|m| (label(&m), m)).collect();
            selector.select_one(&candidates, reference)
        }
    }
}

/// Convenience wrapper for `Deployment` matches, labeled by their registry id.
pub fn resolve_ambiguous(
    matches: Vec<treb_registry::model::Deployment>,
    selector: &dyn Selector<treb_registry::model::Deployment>,
    reference: &str,
) -> Result<treb_registry::model::Deployment> {
    resolve_ambiguous_by(matches, |d| d.id.clone(), selector, reference)
}
