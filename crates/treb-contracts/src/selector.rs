//! The abstract `Selector` capability: components that historically prompted the user depend
//! on this instead, per the design notes. Non-interactive mode is the null selector that
//! always returns `Ambiguous`.

use treb_common::error::{Result, TrebError};

/// `candidates` pairs a human-readable label with the value it identifies, so a selector never
/// needs its items to implement `Display`.
pub trait Selector<T: Clone>: Send + Sync {
    fn select_one(&self, candidates: &[(String, T)], prompt: &str) -> Result<T>;
}

/// The non-interactive selector: every ambiguous choice is a hard error.
pub struct NonInteractiveSelector;

impl<T: Clone> Selector<T> for NonInteractiveSelector {
    fn select_one(&self, candidates: &[(String, T)], prompt: &str) -> Result<T> {
        Err(TrebError::Ambiguous {
            reference: prompt.to_string(),
            candidates: candidates.iter().map(|(label, _)| label.clone()).collect(),
        })
    }
}
