//! Narrowing of ambiguous partial-urn resolution results.

use loadstone_core::Name;
use std::collections::BTreeSet;

/// Filters the candidate modules for a partial urn against a module
/// context.
pub trait ResolutionStrategy: Send + Sync {
    fn resolve(&self, context: Option<&Name>, candidates: BTreeSet<Name>) -> BTreeSet<Name>;
}

/// The default strategy: if the context module is itself a candidate,
/// prefer exactly it; otherwise leave the candidate set untouched, so
/// ambiguity is surfaced to the caller rather than silently resolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextPreferredStrategy;

impl ResolutionStrategy for ContextPreferredStrategy {
    fn resolve(&self, context: Option<&Name>, candidates: BTreeSet<Name>) -> BTreeSet<Name> {
        if let Some(context) = context
            && candidates.contains(context)
        {
            return BTreeSet::from([context.clone()]);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> BTreeSet<Name> {
        values.iter().map(|v| Name::from(*v)).collect()
    }

    #[test]
    fn test_context_match_narrows_to_it() {
        let strategy = ContextPreferredStrategy;
        let result = strategy.resolve(Some(&Name::from("core")), names(&["core", "extra"]));
        assert_eq!(result, names(&["core"]));
    }

    #[test]
    fn test_no_context_match_keeps_ambiguity() {
        let strategy = ContextPreferredStrategy;
        let result = strategy.resolve(Some(&Name::from("other")), names(&["core", "extra"]));
        assert_eq!(result, names(&["core", "extra"]));
        let result = strategy.resolve(None, names(&["core", "extra"]));
        assert_eq!(result, names(&["core", "extra"]));
    }
}
