use parking_lot::Mutex;
use std::collections::HashSet;

pub(crate) type Set = HashSet<String>;

/// Names of the derived items an adapter applied from its last payload.
#[derive(Debug, Default)]
pub(crate) struct ThreadSafeSet {
    inner: Mutex<Set>,
}

impl ThreadSafeSet {
    pub(crate) fn new() -> Self {
        ThreadSafeSet::default()
    }

    /// Replaces the retained names with `current` and returns, sorted, the
    /// names that were retained but are missing from `current`.
    ///
    /// Callers apply every entry of the new payload first, then revert the
    /// returned names to their default policy.
    pub(crate) fn diff_and_emplace(&self, current: Set) -> Vec<String> {
        let mut previous = self.inner.lock();
        let mut removed: Vec<String> = previous
            .iter()
            .filter(|name| !current.contains(*name))
            .cloned()
            .collect();
        removed.sort();
        *previous = current;
        removed
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Set {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> Set {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_and_emplace() {
        let ts = ThreadSafeSet::new();
        assert!(ts.diff_and_emplace(set(&["a", "b", "c"])).is_empty());

        let removed = ts.diff_and_emplace(set(&["b", "c", "d"]));
        assert_eq!(removed, vec!["a".to_string()]);
        assert_eq!(ts.snapshot(), set(&["b", "c", "d"]));
    }

    #[test]
    fn test_diff_from_empty() {
        let ts = ThreadSafeSet::new();
        assert!(ts.diff_and_emplace(set(&["x"])).is_empty());
        assert_eq!(ts.snapshot(), set(&["x"]));
    }

    #[test]
    fn test_diff_to_empty() {
        let ts = ThreadSafeSet::new();
        ts.diff_and_emplace(set(&["x"]));
        assert_eq!(ts.diff_and_emplace(Set::new()), vec!["x".to_string()]);
        assert!(ts.snapshot().is_empty());
    }

    #[test]
    fn test_removed_is_sorted() {
        let ts = ThreadSafeSet::new();
        ts.diff_and_emplace(set(&["m", "c", "x", "a"]));
        assert_eq!(ts.diff_and_emplace(set(&["c"])), vec!["a", "m", "x"]);
    }
}
