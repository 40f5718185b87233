//! Prefetch strategies: which pages to load around a requested page.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Picks the pages worth loading given the requested page and the pages a
/// filter already holds. Pages are 1-based; the returned set contains only
/// missing pages within `[1, total_pages]`, in ascending order.
pub trait PrefetchStrategy: Send + Sync {
    fn pages_to_fetch(
        &self,
        requested: u32,
        cached: &BTreeSet<u32>,
        total_pages: u32,
    ) -> Result<BTreeSet<u32>>;
}

fn validate(requested: u32, cached: &BTreeSet<u32>, total_pages: u32) -> Result<()> {
    if requested < 1 {
        return Err(Error::invalid_argument("requested page must be >= 1"));
    }
    if total_pages < 1 {
        return Err(Error::invalid_argument("total pages must be >= 1"));
    }
    if let Some(bad) = cached.iter().find(|&&p| p < 1 || p > total_pages) {
        return Err(Error::invalid_argument(format!(
            "cached page {bad} outside [1, {total_pages}]"
        )));
    }
    Ok(())
}

/// Fetches a window of pages around the requested one, skipping pages
/// already cached.
pub struct AroundRequested {
    before: u32,
    after: u32,
}

impl AroundRequested {
    pub fn new(before: u32, after: u32) -> Self {
        Self { before, after }
    }

    /// Requested page plus its immediate neighbours. This is the manager
    /// default and smooths sequential navigation in both directions.
    pub fn immediate() -> Self {
        Self::new(1, 1)
    }
}

impl PrefetchStrategy for AroundRequested {
    fn pages_to_fetch(
        &self,
        requested: u32,
        cached: &BTreeSet<u32>,
        total_pages: u32,
    ) -> Result<BTreeSet<u32>> {
        validate(requested, cached, total_pages)?;

        let start = requested.saturating_sub(self.before).max(1);
        let end = requested.saturating_add(self.after).min(total_pages);
        Ok((start..=end).filter(|p| !cached.contains(p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_minus_cached() {
        // totalElements = 100, pageSize = 25 -> 4 pages, page 1 cached
        let strategy = AroundRequested::immediate();
        let cached = BTreeSet::from([1]);
        let pages = strategy.pages_to_fetch(2, &cached, 4).unwrap();
        assert_eq!(pages, BTreeSet::from([2, 3]));
    }

    #[test]
    fn test_clamped_at_both_ends() {
        let strategy = AroundRequested::immediate();
        let none = BTreeSet::new();
        assert_eq!(
            strategy.pages_to_fetch(1, &none, 4).unwrap(),
            BTreeSet::from([1, 2])
        );
        assert_eq!(
            strategy.pages_to_fetch(4, &none, 4).unwrap(),
            BTreeSet::from([3, 4])
        );
    }

    #[test]
    fn test_everything_cached_yields_empty() {
        let strategy = AroundRequested::immediate();
        let cached = BTreeSet::from([1, 2, 3, 4]);
        assert!(strategy.pages_to_fetch(2, &cached, 4).unwrap().is_empty());
    }

    #[test]
    fn test_wide_window() {
        let strategy = AroundRequested::new(2, 3);
        let cached = BTreeSet::from([5]);
        let pages = strategy.pages_to_fetch(5, &cached, 10).unwrap();
        assert_eq!(pages, BTreeSet::from([3, 4, 6, 7, 8]));
    }

    #[test]
    fn test_invalid_inputs() {
        let strategy = AroundRequested::immediate();
        let none = BTreeSet::new();
        assert!(strategy.pages_to_fetch(0, &none, 4).is_err());
        assert!(strategy.pages_to_fetch(1, &none, 0).is_err());
        let bad = BTreeSet::from([7]);
        assert!(strategy.pages_to_fetch(1, &bad, 4).is_err());
    }

    #[test]
    fn test_single_page_dataset() {
        let strategy = AroundRequested::immediate();
        let none = BTreeSet::new();
        assert_eq!(
            strategy.pages_to_fetch(1, &none, 1).unwrap(),
            BTreeSet::from([1])
        );
    }
}
