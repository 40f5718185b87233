//! Entity storage and progress tracking for the global dataset cache.

use std::collections::{BTreeMap, BTreeSet};

use crate::entity::Identifiable;
use crate::snapshot::DatasetCacheSnapshot;

// ============ DATASET STORE ============

/// Ordered storage of present entities plus the set of identifiers known
/// to map to nothing (gaps). The two sides are always disjoint.
pub struct DatasetStore<T: Identifiable> {
    dataset: BTreeMap<T::Id, T>,
    empty_ids: BTreeSet<T::Id>,
}

impl<T: Identifiable> DatasetStore<T> {
    pub fn new() -> Self {
        Self {
            dataset: BTreeMap::new(),
            empty_ids: BTreeSet::new(),
        }
    }

    /// Insert or replace an entity. Clears any empty mark for its id.
    pub fn put(&mut self, entity: T) {
        let id = entity.id();
        self.empty_ids.remove(&id);
        tracing::trace!(id = ?id, "stored entity");
        self.dataset.insert(id, entity);
    }

    /// Delete an entity and mark its id as known-empty.
    pub fn remove(&mut self, id: &T::Id) {
        self.dataset.remove(id);
        self.empty_ids.insert(id.clone());
        tracing::trace!(id = ?id, "removed entity, id marked empty");
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.dataset.contains_key(id)
    }

    /// Entities for the given ids, skipping absent ones.
    pub fn get_many(&self, ids: &[T::Id]) -> Vec<T> {
        ids.iter()
            .filter_map(|id| self.dataset.get(id).cloned())
            .collect()
    }

    /// Entities for a positional id list, skipping unfilled slots and
    /// absent ids.
    pub fn values_for(&self, ids: &[Option<T::Id>]) -> Vec<T> {
        ids.iter()
            .filter_map(|id| id.as_ref())
            .filter_map(|id| self.dataset.get(id).cloned())
            .collect()
    }

    /// True iff every slot is filled and every id is present.
    pub fn has_all(&self, ids: &[Option<T::Id>]) -> bool {
        ids.iter()
            .all(|id| matches!(id, Some(id) if self.dataset.contains_key(id)))
    }

    pub fn all_values(&self) -> Vec<T> {
        self.dataset.values().cloned().collect()
    }

    pub fn all_ids(&self) -> Vec<T::Id> {
        self.dataset.keys().cloned().collect()
    }

    pub fn empty_ids(&self) -> &BTreeSet<T::Id> {
        &self.empty_ids
    }

    pub fn as_map(&self) -> &BTreeMap<T::Id, T> {
        &self.dataset
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn clear(&mut self) {
        let removed = self.dataset.len();
        self.dataset.clear();
        self.empty_ids.clear();
        tracing::debug!(removed, "dataset store cleared");
    }
}

impl<T: Identifiable> Default for DatasetStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============ DATASET PROGRESS ============

/// Loading progress over the whole dataset: identifier bounds, how many
/// entities are known and how many the source says exist in total.
pub struct DatasetProgress<I> {
    min_id: Option<I>,
    max_id: Option<I>,
    known_count: u64,
    expected_total: Option<u64>,
}

impl<I: Clone + Ord> DatasetProgress<I> {
    pub fn new() -> Self {
        Self {
            min_id: None,
            max_id: None,
            known_count: 0,
            expected_total: None,
        }
    }

    /// First call sets the expected total; a later call with a different
    /// value logs a warning and overwrites it.
    pub fn update_expected_total(&mut self, total: u64) {
        match self.expected_total {
            None => {
                self.expected_total = Some(total);
                tracing::debug!(total, "expected total initialized");
            }
            Some(previous) if previous != total => {
                tracing::warn!(previous, total, "expected total changed");
                self.expected_total = Some(total);
            }
            Some(_) => {}
        }
    }

    /// Widen the id bounds to cover a newly discovered id.
    pub fn update_bounds(&mut self, id: &I) {
        if self.min_id.as_ref().is_none_or(|min| id < min) {
            self.min_id = Some(id.clone());
        }
        if self.max_id.as_ref().is_none_or(|max| id > max) {
            self.max_id = Some(id.clone());
        }
    }

    pub fn increment_known(&mut self) {
        self.known_count += 1;
    }

    /// Floored at zero.
    pub fn decrement_known(&mut self) {
        self.known_count = self.known_count.saturating_sub(1);
    }

    pub fn completion_percentage(&self) -> u32 {
        match self.expected_total {
            Some(total) if total > 0 => ((self.known_count as f64 * 100.0) / total as f64) as u32,
            _ => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.expected_total, Some(total) if self.known_count >= total)
    }

    pub fn min_id(&self) -> Option<&I> {
        self.min_id.as_ref()
    }

    pub fn max_id(&self) -> Option<&I> {
        self.max_id.as_ref()
    }

    pub fn known_count(&self) -> u64 {
        self.known_count
    }

    /// `None` means the source has not reported a total yet.
    pub fn expected_total(&self) -> Option<u64> {
        self.expected_total
    }

    pub fn reset(&mut self) {
        self.min_id = None;
        self.max_id = None;
        self.known_count = 0;
        self.expected_total = None;
        tracing::debug!("dataset progress reset");
    }
}

impl<I: Clone + Ord> Default for DatasetProgress<I> {
    fn default() -> Self {
        Self::new()
    }
}

// ============ DATASET CACHE ============

/// Store plus progress, updated together from paginated responses.
///
/// Not internally synchronised. Callers sharing a cache across threads
/// must provide external exclusion.
pub struct DatasetCache<T: Identifiable> {
    store: DatasetStore<T>,
    progress: DatasetProgress<T::Id>,
}

impl<T: Identifiable> DatasetCache<T> {
    pub fn new() -> Self {
        Self {
            store: DatasetStore::new(),
            progress: DatasetProgress::new(),
        }
    }

    /// Apply one page of entities. Only genuinely new ids are inserted;
    /// each insertion updates progress and fires `on_insert` exactly once.
    /// An empty page is a no-op (the expected total is left untouched).
    pub fn update_from_page(&mut self, items: &[T], total: u64, mut on_insert: impl FnMut(&T)) {
        if items.is_empty() {
            return;
        }
        self.progress.update_expected_total(total);

        for item in items {
            let id = item.id();
            if !self.store.contains(&id) {
                self.store.put(item.clone());
                self.progress.increment_known();
                self.progress.update_bounds(&id);
                on_insert(item);
            }
        }

        tracing::debug!(
            known = self.progress.known_count(),
            completion = self.progress.completion_percentage(),
            "cache updated from page"
        );
    }

    /// Remove an entity, keeping progress in step with the store.
    pub fn remove(&mut self, id: &T::Id) {
        if self.store.contains(id) {
            self.store.remove(id);
            self.progress.decrement_known();
        }
    }

    pub fn has_all(&self, ids: &[Option<T::Id>]) -> bool {
        self.store.has_all(ids)
    }

    pub fn values_for(&self, ids: &[Option<T::Id>]) -> Vec<T> {
        self.store.values_for(ids)
    }

    pub fn get_many(&self, ids: &[T::Id]) -> Vec<T> {
        self.store.get_many(ids)
    }

    pub fn all_values(&self) -> Vec<T> {
        self.store.all_values()
    }

    pub fn store(&self) -> &DatasetStore<T> {
        &self.store
    }

    pub fn progress(&self) -> &DatasetProgress<T::Id> {
        &self.progress
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.progress.reset();
    }

    /// Full immutable snapshot of store and progress, suitable for
    /// external persistence.
    pub fn to_snapshot(&self) -> DatasetCacheSnapshot<T, T::Id> {
        DatasetCacheSnapshot {
            dataset: self.store.dataset.clone(),
            empty_ids: self.store.empty_ids.clone(),
            min_id: self.progress.min_id.clone(),
            max_id: self.progress.max_id.clone(),
            known_count: self.progress.known_count,
            expected_total: self.progress.expected_total,
        }
    }

    pub fn from_snapshot(snapshot: &DatasetCacheSnapshot<T, T::Id>) -> Self {
        tracing::debug!(
            items = snapshot.dataset.len(),
            known = snapshot.known_count,
            "dataset cache restored from snapshot"
        );
        Self {
            store: DatasetStore {
                dataset: snapshot.dataset.clone(),
                empty_ids: snapshot.empty_ids.clone(),
            },
            progress: DatasetProgress {
                min_id: snapshot.min_id.clone(),
                max_id: snapshot.max_id.clone(),
                known_count: snapshot.known_count,
                expected_total: snapshot.expected_total,
            },
        }
    }
}

impl<T: Identifiable> Default for DatasetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
