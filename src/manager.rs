//! DatasetManager — the orchestrator tying filters, cache and strategies
//! together.
//!
//! One mutex guards the entity cache and the fingerprint → PageMap
//! registry; it is the single point where background fetch responses and
//! foreground queries meet. Strategy objects (prefetch, fetch mode) are
//! injected and swappable without touching anything else.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::entity::Identifiable;
use crate::error::{Error, Result};
use crate::fetch::{FetchMode, ResponseHandler, SequentialFetch};
use crate::filter::DatasetFilter;
use crate::page_map::PageMap;
use crate::prefetch::{AroundRequested, PrefetchStrategy};
use crate::snapshot::ManagerSnapshot;
use crate::source::{DataSource, PageRequest, PageResponse};
use crate::store::DatasetCache;

type InsertHook<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Surrogate-key index: one uuid per entity id, allocated on first
/// observation and stable for the life of the manager.
pub struct HandleIndex<I> {
    by_handle: DashMap<Uuid, I>,
    by_id: DashMap<I, Uuid>,
}

impl<I: Clone + Eq + Hash + Ord> HandleIndex<I> {
    fn new() -> Self {
        Self {
            by_handle: DashMap::new(),
            by_id: DashMap::new(),
        }
    }

    /// Allocate a handle for an id, or return the one it already has.
    fn allocate(&self, id: &I) -> Uuid {
        let handle = *self.by_id.entry(id.clone()).or_insert_with(Uuid::new_v4);
        self.by_handle.insert(handle, id.clone());
        handle
    }

    fn resolve(&self, handle: &Uuid) -> Option<I> {
        self.by_handle.get(handle).map(|entry| entry.value().clone())
    }

    fn to_map(&self) -> BTreeMap<Uuid, I> {
        self.by_handle
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn from_map(map: &BTreeMap<Uuid, I>) -> Self {
        let index = Self::new();
        for (handle, id) in map {
            index.by_handle.insert(*handle, id.clone());
            index.by_id.insert(id.clone(), *handle);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}

struct ManagerState<T: Identifiable> {
    cache: DatasetCache<T>,
    filters: HashMap<String, PageMap<T::Id>>,
}

/// Filtered, paginated dataset cache.
///
/// `get_data` serves a page from cache when it can, fetches it through
/// the configured fetch mode when it cannot, and prefetches neighbouring
/// pages per the configured strategy. All cache mutation funnels through
/// one locked update action, so the manager can be shared across threads
/// together with a parallel fetch mode.
pub struct DatasetManager<T: Identifiable> {
    state: Arc<Mutex<ManagerState<T>>>,
    handles: Option<Arc<HandleIndex<T::Id>>>,
    insert_hook: Option<InsertHook<T>>,
    prefetch: Arc<dyn PrefetchStrategy>,
    fetch_mode: Arc<dyn FetchMode<T>>,
}

impl<T: Identifiable> DatasetManager<T> {
    /// Empty manager with the default strategies: prefetch the immediate
    /// neighbours, fetch sequentially, no handle index.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManagerState {
                cache: DatasetCache::new(),
                filters: HashMap::new(),
            })),
            handles: None,
            insert_hook: None,
            prefetch: Arc::new(AroundRequested::immediate()),
            fetch_mode: Arc::new(SequentialFetch),
        }
    }

    /// Enable the surrogate-key index. Every newly cached entity gets a
    /// uuid handle, resolvable through `find_by_handle`.
    pub fn with_handles(mut self) -> Self {
        if self.handles.is_none() {
            self.handles = Some(Arc::new(HandleIndex::new()));
        }
        self
    }

    pub fn prefetch(mut self, strategy: impl PrefetchStrategy + 'static) -> Self {
        self.prefetch = Arc::new(strategy);
        self
    }

    pub fn fetch_mode(mut self, mode: impl FetchMode<T> + 'static) -> Self {
        self.fetch_mode = Arc::new(mode);
        self
    }

    /// Hook invoked exactly once per genuinely new entity id.
    pub fn on_insert(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.insert_hook = Some(Arc::new(hook));
        self
    }

    /// Serve one page of the filtered dataset.
    ///
    /// Serves from cache when the page's slots and entities are all
    /// present; otherwise fetches the page, applies it, then hands the
    /// prefetch strategy a chance to load neighbours through the fetch
    /// mode. In a parallel fetch mode the prefetch does not block the
    /// returned result.
    pub fn get_data(
        &self,
        filter: &DatasetFilter<T>,
        page: u32,
        page_size: u32,
        source: &Arc<dyn DataSource<T>>,
    ) -> Result<Vec<T>> {
        if page < 1 {
            return Err(Error::invalid_argument("page index must be >= 1"));
        }
        if page_size < 1 {
            return Err(Error::invalid_argument("page size must be >= 1"));
        }
        let fingerprint = filter.fingerprint();

        let cached = {
            let state = self.state.lock();
            Self::is_page_cached(&state, &fingerprint, page, page_size)
        };

        if !cached {
            let request = PageRequest::single(filter.clone(), page, page_size)?;
            let response = self.fetch_mode.fetch_one(&request, source.as_ref())?;

            let mut state = self.state.lock();
            if !state.filters.contains_key(&fingerprint) {
                state
                    .filters
                    .insert(fingerprint.clone(), PageMap::new(response.total_filtered));
            }
            apply_response(
                &mut state,
                &fingerprint,
                &response,
                self.handles.as_deref(),
                self.insert_hook.as_deref(),
            );
        }

        self.prefetch_if_needed(filter, page, page_size, &fingerprint, source)?;

        let state = self.state.lock();
        let ids = match state.filters.get(&fingerprint) {
            Some(map) => map.id_list(page, page_size),
            None => Vec::new(),
        };
        Ok(state.cache.values_for(&ids))
    }

    /// Entities currently cached for the given ids, absent ones skipped.
    pub fn find_by_id(&self, ids: &[T::Id]) -> Vec<T> {
        self.state.lock().cache.get_many(ids)
    }

    /// Entities for the given handles. Fails when the manager was built
    /// without a handle index; unknown handles are skipped.
    pub fn find_by_handle(&self, handles: &[Uuid]) -> Result<Vec<T>> {
        let index = self
            .handles
            .as_ref()
            .ok_or_else(|| Error::invalid_argument("handle index not enabled on this manager"))?;
        let ids: Vec<T::Id> = handles
            .iter()
            .filter_map(|handle| index.resolve(handle))
            .collect();
        Ok(self.state.lock().cache.get_many(&ids))
    }

    /// Every entity currently cached, in id order.
    pub fn cached_data(&self) -> Vec<T> {
        self.state.lock().cache.all_values()
    }

    pub fn known_count(&self) -> u64 {
        self.state.lock().cache.progress().known_count()
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().cache.progress().is_complete()
    }

    /// Full snapshot of the cache, all page maps and the handle map.
    pub fn snapshot(&self) -> ManagerSnapshot<T, T::Id> {
        let state = self.state.lock();
        ManagerSnapshot {
            cache: state.cache.to_snapshot(),
            filters: state
                .filters
                .iter()
                .map(|(fingerprint, map)| (fingerprint.clone(), map.to_snapshot()))
                .collect(),
            handles: self.handles.as_ref().map(|index| index.to_map()),
        }
    }

    /// Rebuild a manager from a snapshot. Strategies come back as the
    /// defaults and can be swapped with the chainable setters.
    pub fn from_snapshot(snapshot: &ManagerSnapshot<T, T::Id>) -> Result<Self> {
        let mut filters = HashMap::with_capacity(snapshot.filters.len());
        for (fingerprint, map_snapshot) in &snapshot.filters {
            filters.insert(fingerprint.clone(), PageMap::from_snapshot(map_snapshot)?);
        }
        let mut manager = Self::new();
        manager.state = Arc::new(Mutex::new(ManagerState {
            cache: DatasetCache::from_snapshot(&snapshot.cache),
            filters,
        }));
        manager.handles = snapshot
            .handles
            .as_ref()
            .map(|map| Arc::new(HandleIndex::from_map(map)));
        Ok(manager)
    }

    /// A page is served from cache only when its slots are all filled and
    /// the entity cache still holds every recorded id.
    fn is_page_cached(
        state: &ManagerState<T>,
        fingerprint: &str,
        page: u32,
        page_size: u32,
    ) -> bool {
        match state.filters.get(fingerprint) {
            Some(map) => {
                map.is_page_fully_cached(page, page_size)
                    && state.cache.has_all(&map.id_list(page, page_size))
            }
            None => false,
        }
    }

    fn prefetch_if_needed(
        &self,
        filter: &DatasetFilter<T>,
        page: u32,
        page_size: u32,
        fingerprint: &str,
        source: &Arc<dyn DataSource<T>>,
    ) -> Result<()> {
        let (cached_pages, total_pages) = {
            let state = self.state.lock();
            let Some(map) = state.filters.get(fingerprint) else {
                return Ok(());
            };
            let total_pages = total_pages(map.total_elements(), page_size);
            (map.pages_already_cached(), total_pages)
        };

        if cached_pages.len() as u64 >= total_pages as u64 {
            return Ok(());
        }
        let to_fetch = self.prefetch.pages_to_fetch(page, &cached_pages, total_pages)?;
        if to_fetch.is_empty() {
            return Ok(());
        }

        let request = PageRequest::new(filter.clone(), to_fetch, page_size)?;
        let handler = self.cache_update_handler(fingerprint.to_string());
        self.fetch_mode
            .fetch_many(request, Arc::clone(source), handler)
    }

    /// The locked cache-update action every background response funnels
    /// through.
    fn cache_update_handler(&self, fingerprint: String) -> ResponseHandler<T> {
        let state = Arc::clone(&self.state);
        let handles = self.handles.clone();
        let hook = self.insert_hook.clone();
        Arc::new(move |response: PageResponse<T>| {
            let mut state = state.lock();
            apply_response(
                &mut state,
                &fingerprint,
                &response,
                handles.as_deref(),
                hook.as_deref(),
            );
        })
    }
}

impl<T: Identifiable> Default for DatasetManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn total_pages(total_elements: u32, page_size: u32) -> u32 {
    ((total_elements as u64).div_ceil(page_size as u64).max(1)) as u32
}

/// Apply one page response to the page map and the entity cache. Inserts
/// are monotonic: a response never clears slots it does not cover, so a
/// duplicated fetch is harmless.
fn apply_response<T: Identifiable>(
    state: &mut ManagerState<T>,
    fingerprint: &str,
    response: &PageResponse<T>,
    handles: Option<&HandleIndex<T::Id>>,
    hook: Option<&(dyn Fn(&T) + Send + Sync)>,
) {
    if let Some(map) = state.filters.get_mut(fingerprint) {
        if map.total_elements() != response.total_filtered {
            tracing::warn!(
                fingerprint,
                have = map.total_elements(),
                reported = response.total_filtered,
                "filtered total drifted, keeping original sizing"
            );
        }
        if let Err(err) = map.update(&response.ids(), response.page, response.page_size) {
            tracing::warn!(page = response.page, error = %err, "discarding page response");
            return;
        }
    }

    state
        .cache
        .update_from_page(&response.data, response.total_dataset, |entity| {
            if let Some(index) = handles {
                index.allocate(&entity.id());
            }
            if let Some(hook) = hook {
                hook(entity);
            }
        });
}
