//! Fetch modes: how multi-page requests reach the data source.

use std::sync::Arc;

use crate::entity::Identifiable;
use crate::error::Result;
use crate::source::{DataSource, PageRequest, PageResponse};

/// Callback receiving each successfully fetched page.
pub type ResponseHandler<T> = Arc<dyn Fn(PageResponse<T>) + Send + Sync>;

/// Dispatches page fetches against a data source.
pub trait FetchMode<T: Identifiable>: Send + Sync {
    /// Fetch the first page of the request's set, synchronously.
    fn fetch_one(
        &self,
        request: &PageRequest<T>,
        source: &dyn DataSource<T>,
    ) -> Result<PageResponse<T>> {
        source.request_page(request, request.first_page())
    }

    /// Fetch every page of the request's set, delivering each response to
    /// `on_response`. Implementations choose the scheduling and ordering.
    fn fetch_many(
        &self,
        request: PageRequest<T>,
        source: Arc<dyn DataSource<T>>,
        on_response: ResponseHandler<T>,
    ) -> Result<()>;
}

/// Purely sequential fetching on the caller's thread. The callback runs
/// once per page in ascending page order; the first source error aborts
/// the remaining pages and propagates to the caller.
pub struct SequentialFetch;

impl<T: Identifiable> FetchMode<T> for SequentialFetch {
    fn fetch_many(
        &self,
        request: PageRequest<T>,
        source: Arc<dyn DataSource<T>>,
        on_response: ResponseHandler<T>,
    ) -> Result<()> {
        for page in request.pages().iter().copied() {
            let response = source.request_page(&request, page)?;
            on_response(response);
        }
        Ok(())
    }
}

/// Fetches pages on a bounded worker pool. `fetch_many` returns without
/// waiting; callbacks arrive in any order, at most `workers` fetches run
/// at once. A failed page is logged and skipped — its cache slots stay
/// unpopulated, so a later query retries it. The pool is joined when the
/// strategy is dropped.
pub struct ParallelFetch {
    pool: rayon::ThreadPool,
}

impl ParallelFetch {
    pub fn new() -> Self {
        Self::with_workers(4)
    }

    pub fn with_workers(workers: usize) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("halaman-fetch-{i}"))
            .build()
            .expect("failed to build fetch worker pool");
        Self { pool }
    }
}

impl Default for ParallelFetch {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identifiable> FetchMode<T> for ParallelFetch {
    fn fetch_many(
        &self,
        request: PageRequest<T>,
        source: Arc<dyn DataSource<T>>,
        on_response: ResponseHandler<T>,
    ) -> Result<()> {
        let request = Arc::new(request);
        for page in request.pages().iter().copied() {
            let request = Arc::clone(&request);
            let source = Arc::clone(&source);
            let on_response = Arc::clone(&on_response);
            self.pool.spawn(move || {
                match source.request_page(&request, page) {
                    Ok(response) => on_response(response),
                    Err(err) => {
                        tracing::warn!(page, error = %err, "background page fetch failed")
                    }
                }
            });
        }
        Ok(())
    }
}
