// Halaman v0.2.0 - Filtered, Paginated Dataset Cache
// Entity store + per-filter page maps + pluggable prefetch/fetch strategies

pub mod entity;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod manager;
pub mod page_map;
pub mod prefetch;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod store;

// Re-export main types
pub use entity::Identifiable;
pub use error::{Error, Result};
pub use fetch::{FetchMode, ParallelFetch, ResponseHandler, SequentialFetch};
pub use filter::{DatasetFilter, FieldBinding, FieldFilter, Resolver};
pub use manager::{DatasetManager, HandleIndex};
pub use page_map::PageMap;
pub use prefetch::{AroundRequested, PrefetchStrategy};
pub use registry::{FieldRegistry, FilterBuilder};
pub use snapshot::{DatasetCacheSnapshot, ManagerSnapshot, PageMapSnapshot};
pub use source::{DataSource, PageRequest, PageResponse};
pub use store::{DatasetCache, DatasetProgress, DatasetStore};
