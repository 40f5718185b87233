//! The data source contract: page requests and responses.

use std::collections::BTreeSet;

use crate::entity::Identifiable;
use crate::error::{Error, Result};
use crate::filter::DatasetFilter;

/// A validated request for one or more 1-based pages under a filter.
#[derive(Clone)]
pub struct PageRequest<T: Identifiable> {
    filter: DatasetFilter<T>,
    pages: BTreeSet<u32>,
    page_size: u32,
}

impl<T: Identifiable> PageRequest<T> {
    pub fn new(filter: DatasetFilter<T>, pages: BTreeSet<u32>, page_size: u32) -> Result<Self> {
        if pages.is_empty() {
            return Err(Error::invalid_argument("request needs at least one page"));
        }
        if pages.iter().any(|&p| p < 1) {
            return Err(Error::invalid_argument("page numbers must be >= 1"));
        }
        if page_size < 1 {
            return Err(Error::invalid_argument("page size must be >= 1"));
        }
        Ok(Self {
            filter,
            pages,
            page_size,
        })
    }

    pub fn single(filter: DatasetFilter<T>, page: u32, page_size: u32) -> Result<Self> {
        Self::new(filter, BTreeSet::from([page]), page_size)
    }

    pub fn filter(&self) -> &DatasetFilter<T> {
        &self.filter
    }

    pub fn pages(&self) -> &BTreeSet<u32> {
        &self.pages
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Lowest page of the set. The set is never empty by construction.
    pub fn first_page(&self) -> u32 {
        self.pages
            .iter()
            .next()
            .copied()
            .expect("page set is never empty")
    }
}

/// One page of entities plus the totals the source knows.
#[derive(Clone, Debug)]
pub struct PageResponse<T: Identifiable> {
    /// Entities of this page, in source order. Possibly empty, never
    /// padded.
    pub data: Vec<T>,
    /// Echoed 1-based page index.
    pub page: u32,
    /// Echoed page size.
    pub page_size: u32,
    /// Entities matching the request's filter.
    pub total_filtered: u32,
    /// Entities in the underlying dataset, unfiltered.
    pub total_dataset: u64,
}

impl<T: Identifiable> PageResponse<T> {
    /// Identifiers of this page's entities, in page order.
    pub fn ids(&self) -> Vec<T::Id> {
        self.data.iter().map(Identifiable::id).collect()
    }
}

/// Paging access to the underlying dataset.
///
/// Implementations must use 1-based pages, answer out-of-range pages with
/// an empty entity list and correct totals, and never pad short pages.
pub trait DataSource<T: Identifiable>: Send + Sync {
    fn request_page(&self, request: &PageRequest<T>, page: u32) -> Result<PageResponse<T>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DatasetFilter;

    #[derive(Clone, Debug)]
    struct Rec {
        id: u32,
    }

    impl Identifiable for Rec {
        type Id = u32;
        fn id(&self) -> u32 {
            self.id
        }
    }

    #[test]
    fn test_request_validation() {
        let filter: DatasetFilter<Rec> = DatasetFilter::empty();
        assert!(PageRequest::new(filter.clone(), BTreeSet::new(), 10).is_err());
        assert!(PageRequest::single(filter.clone(), 0, 10).is_err());
        assert!(PageRequest::single(filter.clone(), 1, 0).is_err());

        let ok = PageRequest::new(filter, BTreeSet::from([3, 1, 2]), 10).unwrap();
        assert_eq!(ok.first_page(), 1);
        assert_eq!(ok.pages().len(), 3);
    }

    #[test]
    fn test_response_ids_in_page_order() {
        let response = PageResponse {
            data: vec![Rec { id: 4 }, Rec { id: 2 }, Rec { id: 9 }],
            page: 1,
            page_size: 3,
            total_filtered: 3,
            total_dataset: 3,
        };
        assert_eq!(response.ids(), vec![4, 2, 9]);
    }
}
