//! PageMap — positional id cache for one filter fingerprint.
//!
//! Stores the identifiers of a filtered result set at their source-imposed
//! positions, with two RoaringBitmaps on the side:
//!
//! * `populated_positions` — bit *i* set means slot *i* holds an id.
//! * `populated_pages` — bit *p-1* set means page *p* was written whole.
//!
//! The position bitmap answers the precise question that guards reads
//! ("is every slot of this page filled?"); the page bitmap answers the
//! cheap one the prefetch strategy asks ("which pages were loaded?").
//! Pages are 1-based in the public API and one page size per map is
//! assumed throughout.

use std::collections::BTreeSet;

use roaring::RoaringBitmap;

use crate::error::{Error, Result};
use crate::snapshot::{bitmap_from_bytes, bitmap_to_bytes, PageMapSnapshot};

pub struct PageMap<I> {
    /// Size of the filtered result set. Fixed at construction.
    total_elements: u32,
    id_storage: Vec<Option<I>>,
    populated_positions: RoaringBitmap,
    populated_pages: RoaringBitmap,
    known_count: u64,
}

impl<I: Clone> PageMap<I> {
    /// New map for a filtered result set of `total_elements` ids, all
    /// slots unfilled.
    pub fn new(total_elements: u32) -> Self {
        Self {
            total_elements,
            id_storage: vec![None; total_elements as usize],
            populated_positions: RoaringBitmap::new(),
            populated_pages: RoaringBitmap::new(),
            known_count: 0,
        }
    }

    /// Slot range of a page, clipped to `total_elements`. `None` when the
    /// page is out of range.
    fn window(&self, page: u32, page_size: u32) -> Option<(usize, usize)> {
        if page < 1 {
            return None;
        }
        let from = (page as u64 - 1) * page_size as u64;
        if from >= self.total_elements as u64 {
            return None;
        }
        let to = (from + page_size as u64).min(self.total_elements as u64);
        Some((from as usize, to as usize))
    }

    /// Owned copy of the page's slots. Unfilled slots are `None`;
    /// an out-of-range page yields an empty list.
    pub fn id_list(&self, page: u32, page_size: u32) -> Vec<Option<I>> {
        match self.window(page, page_size) {
            Some((from, to)) => self.id_storage[from..to].to_vec(),
            None => Vec::new(),
        }
    }

    /// Write a page of ids starting at the page's first slot, bounded by
    /// the page window. First population of a slot sets its position bit
    /// and counts it; repopulation overwrites without double counting.
    /// The page bit is set only when the whole window was written by this
    /// call. An empty input is a no-op.
    pub fn update(&mut self, ids: &[I], page: u32, page_size: u32) -> Result<()> {
        if page < 1 {
            return Err(Error::invalid_argument("page index must be >= 1"));
        }
        if ids.is_empty() {
            return Ok(());
        }
        let Some((from, to)) = self.window(page, page_size) else {
            return Ok(());
        };

        let write_count = ids.len().min(to - from);
        for (offset, id) in ids[..write_count].iter().enumerate() {
            if self.populated_positions.insert((from + offset) as u32) {
                self.known_count += 1;
            }
            self.id_storage[from + offset] = Some(id.clone());
        }

        if write_count == to - from {
            self.populated_pages.insert(page - 1);
        }
        Ok(())
    }

    /// Per-position check: true iff every slot of the page holds an id.
    /// Deliberately ignores the page bitmap, which can lag for a tail
    /// page shorter than the page size.
    pub fn is_page_fully_cached(&self, page: u32, page_size: u32) -> bool {
        match self.window(page, page_size) {
            Some((from, to)) => (from..to).all(|i| self.populated_positions.contains(i as u32)),
            None => false,
        }
    }

    /// 1-based indices of pages written whole, ascending.
    pub fn pages_already_cached(&self) -> BTreeSet<u32> {
        self.populated_pages.iter().map(|bit| bit + 1).collect()
    }

    pub fn total_elements(&self) -> u32 {
        self.total_elements
    }

    /// Number of filled slots. Always equals the position bitmap's
    /// cardinality.
    pub fn known_count(&self) -> u64 {
        self.known_count
    }

    /// Read-only view of the whole positional storage.
    pub fn all_ids(&self) -> &[Option<I>] {
        &self.id_storage
    }

    pub fn to_snapshot(&self) -> PageMapSnapshot<I> {
        PageMapSnapshot {
            total_elements: self.total_elements,
            known_count: self.known_count,
            id_storage: self.id_storage.clone(),
            populated_positions: bitmap_to_bytes(&self.populated_positions),
            populated_pages: bitmap_to_bytes(&self.populated_pages),
        }
    }

    pub fn from_snapshot(snapshot: &PageMapSnapshot<I>) -> Result<Self> {
        if snapshot.id_storage.len() != snapshot.total_elements as usize {
            return Err(Error::snapshot(format!(
                "id storage holds {} slots, expected {}",
                snapshot.id_storage.len(),
                snapshot.total_elements
            )));
        }
        let populated_positions = bitmap_from_bytes(&snapshot.populated_positions)?;
        let populated_pages = bitmap_from_bytes(&snapshot.populated_pages)?;
        if populated_positions.len() != snapshot.known_count {
            return Err(Error::snapshot(format!(
                "known count {} does not match {} populated positions",
                snapshot.known_count,
                populated_positions.len()
            )));
        }
        Ok(Self {
            total_elements: snapshot.total_elements,
            id_storage: snapshot.id_storage.clone(),
            populated_positions,
            populated_pages,
            known_count: snapshot.known_count,
        })
    }
}
