//! Passive snapshot records for external persistence.
//!
//! A manager snapshot is `(cache, filters, extension)`: the entity cache,
//! the per-fingerprint page maps, and an optional handle map. Records are
//! plain serde data; the wire format is whatever the caller's store uses.
//! Bitmaps travel as their portable roaring serialisation so the exact
//! bit pattern (and with it every popcount) survives the round trip.

use std::collections::{BTreeMap, BTreeSet};

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// State of a `DatasetCache`: every present entity, the known-empty ids
/// and the progress tuple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetCacheSnapshot<T, I: Ord> {
    pub dataset: BTreeMap<I, T>,
    pub empty_ids: BTreeSet<I>,
    pub min_id: Option<I>,
    pub max_id: Option<I>,
    pub known_count: u64,
    pub expected_total: Option<u64>,
}

/// State of one `PageMap`. The bitmaps are roaring-serialised bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageMapSnapshot<I> {
    pub total_elements: u32,
    pub known_count: u64,
    pub id_storage: Vec<Option<I>>,
    pub populated_positions: Vec<u8>,
    pub populated_pages: Vec<u8>,
}

/// Complete manager state. `handles` is present only for managers built
/// with a handle index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManagerSnapshot<T, I: Ord> {
    pub cache: DatasetCacheSnapshot<T, I>,
    pub filters: BTreeMap<String, PageMapSnapshot<I>>,
    pub handles: Option<BTreeMap<Uuid, I>>,
}

pub(crate) fn bitmap_to_bytes(bitmap: &RoaringBitmap) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(bitmap.serialized_size());
    bitmap
        .serialize_into(&mut bytes)
        .expect("serialising a bitmap into a Vec cannot fail");
    bytes
}

pub(crate) fn bitmap_from_bytes(bytes: &[u8]) -> Result<RoaringBitmap> {
    RoaringBitmap::deserialize_from(bytes).map_err(|err| Error::snapshot(err.to_string()))
}
