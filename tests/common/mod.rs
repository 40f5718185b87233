//! Shared fixture: a deterministic person dataset and in-memory sources.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use halaman::{
    DataSource, Error, FieldRegistry, Identifiable, PageRequest, PageResponse, Result,
};

pub const FIRST_NAMES: [&str; 10] = [
    "Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Hugo", "Ivy", "Karen",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: u32,
    pub name: String,
    pub salary: f64,
    pub birth_year: i32,
}

impl Identifiable for Person {
    type Id = u32;
    fn id(&self) -> u32 {
        self.id
    }
}

/// Deterministic dataset with ids 1..=count, ordered by id.
pub fn sample_people(count: u32) -> Vec<Person> {
    (1..=count)
        .map(|i| Person {
            id: i,
            name: FIRST_NAMES[(i as usize - 1) % FIRST_NAMES.len()].to_string(),
            salary: 1000.0 + (i as f64 * 137.0) % 9000.0,
            birth_year: 1970 + (i as i32 * 7) % 36,
        })
        .collect()
}

pub fn person_registry() -> FieldRegistry<Person> {
    let registry = FieldRegistry::new();
    registry.register("name", |p: &Person| Some(Value::from(p.name.clone())));
    registry.register("salary", |p: &Person| Some(Value::from(p.salary)));
    registry.register("birth_year", |p: &Person| Some(Value::from(p.birth_year)));
    registry
}

/// In-memory source over a fixed person list. Counts every page request
/// so tests can assert how often the cache went to the source.
pub struct MemorySource {
    people: Vec<Person>,
    calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(people: Vec<Person>) -> Self {
        Self {
            people,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataSource<Person> for MemorySource {
    fn request_page(&self, request: &PageRequest<Person>, page: u32) -> Result<PageResponse<Person>> {
        if page < 1 {
            return Err(Error::invalid_argument("page must be >= 1"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        let filtered: Vec<Person> = self
            .people
            .iter()
            .filter(|p| request.filter().matches(p).unwrap_or(false))
            .cloned()
            .collect();
        let total_filtered = filtered.len() as u32;

        let from = ((page - 1) * request.page_size()) as usize;
        let to = ((page * request.page_size()) as usize).min(filtered.len());
        let data = if from >= filtered.len() {
            Vec::new()
        } else {
            filtered[from..to].to_vec()
        };

        Ok(PageResponse {
            data,
            page,
            page_size: request.page_size(),
            total_filtered,
            total_dataset: self.people.len() as u64,
        })
    }
}

/// A source that fails every request. Used to prove cached pages never
/// touch the source again.
pub struct FailingSource;

impl DataSource<Person> for FailingSource {
    fn request_page(&self, _request: &PageRequest<Person>, _page: u32) -> Result<PageResponse<Person>> {
        Err(Error::source_failure("source offline"))
    }
}

/// Poll until `cond` holds or the timeout expires. Returns whether the
/// condition was met.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
