//! Tests for M2: Filter Fingerprints
//! Order-insensitive cache keys and filtered paging end to end.
//!
//! Run with:
//! cargo test --test m2_filter_fingerprints -- --nocapture

mod common;

use std::sync::Arc;

use common::{person_registry, sample_people, MemorySource, Person};
use halaman::{DataSource, DatasetManager, Error};
use serde_json::json;

mod fingerprints {
    use super::*;

    #[test]
    fn test_binding_order_does_not_change_the_key() {
        let registry = person_registry();
        let f1 = registry
            .filter()
            .contains("name", "a")
            .min("salary", json!(2000.0))
            .max("salary", json!(5000.0))
            .build()
            .unwrap();
        let f2 = registry
            .filter()
            .max("salary", json!(5000.0))
            .contains("name", "a")
            .min("salary", json!(2000.0))
            .build()
            .unwrap();

        assert_eq!(f1.fingerprint(), f2.fingerprint());
        println!("fingerprint: {}", f1.fingerprint());
    }

    #[test]
    fn test_equal_fingerprints_share_one_page_map() {
        let registry = person_registry();
        let source = Arc::new(MemorySource::new(sample_people(100)));
        let provider: Arc<dyn DataSource<Person>> = source.clone();
        let manager = DatasetManager::new();

        let f1 = registry
            .filter()
            .contains("name", "a")
            .min("salary", json!(2000.0))
            .max("salary", json!(5000.0))
            .build()
            .unwrap();
        let f2 = registry
            .filter()
            .max("salary", json!(5000.0))
            .min("salary", json!(2000.0))
            .contains("name", "a")
            .build()
            .unwrap();

        let first = manager.get_data(&f1, 1, 10, &provider).unwrap();
        let calls = source.calls();
        let second = manager.get_data(&f2, 1, 10, &provider).unwrap();

        assert_eq!(first, second);
        assert_eq!(source.calls(), calls, "f2 must reuse f1's cached pages");
        assert_eq!(manager.snapshot().filters.len(), 1);
    }

    #[test]
    fn test_different_filters_get_their_own_maps() {
        let registry = person_registry();
        let source = Arc::new(MemorySource::new(sample_people(100)));
        let provider: Arc<dyn DataSource<Person>> = source.clone();
        let manager = DatasetManager::new();

        let narrow = registry
            .filter()
            .contains("name", "a")
            .build()
            .unwrap();
        let wide = registry
            .filter()
            .min("salary", json!(0))
            .build()
            .unwrap();

        manager.get_data(&narrow, 1, 10, &provider).unwrap();
        manager.get_data(&wide, 1, 10, &provider).unwrap();
        assert_eq!(manager.snapshot().filters.len(), 2);
    }
}

mod filtered_paging {
    use super::*;

    #[test]
    fn test_pages_follow_the_source_order_of_the_filtered_set() {
        let registry = person_registry();
        let people = sample_people(100);
        let source = Arc::new(MemorySource::new(people.clone()));
        let provider: Arc<dyn DataSource<Person>> = source.clone();
        let manager = DatasetManager::new();

        let filter = registry
            .filter()
            .min("salary", json!(2000.0))
            .max("salary", json!(5000.0))
            .build()
            .unwrap();

        let expected: Vec<u32> = people
            .iter()
            .filter(|p| p.salary >= 2000.0 && p.salary <= 5000.0)
            .map(|p| p.id)
            .collect();
        println!("filtered set holds {} people", expected.len());
        assert!(expected.len() > 10, "fixture should keep the filter non-trivial");

        let page1 = manager.get_data(&filter, 1, 10, &provider).unwrap();
        let ids: Vec<u32> = page1.iter().map(|p| p.id).collect();
        assert_eq!(ids, expected[..10]);

        let page2 = manager.get_data(&filter, 2, 10, &provider).unwrap();
        let ids: Vec<u32> = page2.iter().map(|p| p.id).collect();
        assert_eq!(ids, expected[10..20.min(expected.len())]);
    }

    #[test]
    fn test_filter_matching_nobody() {
        let registry = person_registry();
        let source = Arc::new(MemorySource::new(sample_people(100)));
        let provider: Arc<dyn DataSource<Person>> = source.clone();
        let manager = DatasetManager::new();

        let filter = registry
            .filter()
            .contains("name", "zzz")
            .build()
            .unwrap();

        let result = manager.get_data(&filter, 1, 10, &provider).unwrap();
        assert!(result.is_empty());
        assert_eq!(manager.known_count(), 0);
    }

    #[test]
    fn test_conjunction_of_name_and_salary() {
        let registry = person_registry();
        let people = sample_people(100);
        let source = Arc::new(MemorySource::new(people.clone()));
        let provider: Arc<dyn DataSource<Person>> = source.clone();
        let manager = DatasetManager::new();

        let filter = registry
            .filter()
            .equals("name", json!("Alice"))
            .min("salary", json!(1000.0))
            .build()
            .unwrap();

        let result = manager.get_data(&filter, 1, 25, &provider).unwrap();
        assert!(!result.is_empty());
        for person in &result {
            assert_eq!(person.name, "Alice");
            assert!(person.salary >= 1000.0);
        }
    }
}

mod builder_errors {
    use super::*;

    #[test]
    fn test_unknown_field_fails_at_build_time() {
        let registry = person_registry();
        let err = registry
            .filter()
            .contains("name", "a")
            .equals("department", json!("sales"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownField(field) if field == "department"));
    }
}
