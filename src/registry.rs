//! Field resolver registry and the filter builder on top of it.
//!
//! The registry maps field names to resolvers for one entity type. It is
//! explicit (passed to the builder) rather than process-global; the entity
//! type parameter plays the role a type key would in a global table.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::filter::{DatasetFilter, FieldBinding, FieldFilter, Resolver};

/// Per-entity-type table of field resolvers.
pub struct FieldRegistry<T> {
    resolvers: DashMap<String, Resolver<T>>,
}

impl<T> FieldRegistry<T> {
    pub fn new() -> Self {
        Self {
            resolvers: DashMap::new(),
        }
    }

    /// Register a resolver for a field. Re-registering a field logs a
    /// warning and replaces the previous entry.
    pub fn register<F>(&self, field: &str, resolver: F)
    where
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        if self.resolvers.contains_key(field) {
            tracing::warn!(field, "field resolver re-registered, replacing previous entry");
        }
        self.resolvers.insert(field.to_string(), Arc::new(resolver));
    }

    pub fn resolver(&self, field: &str) -> Option<Resolver<T>> {
        self.resolvers.get(field).map(|entry| Arc::clone(entry.value()))
    }

    /// Start building a filter against this registry.
    pub fn filter(&self) -> FilterBuilder<'_, T> {
        FilterBuilder {
            registry: self,
            bindings: SmallVec::new(),
            unknown: None,
        }
    }
}

impl<T> Default for FieldRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Chainable filter builder. Referencing an unregistered field is
/// remembered and surfaced as an error when `build` is called.
pub struct FilterBuilder<'a, T> {
    registry: &'a FieldRegistry<T>,
    bindings: SmallVec<[FieldBinding<T>; 4]>,
    unknown: Option<String>,
}

impl<'a, T> FilterBuilder<'a, T> {
    pub fn with(mut self, field: &str, filter: FieldFilter) -> Self {
        match self.registry.resolver(field) {
            Some(resolver) => self.bindings.push(FieldBinding::new(field, filter, resolver)),
            None => {
                if self.unknown.is_none() {
                    self.unknown = Some(field.to_string());
                }
            }
        }
        self
    }

    pub fn equals(self, field: &str, value: Value) -> Self {
        self.with(field, FieldFilter::Equals(value))
    }

    pub fn contains(self, field: &str, substring: &str) -> Self {
        self.with(field, FieldFilter::Contains(substring.to_string()))
    }

    /// Lower bound: field value must be at least `value`.
    pub fn min(self, field: &str, value: Value) -> Self {
        self.with(field, FieldFilter::Min(value))
    }

    /// Upper bound: field value must be at most `value`.
    pub fn max(self, field: &str, value: Value) -> Self {
        self.with(field, FieldFilter::Max(value))
    }

    pub fn build(self) -> Result<DatasetFilter<T>> {
        if let Some(field) = self.unknown {
            return Err(Error::UnknownField(field));
        }
        Ok(DatasetFilter::new(self.bindings))
    }
}
