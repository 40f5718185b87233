//! Composite entity filters with stable fingerprints.
//!
//! A filter is a conjunction of field bindings. Each binding names a field,
//! carries a `FieldFilter` variant and a resolver that extracts the field
//! value from an entity as a `serde_json::Value`. The fingerprint of a
//! filter is a canonical string key: binding fingerprints sorted
//! lexicographically and joined with `|`, so two filters with the same
//! bindings in any order share one cache entry.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Extracts one field of an entity. `None` means the field is absent,
/// which the filters treat the same as an explicit JSON null.
pub type Resolver<T> = Arc<dyn Fn(&T) -> Option<Value> + Send + Sync>;

/// Single-value predicate applied to a resolved field.
#[derive(Clone, Debug)]
pub enum FieldFilter {
    /// Object equality of stored and observed value.
    Equals(Value),
    /// Observed string contains the stored substring.
    Contains(String),
    /// Stored value is a lower bound: stored <= observed.
    Min(Value),
    /// Stored value is an upper bound: stored >= observed.
    Max(Value),
}

/// Comparison failure between a filter value and an observed value.
pub(crate) struct Mismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Total order over comparable value pairs. Numbers compare as f64,
/// strings lexicographically. Mixed kinds are incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Some(x.as_f64()?.total_cmp(&y.as_f64()?)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Canonical value rendering for fingerprints: strings bare, everything
/// else in JSON text form.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FieldFilter {
    pub fn key(&self) -> &'static str {
        match self {
            FieldFilter::Equals(_) => "equals",
            FieldFilter::Contains(_) => "contains",
            FieldFilter::Min(_) => "min",
            FieldFilter::Max(_) => "max",
        }
    }

    pub fn value_repr(&self) -> String {
        match self {
            FieldFilter::Equals(v) | FieldFilter::Min(v) | FieldFilter::Max(v) => render_value(v),
            FieldFilter::Contains(s) => s.clone(),
        }
    }

    /// Truth of this filter against an observed value. An absent field and
    /// an explicit null are equivalent. Incomparable kinds are a mismatch.
    pub(crate) fn evaluate(&self, observed: Option<&Value>) -> std::result::Result<bool, Mismatch> {
        let observed = match observed {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        };
        match self {
            FieldFilter::Equals(expected) => Ok(match observed {
                Some(v) => v == expected,
                None => expected.is_null(),
            }),
            FieldFilter::Contains(sub) => match observed {
                None => Ok(false),
                Some(Value::String(s)) => Ok(s.contains(sub.as_str())),
                Some(other) => Err(Mismatch {
                    expected: "string",
                    found: kind(other),
                }),
            },
            FieldFilter::Min(stored) => match observed {
                None => Ok(false),
                Some(v) => compare_values(stored, v)
                    .map(|ord| ord.is_le())
                    .ok_or(Mismatch {
                        expected: kind(stored),
                        found: kind(v),
                    }),
            },
            FieldFilter::Max(stored) => match observed {
                None => Ok(false),
                Some(v) => compare_values(stored, v)
                    .map(|ord| ord.is_ge())
                    .ok_or(Mismatch {
                        expected: kind(stored),
                        found: kind(v),
                    }),
            },
        }
    }
}

/// One field of a composite filter: name, predicate and resolver.
#[derive(Clone)]
pub struct FieldBinding<T> {
    field: String,
    filter: FieldFilter,
    resolver: Resolver<T>,
}

impl<T> std::fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("field", &self.field)
            .field("filter", &self.filter)
            .finish()
    }
}

impl<T> FieldBinding<T> {
    pub fn new(field: impl Into<String>, filter: FieldFilter, resolver: Resolver<T>) -> Self {
        Self {
            field: field.into(),
            filter,
            resolver,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn filter(&self) -> &FieldFilter {
        &self.filter
    }

    pub fn matches(&self, entity: &T) -> Result<bool> {
        let observed = (self.resolver)(entity);
        self.filter
            .evaluate(observed.as_ref())
            .map_err(|mismatch| Error::TypeMismatch {
                field: self.field.clone(),
                expected: mismatch.expected,
                found: mismatch.found,
            })
    }

    pub fn fingerprint(&self) -> String {
        format!(
            "{}:{}:{}",
            self.field,
            self.filter.key(),
            self.filter.value_repr()
        )
    }
}

/// Conjunction of field bindings over one entity type.
#[derive(Clone)]
pub struct DatasetFilter<T> {
    bindings: SmallVec<[FieldBinding<T>; 4]>,
}

impl<T> std::fmt::Debug for DatasetFilter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetFilter")
            .field("bindings", &self.bindings.as_slice())
            .finish()
    }
}

impl<T> DatasetFilter<T> {
    pub fn new(bindings: impl IntoIterator<Item = FieldBinding<T>>) -> Self {
        Self {
            bindings: bindings.into_iter().collect(),
        }
    }

    /// The empty composite: matches everything, fingerprint is "".
    pub fn empty() -> Self {
        Self {
            bindings: SmallVec::new(),
        }
    }

    pub fn bindings(&self) -> &[FieldBinding<T>] {
        &self.bindings
    }

    /// Short-circuit conjunction across all bindings.
    pub fn matches(&self, entity: &T) -> Result<bool> {
        for binding in &self.bindings {
            if !binding.matches(entity)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Canonical cache key for the result set this filter selects.
    /// Pure function of the binding set, stable across runs and across
    /// permutations of the binding list.
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = self.bindings.iter().map(FieldBinding::fingerprint).collect();
        parts.sort_unstable();
        parts.join("|")
    }
}
