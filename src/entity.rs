use std::fmt::Debug;
use std::hash::Hash;

/// A cacheable record with a stable, totally ordered identifier.
///
/// The cache derives entity equality from the identifier and treats the
/// entity value itself as immutable once stored.
pub trait Identifiable: Clone + Send + Sync + 'static {
    type Id: Clone + Ord + Hash + Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}
