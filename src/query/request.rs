//! Bulk read request shared by node and relationship scans.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::filter::FilterPredicate;
use super::projection::PropertyProjection;
use super::sort::{sort_keys, SortPredicate};

/// Parameters of `get_nodes` / `get_relationships`.
///
/// An empty `types` set means every type. An empty `sorts` chain leaves the
/// result in row-key order and streams it lazily.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityQuery {
    /// Type allow-list.
    pub types: BTreeSet<String>,
    /// Client-side filter tree.
    pub filter: Option<FilterPredicate>,
    /// Sort chain.
    pub sorts: Vec<SortPredicate>,
    /// Properties returned per entity.
    pub projection: PropertyProjection,
}

impl EntityQuery {
    /// Query returning every entity with every property.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the result to `types`.
    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the filter tree.
    pub fn filter(mut self, filter: FilterPredicate) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Appends a tie-break to the sort chain.
    pub fn sort(mut self, sort: SortPredicate) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Sets the projection.
    pub fn projection(mut self, projection: PropertyProjection) -> Self {
        self.projection = projection;
        self
    }

    /// Projection actually read from the store: the requested one widened
    /// with every key the filter and sort chain reference.
    pub fn effective_projection(&self) -> PropertyProjection {
        let mut extra = self
            .filter
            .as_ref()
            .map(FilterPredicate::property_keys)
            .unwrap_or_default();
        extra.extend(sort_keys(&self.sorts));
        if extra.is_empty() {
            return self.projection.clone();
        }
        self.projection.merge(&extra)
    }
}
