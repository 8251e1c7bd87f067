#![forbid(unsafe_code)]

//! Storage-agnostic query primitives: property values, filter trees, sort
//! chains, and projections. The storage engine composes these into its scan
//! pipeline; none of them touch the network.

/// Client-side filter trees and their evaluator.
pub mod filter;

/// Property projection policy.
pub mod projection;

/// Bulk read requests.
pub mod request;

/// Multi-key entity ordering.
pub mod sort;

/// Property values and the value comparator.
pub mod value;

pub use filter::{FilterExecutor, FilterPredicate};
pub use projection::PropertyProjection;
pub use request::EntityQuery;
pub use sort::{SortComparator, SortDirection, SortPredicate};
pub use value::{properties, Properties, Value};
