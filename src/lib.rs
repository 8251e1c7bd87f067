//! Property-graph storage over a column-family key-value store, with a
//! watch-synchronized catalog of graphs held in a coordination service.
//!
//! [`GraphService`] is the entry point: it resolves graph ids through
//! [`catalog::GraphCatalog`] and delegates entity reads and writes to
//! [`storage::GraphStorage`]. The store and the coordination service are
//! traits ([`kv::KvStore`], [`catalog::Coordinator`]) with in-process
//! backends.

#![warn(missing_docs)]

/// Watch-driven graph catalog and the coordination contract.
pub mod catalog;
/// File-based configuration.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Column-family key-value store contract and in-memory backend.
pub mod kv;
/// Graph entities and request payloads.
pub mod model;
/// Byte-level helpers for the row-key codec.
pub mod primitives;
/// Filters, sorts, projections, and property values.
pub mod query;
/// Graph service orchestration.
pub mod service;
/// Graph storage engine.
pub mod storage;

pub use config::GraphbaseConfig;
pub use error::{ErrorKind, GraphError, Result};
pub use model::{GraphConfiguration, Mutation, Node, Relationship, RelationshipId};
pub use service::GraphService;
