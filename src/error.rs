//! Error taxonomy shared by every layer.
//!
//! [`GraphError`] carries the failure detail; [`ErrorKind`] is the coarse
//! class callers branch on.

use thiserror::Error;

use crate::catalog::CoordinationError;
use crate::kv::StoreError;
use crate::model::RelationshipId;

/// Convenient alias for results returned by graphbase operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the storage engine, the catalog, and the service layer.
#[derive(Debug, Error)]
pub enum GraphError {
    /// No catalog entry for the graph id.
    #[error("graph '{0}' not found")]
    GraphNotFound(String),
    /// A catalog entry for the graph id is already present.
    #[error("graph '{0}' already exists")]
    GraphAlreadyExists(String),
    /// No live marker for the node id.
    #[error("node '{0}' not found")]
    NodeNotFound(String),
    /// The node id already has a live marker.
    #[error("node '{0}' already exists")]
    NodeAlreadyExists(String),
    /// No live marker for the relationship identity.
    #[error("relationship {0} not found")]
    RelationshipNotFound(RelationshipId),
    /// The relationship identity already has a live marker.
    #[error("relationship {0} already exists")]
    RelationshipAlreadyExists(RelationshipId),
    /// Malformed ids, bad regexes, or ordering comparisons across kinds.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A stored row or key could not be decoded.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// JSON encoding or decoding of a value or catalog entry failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The key-value store rejected a call.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The coordination service rejected a call.
    #[error("coordination error: {0}")]
    Coordination(#[from] CoordinationError),
    /// Operating system failure, such as spawning the catalog worker.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification callers use to map failures onto responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced graph, node, or relationship does not exist.
    NotFound,
    /// A create collided with an existing entity.
    AlreadyExists,
    /// The caller broke an API contract (bad id, bad regex, incomparable values).
    InvalidArgument,
    /// I/O, serialization, or coordination failure.
    Internal,
}

impl GraphError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::GraphNotFound(_)
            | GraphError::NodeNotFound(_)
            | GraphError::RelationshipNotFound(_) => ErrorKind::NotFound,
            GraphError::GraphAlreadyExists(_)
            | GraphError::NodeAlreadyExists(_)
            | GraphError::RelationshipAlreadyExists(_) => ErrorKind::AlreadyExists,
            GraphError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            GraphError::Corruption(_)
            | GraphError::Serialization(_)
            | GraphError::Store(_)
            | GraphError::Coordination(_)
            | GraphError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Returns true for any of the not-found variants.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns true for any of the already-exists variants.
    pub fn is_already_exists(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        GraphError::InvalidArgument(msg.into())
    }
}
