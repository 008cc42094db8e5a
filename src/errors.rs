//! Typed error hierarchy for taskorder.
//!
//! Two top-level enums cover the two subsystems:
//! - `OrderingError`: move planning and the reorder flow
//! - `BoardError`: board database and API failures
//!
//! Store implementations return `anyhow::Result`; the reorder flow wraps
//! those failures in `OrderingError::Store` or `OrderingError::Resync`.

use thiserror::Error;

/// Errors from planning or applying a move.
#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("Item {item_id} not found in collection")]
    ItemNotFound { item_id: String },

    #[error("Neighbour {item_id} not found in collection")]
    NeighbourNotFound { item_id: String },

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Failed to resync after {reason}: {source}")]
    Resync {
        reason: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors from the board database and HTTP API.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Item {id} not found")]
    ItemNotFound { id: i64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error(transparent)]
    Ordering(#[from] OrderingError),
}
