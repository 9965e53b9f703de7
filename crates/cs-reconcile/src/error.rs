// error.rs: Error types for the reconciliation pass.

use cs_store::{RecordError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Listing communities or querying goals failed.
    #[error("store query failed ({what}): {source}")]
    StoreQuery {
        what: String,
        #[source]
        source: StoreError,
    },

    /// The atomic batch for a community could not be committed.
    #[error("store write failed for community {community_id}: {source}")]
    StoreWrite {
        community_id: String,
        #[source]
        source: StoreError,
    },

    /// A stored document broke the record invariants.
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    /// Another run holds a live lease.
    #[error("reconciliation lease '{key}' is held by another run")]
    LeaseHeld { key: String },

    /// Reading or writing the lease record failed.
    #[error("lease '{key}' error: {source}")]
    Lease {
        key: String,
        #[source]
        source: StoreError,
    },

    /// A community moved through its states out of order.
    #[error("invalid transition from {from} to {to} for community {community_id}")]
    InvalidTransition {
        community_id: String,
        from: String,
        to: String,
    },

    /// A community task panicked before reaching a terminal state.
    #[error("task for community {community_id} panicked: {message}")]
    TaskPanicked {
        community_id: String,
        message: String,
    },
}
