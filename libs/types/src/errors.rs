//! Error types for the aggregation engine
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Top-level aggregation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Another cycle of job '{job}' is already running")]
    CycleInProgress { job: String },

    #[error("Data integrity error: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Transient storage failures
///
/// Any of these aborts the whole cycle; nothing is partially committed and
/// the scheduler retries on its next trigger.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Transaction aborted: {message}")]
    TransactionAborted { message: String },

    #[error("Stored data corrupted: {message}")]
    Corrupted { message: String },
}

/// Bad-data conditions isolated per entity
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    #[error("Workshop {workshop_id} has no owning provider")]
    OrphanedWorkshop { workshop_id: String },
}
