//! Watermark Store — last-successfully-processed cutoff per job
//!
//! The watermark is the timestamp up to which all rating input has been
//! durably folded into the aggregate table. It advances only after a full
//! cycle commits; re-running against a stale watermark is safe because the
//! computer always recomputes a touched entity from its entire current
//! active-rating set, never by delta accumulation.

use chrono::{DateTime, Utc};
use types::errors::StorageError;

/// Sentinel watermark for a job that has never completed a cycle.
///
/// Every rating's `created_at` is strictly greater than this, so the first
/// cycle scans the full history.
pub fn never_run() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

/// Persistent last-success timestamp per job name.
pub trait WatermarkStore {
    /// Last successfully processed cutoff, or [`never_run`] if the job has
    /// no recorded success.
    fn last_success(&self, job: &str) -> Result<DateTime<Utc>, StorageError>;

    /// Idempotent upsert of the job's cutoff.
    ///
    /// Must be called strictly after all derived state for the cycle is
    /// durably committed; a crash before this call costs one harmless
    /// re-run of an already-correct window.
    fn advance_to(&self, job: &str, at: DateTime<Utc>) -> Result<(), StorageError>;
}
