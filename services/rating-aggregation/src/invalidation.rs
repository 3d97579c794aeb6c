//! Invalidation Log — durable queue of known-stale workshop aggregates
//!
//! Watermark scanning only sees appends. Anything that alters the rating
//! log in place (soft-delete, amendment, backfill) must leave an
//! invalidation entry so the next cycle fully recomputes the affected
//! workshop.
//!
//! The log is fail-safe toward reprocessing, never toward skipping: an
//! entry is only removed inside the same transaction that commits the
//! recomputed aggregate, and an entry appended mid-cycle survives that
//! clear and is picked up on the next cycle.

use types::aggregate::{InvalidationReason, PendingInvalidations};
use types::errors::StorageError;
use types::ids::WorkshopId;

/// Durable set of workshop ids whose aggregate is known stale.
///
/// Clearing is deliberately absent here: processed entries are removed via
/// [`crate::store::AggregateStore::apply_cycle`], inside the cycle's
/// transaction.
pub trait InvalidationLog {
    /// Record that a workshop's aggregate can no longer be trusted.
    ///
    /// Appending the same workshop twice before a cycle runs is fine; the
    /// pending set is deduplicated.
    fn append(&self, workshop: WorkshopId, reason: InvalidationReason) -> Result<(), StorageError>;

    /// Snapshot of all pending entries, deduplicated.
    fn pending(&self) -> Result<PendingInvalidations, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::AggregateStore;
    use types::aggregate::AggregateDiff;

    #[test]
    fn test_pending_is_deduplicated() {
        let log = MemoryStore::new();
        let workshop = WorkshopId::new();
        log.append(workshop, InvalidationReason::RatingDeleted).unwrap();
        log.append(workshop, InvalidationReason::RatingAmended).unwrap();
        let pending = log.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending.contains(&workshop));
    }

    #[test]
    fn test_empty_log_has_no_pending() {
        let log = MemoryStore::new();
        assert!(log.pending().unwrap().is_empty());
    }

    #[test]
    fn test_clear_only_removes_the_processed_snapshot() {
        let store = MemoryStore::new();
        let processed = WorkshopId::new();
        let late_arrival = WorkshopId::new();

        store.append(processed, InvalidationReason::RatingDeleted).unwrap();
        let snapshot = store.pending().unwrap();

        // A second entry lands while the cycle is running.
        store.append(late_arrival, InvalidationReason::RatingDeleted).unwrap();

        store.apply_cycle(&AggregateDiff::default(), &snapshot).unwrap();

        let remaining = store.pending().unwrap();
        assert!(!remaining.contains(&processed));
        assert!(remaining.contains(&late_arrival), "mid-cycle append must survive");
    }
}
