//! Aggregate Store — persisted (mean, count) rows per entity
//!
//! The store is the engine's only externally visible output. Readers use
//! plain point lookups; a missing row is the valid "no ratings yet" state,
//! never an error.
//!
//! All cycle mutations (upserts, deletes, and the clearing of processed
//! invalidation entries) go through a single atomic `apply_cycle` call.
//! Either everything in the diff lands or nothing does, so readers observe
//! the pre-cycle or the post-cycle table, never a partial one.

use std::collections::BTreeMap;

use types::aggregate::{AggregateDiff, AverageRating, PendingInvalidations};
use types::errors::StorageError;
use types::ids::EntityRef;

/// Persisted key → (mean, count) table with transactional cycle commit.
pub trait AggregateStore {
    /// Point read; `None` means the entity has no active ratings.
    fn get(&self, entity: EntityRef) -> Result<Option<AverageRating>, StorageError>;

    /// Batch read; entities without a row are absent from the result map.
    fn get_many(
        &self,
        entities: &[EntityRef],
    ) -> Result<BTreeMap<EntityRef, AverageRating>, StorageError>;

    /// Apply one cycle's mutations all-or-nothing.
    ///
    /// Upserts and deletes from the diff and removal of the `clear`ed
    /// invalidation entries must commit in one transaction. On error the
    /// store, including the invalidation log, is left exactly as it was,
    /// and the caller must not advance the watermark.
    fn apply_cycle(
        &self,
        diff: &AggregateDiff,
        clear: &PendingInvalidations,
    ) -> Result<(), StorageError>;
}
