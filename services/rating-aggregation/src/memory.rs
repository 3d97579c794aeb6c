//! In-memory reference backend
//!
//! A single mutex-guarded state implements the watermark store, the
//! invalidation log, and the aggregate store, which is what makes
//! `apply_cycle` genuinely atomic: one lock, one all-or-nothing mutation.
//!
//! `MemoryRatingSource` and `MemoryOwnership` are mutable fixtures for the
//! read-only collaborator seams. The whole module doubles as the reference
//! semantics for any durable backend and as the substrate for the engine's
//! own tests, including commit-failure injection via `fail_next_commit`.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use types::aggregate::{
    AggregateDiff, AverageRating, InvalidationReason, PendingInvalidations,
};
use types::errors::StorageError;
use types::ids::{EntityRef, ProviderId, WorkshopId};
use types::rating::Rating;

use crate::invalidation::InvalidationLog;
use crate::source::{RatingSource, WorkshopOwnership};
use crate::store::AggregateStore;
use crate::watermark::{never_run, WatermarkStore};

// ── Engine-owned state ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryState {
    aggregates: BTreeMap<EntityRef, AverageRating>,
    /// First-come reason kept per workshop; the pending set is the key set.
    invalidations: BTreeMap<WorkshopId, InvalidationReason>,
    watermarks: BTreeMap<String, DateTime<Utc>>,
}

/// In-memory watermark store + invalidation log + aggregate store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `apply_cycle` fail without mutating anything.
    /// Models a transaction rollback for crash-safety tests.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Corrupted {
            message: "memory store lock poisoned".to_string(),
        })
    }
}

impl WatermarkStore for MemoryStore {
    fn last_success(&self, job: &str) -> Result<DateTime<Utc>, StorageError> {
        let state = self.lock()?;
        Ok(state.watermarks.get(job).copied().unwrap_or_else(never_run))
    }

    fn advance_to(&self, job: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.watermarks.insert(job.to_string(), at);
        Ok(())
    }
}

impl InvalidationLog for MemoryStore {
    fn append(&self, workshop: WorkshopId, reason: InvalidationReason) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.invalidations.entry(workshop).or_insert(reason);
        Ok(())
    }

    fn pending(&self) -> Result<PendingInvalidations, StorageError> {
        let state = self.lock()?;
        Ok(state.invalidations.keys().copied().collect())
    }
}

impl AggregateStore for MemoryStore {
    fn get(&self, entity: EntityRef) -> Result<Option<AverageRating>, StorageError> {
        let state = self.lock()?;
        Ok(state.aggregates.get(&entity).cloned())
    }

    fn get_many(
        &self,
        entities: &[EntityRef],
    ) -> Result<BTreeMap<EntityRef, AverageRating>, StorageError> {
        let state = self.lock()?;
        Ok(entities
            .iter()
            .filter_map(|e| state.aggregates.get(e).map(|avg| (*e, avg.clone())))
            .collect())
    }

    fn apply_cycle(
        &self,
        diff: &AggregateDiff,
        clear: &PendingInvalidations,
    ) -> Result<(), StorageError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::TransactionAborted {
                message: "injected commit failure".to_string(),
            });
        }

        // Single lock scope = the transaction: all mutations land together.
        let mut state = self.lock()?;
        for (entity, avg) in &diff.upserts {
            state.aggregates.insert(*entity, avg.clone());
        }
        for entity in &diff.deletes {
            state.aggregates.remove(entity);
        }
        for workshop in clear {
            state.invalidations.remove(workshop);
        }
        Ok(())
    }
}

// ── Collaborator fixtures ───────────────────────────────────────────

/// Mutable in-memory rating log.
#[derive(Debug, Default)]
pub struct MemoryRatingSource {
    ratings: Mutex<Vec<Rating>>,
}

impl MemoryRatingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, rating: Rating) {
        self.ratings
            .lock()
            .expect("rating fixture lock poisoned")
            .push(rating);
    }

    /// Flip the rating's active flag off. Returns false if unknown.
    ///
    /// The caller is responsible for appending the matching invalidation
    /// entry, exactly like the external rating API would.
    pub fn soft_delete(&self, id: types::ids::RatingId) -> bool {
        let mut ratings = self.ratings.lock().expect("rating fixture lock poisoned");
        match ratings.iter_mut().find(|r| r.id == id) {
            Some(rating) => {
                rating.active = false;
                true
            }
            None => false,
        }
    }

    fn read(&self) -> Result<Vec<Rating>, StorageError> {
        self.ratings
            .lock()
            .map(|r| r.clone())
            .map_err(|_| StorageError::Corrupted {
                message: "rating fixture lock poisoned".to_string(),
            })
    }
}

impl RatingSource for MemoryRatingSource {
    fn active_ratings_created_after(
        &self,
        watermark: DateTime<Utc>,
    ) -> Result<Vec<Rating>, StorageError> {
        Ok(self
            .read()?
            .into_iter()
            .filter(|r| r.active && r.created_at > watermark)
            .collect())
    }

    fn has_new_since(&self, watermark: DateTime<Utc>) -> Result<bool, StorageError> {
        Ok(self
            .read()?
            .iter()
            .any(|r| r.active && r.created_at > watermark))
    }

    fn active_ratings_for_workshops(
        &self,
        workshops: &BTreeSet<WorkshopId>,
    ) -> Result<Vec<Rating>, StorageError> {
        Ok(self
            .read()?
            .into_iter()
            .filter(|r| r.active && workshops.contains(&r.workshop_id))
            .collect())
    }
}

/// Mutable in-memory workshop → provider mapping.
#[derive(Debug, Default)]
pub struct MemoryOwnership {
    owners: Mutex<BTreeMap<WorkshopId, ProviderId>>,
}

impl MemoryOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, workshop: WorkshopId, provider: ProviderId) {
        self.owners
            .lock()
            .expect("ownership fixture lock poisoned")
            .insert(workshop, provider);
    }

    fn read(&self) -> Result<BTreeMap<WorkshopId, ProviderId>, StorageError> {
        self.owners
            .lock()
            .map(|o| o.clone())
            .map_err(|_| StorageError::Corrupted {
                message: "ownership fixture lock poisoned".to_string(),
            })
    }
}

impl WorkshopOwnership for MemoryOwnership {
    fn provider_id(&self, workshop: WorkshopId) -> Result<Option<ProviderId>, StorageError> {
        Ok(self.read()?.get(&workshop).copied())
    }

    fn workshops_for_provider(
        &self,
        provider: ProviderId,
    ) -> Result<Vec<WorkshopId>, StorageError> {
        Ok(self
            .read()?
            .iter()
            .filter(|(_, p)| **p == provider)
            .map(|(w, _)| *w)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_next_commit_is_one_shot() {
        let store = MemoryStore::new();
        store.fail_next_commit();
        assert!(store
            .apply_cycle(&AggregateDiff::default(), &PendingInvalidations::new())
            .is_err());
        assert!(store
            .apply_cycle(&AggregateDiff::default(), &PendingInvalidations::new())
            .is_ok());
    }

    #[test]
    fn test_invalidation_keeps_first_reason() {
        let store = MemoryStore::new();
        let workshop = WorkshopId::new();
        store.append(workshop, InvalidationReason::RatingDeleted).unwrap();
        store.append(workshop, InvalidationReason::Backfill).unwrap();
        let state = store.state.lock().unwrap();
        assert_eq!(
            state.invalidations[&workshop],
            InvalidationReason::RatingDeleted
        );
    }

    #[test]
    fn test_soft_delete_unknown_rating_is_false() {
        let source = MemoryRatingSource::new();
        assert!(!source.soft_delete(types::ids::RatingId::new()));
    }
}
