//! Aggregation Computer — pure diff computation
//!
//! Turns (watermark, pending invalidations) into the exact set of aggregate
//! upserts and deletes for one cycle:
//!
//! 1. Fetch active ratings created after the watermark.
//! 2. Touched workshops = their distinct workshop ids ∪ pending entries.
//! 3. Touched providers = distinct owners of the touched workshops.
//! 4. Recompute every touched workshop from its **entire** current active
//!    rating set. Full recomputation is what makes interleaved creations
//!    and deletions within one window come out right, and what makes
//!    replaying a window idempotent.
//! 5. Recompute every touched provider over the union of active ratings
//!    across all workshops it owns. The mean is taken over individual
//!    ratings, so a workshop with many ratings weighs more than one with
//!    few.
//! 6. A touched entity whose recomputed count is zero goes to the deletion
//!    set; "no ratings" is absence, never a zero row.
//!
//! No state is mutated here; persistence belongs to the orchestrator.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use types::aggregate::{AggregateDiff, AverageRating, PendingInvalidations};
use types::errors::{AggregationError, IntegrityError};
use types::ids::{EntityRef, ProviderId, WorkshopId};
use types::rating::Score;

use crate::source::{RatingSource, WorkshopOwnership};

/// Pure computation over the read-only collaborators.
pub struct AggregationComputer<'a> {
    source: &'a dyn RatingSource,
    ownership: &'a dyn WorkshopOwnership,
    /// Abort the whole cycle on an orphaned workshop instead of skipping it.
    strict_integrity: bool,
}

impl<'a> AggregationComputer<'a> {
    pub fn new(source: &'a dyn RatingSource, ownership: &'a dyn WorkshopOwnership) -> Self {
        Self {
            source,
            ownership,
            strict_integrity: false,
        }
    }

    pub fn with_strict_integrity(mut self, strict: bool) -> Self {
        self.strict_integrity = strict;
        self
    }

    /// Compute the diff for one cycle window.
    pub fn compute(
        &self,
        watermark: DateTime<Utc>,
        pending: &PendingInvalidations,
    ) -> Result<AggregateDiff, AggregationError> {
        let new_ratings = self.source.active_ratings_created_after(watermark)?;

        let mut touched_workshops: BTreeSet<WorkshopId> =
            new_ratings.iter().map(|r| r.workshop_id).collect();
        touched_workshops.extend(pending.iter().copied());

        let mut diff = AggregateDiff::default();
        if touched_workshops.is_empty() {
            return Ok(diff);
        }

        debug!(
            new_ratings = new_ratings.len(),
            touched_workshops = touched_workshops.len(),
            "computing aggregate diff"
        );

        self.recompute_workshops(&touched_workshops, &mut diff)?;

        let touched_providers = self.resolve_providers(&touched_workshops, &mut diff)?;
        self.recompute_providers(&touched_providers, &mut diff)?;

        Ok(diff)
    }

    /// Full per-workshop recomputation over current active ratings.
    fn recompute_workshops(
        &self,
        workshops: &BTreeSet<WorkshopId>,
        diff: &mut AggregateDiff,
    ) -> Result<(), AggregationError> {
        let ratings = self.source.active_ratings_for_workshops(workshops)?;
        diff.stats.ratings_scanned += ratings.len() as u64;

        let mut scores: BTreeMap<WorkshopId, Vec<Score>> = BTreeMap::new();
        for rating in &ratings {
            scores.entry(rating.workshop_id).or_default().push(rating.score);
        }

        for workshop in workshops {
            let workshop_scores = scores.remove(workshop).unwrap_or_default();
            diff.record(
                EntityRef::Workshop(*workshop),
                AverageRating::from_scores(workshop_scores),
            );
        }
        diff.stats.workshops_touched = workshops.len() as u64;
        Ok(())
    }

    /// Map touched workshops to their owning providers.
    ///
    /// An orphaned workshop (no owner) is excluded from roll-up and counted,
    /// or aborts the cycle in strict mode. Its own workshop aggregate is
    /// still correct either way.
    fn resolve_providers(
        &self,
        workshops: &BTreeSet<WorkshopId>,
        diff: &mut AggregateDiff,
    ) -> Result<BTreeSet<ProviderId>, AggregationError> {
        let mut providers = BTreeSet::new();
        for workshop in workshops {
            match self.ownership.provider_id(*workshop)? {
                Some(provider) => {
                    providers.insert(provider);
                }
                None => {
                    if self.strict_integrity {
                        return Err(IntegrityError::OrphanedWorkshop {
                            workshop_id: workshop.to_string(),
                        }
                        .into());
                    }
                    diff.stats.integrity_skips += 1;
                    warn!(
                        workshop = %workshop,
                        "workshop has no owning provider; excluded from roll-up"
                    );
                }
            }
        }
        Ok(providers)
    }

    /// Roll up each provider over the union of its workshops' active
    /// ratings, weighted per rating.
    fn recompute_providers(
        &self,
        providers: &BTreeSet<ProviderId>,
        diff: &mut AggregateDiff,
    ) -> Result<(), AggregationError> {
        for provider in providers {
            let owned: BTreeSet<WorkshopId> = self
                .ownership
                .workshops_for_provider(*provider)?
                .into_iter()
                .collect();
            let ratings = self.source.active_ratings_for_workshops(&owned)?;
            diff.stats.ratings_scanned += ratings.len() as u64;
            diff.record(
                EntityRef::Provider(*provider),
                AverageRating::from_scores(ratings.iter().map(|r| r.score)),
            );
        }
        diff.stats.providers_touched = providers.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryOwnership, MemoryRatingSource};
    use crate::watermark::never_run;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use types::rating::Rating;
    use uuid::Uuid;

    fn insert_rating(source: &MemoryRatingSource, workshop: WorkshopId, score: u8) -> types::ids::RatingId {
        let rating = Rating::new(workshop, Uuid::now_v7(), Score::new(score), Utc::now());
        let id = rating.id;
        source.insert(rating);
        id
    }

    fn compute_all(
        source: &MemoryRatingSource,
        ownership: &MemoryOwnership,
    ) -> AggregateDiff {
        AggregationComputer::new(source, ownership)
            .compute(never_run(), &PendingInvalidations::new())
            .unwrap()
    }

    #[test]
    fn test_empty_window_yields_empty_diff() {
        let source = MemoryRatingSource::new();
        let ownership = MemoryOwnership::new();
        let diff = compute_all(&source, &ownership);
        assert!(diff.is_empty());
        assert_eq!(diff.stats.workshops_touched, 0);
    }

    #[test]
    fn test_workshop_mean_and_count() {
        let source = MemoryRatingSource::new();
        let ownership = MemoryOwnership::new();
        let provider = ProviderId::new();
        let workshop = WorkshopId::new();
        ownership.assign(workshop, provider);
        for score in [5, 4, 3] {
            insert_rating(&source, workshop, score);
        }

        let diff = compute_all(&source, &ownership);
        let avg = &diff.upserts[&EntityRef::Workshop(workshop)];
        assert_eq!(avg.rate, Decimal::from(4));
        assert_eq!(avg.rate_count, 3);
    }

    #[test]
    fn test_provider_rollup_is_rating_weighted() {
        let source = MemoryRatingSource::new();
        let ownership = MemoryOwnership::new();
        let provider = ProviderId::new();
        let w1 = WorkshopId::new();
        let w2 = WorkshopId::new();
        ownership.assign(w1, provider);
        ownership.assign(w2, provider);
        insert_rating(&source, w1, 5);
        insert_rating(&source, w1, 5);
        insert_rating(&source, w2, 1);

        let diff = compute_all(&source, &ownership);
        let avg = &diff.upserts[&EntityRef::Provider(provider)];
        // mean of the three raw ratings (3.67), not of the two workshop
        // averages (3.0)
        assert_eq!(avg.rate.round_dp(2), Decimal::new(367, 2));
        assert_eq!(avg.rate_count, 3);
    }

    #[test]
    fn test_rollup_includes_untouched_sibling_workshops() {
        let source = MemoryRatingSource::new();
        let ownership = MemoryOwnership::new();
        let provider = ProviderId::new();
        let old_workshop = WorkshopId::new();
        let new_workshop = WorkshopId::new();
        ownership.assign(old_workshop, provider);
        ownership.assign(new_workshop, provider);

        let cutoff = Utc::now();
        source.insert(Rating::new(old_workshop, Uuid::now_v7(), Score::new(1), cutoff));
        source.insert(Rating::new(
            new_workshop,
            Uuid::now_v7(),
            Score::new(5),
            cutoff + chrono::Duration::seconds(1),
        ));

        // Only the new workshop is inside the window, but the provider
        // roll-up must still see the old workshop's rating.
        let diff = AggregationComputer::new(&source, &ownership)
            .compute(cutoff, &PendingInvalidations::new())
            .unwrap();

        assert!(!diff.upserts.contains_key(&EntityRef::Workshop(old_workshop)));
        let avg = &diff.upserts[&EntityRef::Provider(provider)];
        assert_eq!(avg.rate, Decimal::from(3));
        assert_eq!(avg.rate_count, 2);
    }

    #[test]
    fn test_zero_count_routes_to_deletes() {
        let source = MemoryRatingSource::new();
        let ownership = MemoryOwnership::new();
        let provider = ProviderId::new();
        let workshop = WorkshopId::new();
        ownership.assign(workshop, provider);
        let rating_id = insert_rating(&source, workshop, 4);
        source.soft_delete(rating_id);

        let mut pending = PendingInvalidations::new();
        pending.insert(workshop);

        let diff = AggregationComputer::new(&source, &ownership)
            .compute(Utc::now(), &pending)
            .unwrap();

        assert!(diff.deletes.contains(&EntityRef::Workshop(workshop)));
        assert!(diff.deletes.contains(&EntityRef::Provider(provider)));
        assert!(diff.upserts.is_empty());
    }

    #[test]
    fn test_orphaned_workshop_is_skipped_by_default() {
        let source = MemoryRatingSource::new();
        let ownership = MemoryOwnership::new();
        let orphan = WorkshopId::new();
        insert_rating(&source, orphan, 2);

        let diff = compute_all(&source, &ownership);
        // Workshop aggregate still produced; only the roll-up is skipped.
        assert!(diff.upserts.contains_key(&EntityRef::Workshop(orphan)));
        assert_eq!(diff.stats.integrity_skips, 1);
        assert_eq!(diff.stats.providers_touched, 0);
    }

    #[test]
    fn test_orphaned_workshop_aborts_in_strict_mode() {
        let source = MemoryRatingSource::new();
        let ownership = MemoryOwnership::new();
        insert_rating(&source, WorkshopId::new(), 2);

        let result = AggregationComputer::new(&source, &ownership)
            .with_strict_integrity(true)
            .compute(never_run(), &PendingInvalidations::new());
        assert!(matches!(result, Err(AggregationError::Integrity(_))));
    }

    proptest! {
        /// mean * count == sum of scores, for any active rating set.
        #[test]
        fn prop_mean_times_count_equals_sum(scores in prop::collection::vec(1u8..=5, 1..50)) {
            let source = MemoryRatingSource::new();
            let ownership = MemoryOwnership::new();
            let provider = ProviderId::new();
            let workshop = WorkshopId::new();
            ownership.assign(workshop, provider);
            let mut sum = 0u64;
            for score in &scores {
                insert_rating(&source, workshop, *score);
                sum += u64::from(*score);
            }

            let diff = compute_all(&source, &ownership);
            let avg = &diff.upserts[&EntityRef::Workshop(workshop)];
            prop_assert_eq!(avg.rate_count as usize, scores.len());
            // Decimal division carries 28 significant digits; round away the
            // trailing residue before comparing (10/3 * 3 = 9.99..9).
            let reconstructed = (avg.rate * Decimal::from(avg.rate_count)).round_dp(10);
            prop_assert_eq!(reconstructed, Decimal::from(sum));
        }

        /// Provider count equals the sum of its workshops' counts.
        #[test]
        fn prop_rollup_count_is_additive(
            counts in prop::collection::vec(0usize..6, 1..5)
        ) {
            let source = MemoryRatingSource::new();
            let ownership = MemoryOwnership::new();
            let provider = ProviderId::new();
            let mut total = 0usize;
            for n in &counts {
                let workshop = WorkshopId::new();
                ownership.assign(workshop, provider);
                for _ in 0..*n {
                    insert_rating(&source, workshop, 3);
                }
                total += n;
            }

            let diff = compute_all(&source, &ownership);
            match diff.upserts.get(&EntityRef::Provider(provider)) {
                Some(avg) => prop_assert_eq!(avg.rate_count as usize, total),
                None => prop_assert_eq!(total, 0),
            }
        }
    }
}
