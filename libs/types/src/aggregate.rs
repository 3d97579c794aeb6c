//! Materialized average-rating values
//!
//! `AverageRating` is the engine's externally visible output: a
//! denormalized (mean, count) pair per rated entity. A stored row exists
//! iff at least one active rating contributes to it; "no ratings" is
//! expressed by absence, never by a zero row.
//!
//! All arithmetic uses `Decimal`: no floating-point drift, identical
//! results on replay.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{EntityRef, WorkshopId};
use crate::rating::Score;

/// Denormalized average rating for one entity (workshop or provider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageRating {
    /// Mean score over all contributing active ratings
    pub rate: Decimal,
    /// Number of contributing active ratings; always > 0 for a stored row
    pub rate_count: u32,
}

impl AverageRating {
    /// Compute the mean over a set of scores.
    ///
    /// Returns `None` for an empty set; the caller routes that entity to
    /// the deletion set rather than storing a zero aggregate.
    pub fn from_scores<I>(scores: I) -> Option<Self>
    where
        I: IntoIterator<Item = Score>,
    {
        let mut sum = Decimal::ZERO;
        let mut count: u32 = 0;
        for score in scores {
            sum += score.as_decimal();
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            rate: sum / Decimal::from(count),
            rate_count: count,
        })
    }
}

/// Why a workshop's aggregate was explicitly invalidated.
///
/// Anything that alters the rating log outside simple append must leave an
/// invalidation entry, since watermark scanning alone cannot see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// A rating was soft-deleted
    RatingDeleted,
    /// A rating's score was amended in place
    RatingAmended,
    /// Historical data was backfilled behind the watermark
    Backfill,
}

/// Per-cycle computation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputeStats {
    /// Active ratings fetched for recomputation
    pub ratings_scanned: u64,
    /// Distinct workshops recomputed
    pub workshops_touched: u64,
    /// Distinct providers rolled up
    pub providers_touched: u64,
    /// Workshops excluded because no owning provider was found
    pub integrity_skips: u64,
}

/// Output of one aggregation cycle: the exact set of mutations to apply.
///
/// Uses `BTreeMap`/`BTreeSet` for deterministic iteration order, so two
/// runs over the same window produce byte-identical persistence traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateDiff {
    /// Rows to update-or-insert
    pub upserts: BTreeMap<EntityRef, AverageRating>,
    /// Rows to remove (recomputed count reached zero)
    pub deletes: BTreeSet<EntityRef>,
    pub stats: ComputeStats,
}

impl AggregateDiff {
    /// True when the cycle found nothing to change.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Route a recomputed entity: `Some` aggregate goes to upserts, `None`
    /// (zero active ratings) goes to deletes.
    pub fn record(&mut self, entity: EntityRef, aggregate: Option<AverageRating>) {
        match aggregate {
            Some(avg) => {
                self.upserts.insert(entity, avg);
            }
            None => {
                self.deletes.insert(entity);
            }
        }
    }
}

/// Snapshot of pending invalidation entries taken at cycle start.
pub type PendingInvalidations = BTreeSet<WorkshopId>;
