//! Cycle orchestration
//!
//! `AverageRatingJob` owns the transaction boundary and the watermark:
//!
//! ```text
//! watermark = watermarks.last_success(job)
//! pending   = invalidations.pending()
//! if pending.is_empty() && !source.has_new_since(watermark):
//!     return NoOp                     // watermark untouched
//! diff = computer.compute(watermark, pending)
//! aggregates.apply_cycle(diff, pending)   // one transaction
//! watermarks.advance_to(job, cycle_started_at)
//! ```
//!
//! Any failure before or inside `apply_cycle` leaves aggregates,
//! invalidation log, and watermark all untouched; the next trigger
//! reprocesses the identical window and, because recomputation is total,
//! converges to the same result. A failure after the commit but before the
//! watermark advance costs one harmless re-run of an already-correct
//! window, never data loss or double counting.
//!
//! Cycles are not re-entrant. An explicit single-flight guard suppresses
//! overlapping triggers instead of trusting the scheduler's configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use types::aggregate::AverageRating;
use types::errors::{AggregationError, StorageError};
use types::ids::EntityRef;

use crate::compute::AggregationComputer;
use crate::config::JobConfig;
use crate::invalidation::InvalidationLog;
use crate::source::{RatingSource, WorkshopOwnership};
use crate::store::AggregateStore;
use crate::watermark::WatermarkStore;
use std::collections::BTreeMap;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStatus {
    /// Diff computed and committed, watermark advanced
    Completed,
    /// Nothing new and nothing pending; watermark untouched
    NoOp,
    /// Another cycle was already running; no work attempted
    Skipped,
}

/// Outcome of one `execute` call; serializable for ops reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub status: CycleStatus,
    /// Rows written
    pub upserts: u64,
    /// Rows removed (count reached zero)
    pub deletes: u64,
    /// Invalidation entries cleared
    pub cleared: u64,
    /// Active ratings fetched for recomputation
    pub ratings_scanned: u64,
    /// Orphaned workshops excluded from roll-up
    pub integrity_skips: u64,
    /// Watermark in effect after this call
    pub watermark: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Lifetime job counters, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub cycles_completed: u64,
    pub cycles_noop: u64,
    pub cycles_skipped: u64,
    pub cycles_failed: u64,
}

/// Periodic average-rating aggregation job.
pub struct AverageRatingJob {
    config: JobConfig,
    source: Arc<dyn RatingSource + Send + Sync>,
    ownership: Arc<dyn WorkshopOwnership + Send + Sync>,
    watermarks: Arc<dyn WatermarkStore + Send + Sync>,
    invalidations: Arc<dyn InvalidationLog + Send + Sync>,
    aggregates: Arc<dyn AggregateStore + Send + Sync>,
    running: AtomicBool,
    cycles_completed: AtomicU64,
    cycles_noop: AtomicU64,
    cycles_skipped: AtomicU64,
    cycles_failed: AtomicU64,
}

impl AverageRatingJob {
    pub fn new(
        config: JobConfig,
        source: Arc<dyn RatingSource + Send + Sync>,
        ownership: Arc<dyn WorkshopOwnership + Send + Sync>,
        watermarks: Arc<dyn WatermarkStore + Send + Sync>,
        invalidations: Arc<dyn InvalidationLog + Send + Sync>,
        aggregates: Arc<dyn AggregateStore + Send + Sync>,
    ) -> Self {
        info!(job = %config.job_name, "AverageRatingJob initialized");
        Self {
            config,
            source,
            ownership,
            watermarks,
            invalidations,
            aggregates,
            running: AtomicBool::new(false),
            cycles_completed: AtomicU64::new(0),
            cycles_noop: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
        }
    }

    /// Run one aggregation cycle.
    ///
    /// A concurrent call returns `CycleStatus::Skipped` with a warning and
    /// attempts no partial work. A returned error means nothing was
    /// committed, except for the documented case of a failed watermark
    /// advance after a successful commit, which the next run absorbs.
    pub fn execute(&self) -> Result<CycleReport, AggregationError> {
        let _guard = match CycleGuard::acquire(&self.running, &self.config.job_name) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(job = %self.config.job_name, %err, "overlapping trigger suppressed");
                self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
                let watermark = self.watermarks.last_success(&self.config.job_name)?;
                return Ok(CycleReport {
                    status: CycleStatus::Skipped,
                    upserts: 0,
                    deletes: 0,
                    cleared: 0,
                    ratings_scanned: 0,
                    integrity_skips: 0,
                    watermark,
                    duration_ms: 0,
                });
            }
        };

        match self.run_cycle() {
            Ok(report) => {
                match report.status {
                    CycleStatus::Completed => {
                        self.cycles_completed.fetch_add(1, Ordering::Relaxed)
                    }
                    _ => self.cycles_noop.fetch_add(1, Ordering::Relaxed),
                };
                Ok(report)
            }
            Err(err) => {
                self.cycles_failed.fetch_add(1, Ordering::Relaxed);
                error!(job = %self.config.job_name, %err, "aggregation cycle failed");
                Err(err)
            }
        }
    }

    fn run_cycle(&self) -> Result<CycleReport, AggregationError> {
        let started = Instant::now();
        // Captured before any read: ratings created while the cycle runs
        // fall after this point and are re-scanned next cycle.
        let cycle_started_at = Utc::now();

        let job = self.config.job_name.as_str();
        let watermark = self.watermarks.last_success(job)?;
        let pending = self.invalidations.pending()?;

        if pending.is_empty() && !self.source.has_new_since(watermark)? {
            debug!(job, %watermark, "no new ratings and no pending invalidations");
            return Ok(CycleReport {
                status: CycleStatus::NoOp,
                upserts: 0,
                deletes: 0,
                cleared: 0,
                ratings_scanned: 0,
                integrity_skips: 0,
                watermark,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        let computer = AggregationComputer::new(self.source.as_ref(), self.ownership.as_ref())
            .with_strict_integrity(self.config.strict_integrity);
        let diff = computer.compute(watermark, &pending)?;

        // The transaction: aggregate writes + invalidation clearing, or nothing.
        self.aggregates.apply_cycle(&diff, &pending)?;

        // Only after the commit. A crash between the two costs one harmless
        // re-run of an already-correct window.
        self.watermarks.advance_to(job, cycle_started_at)?;

        let report = CycleReport {
            status: CycleStatus::Completed,
            upserts: diff.upserts.len() as u64,
            deletes: diff.deletes.len() as u64,
            cleared: pending.len() as u64,
            ratings_scanned: diff.stats.ratings_scanned,
            integrity_skips: diff.stats.integrity_skips,
            watermark: cycle_started_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            job,
            upserts = report.upserts,
            deletes = report.deletes,
            cleared = report.cleared,
            ratings_scanned = report.ratings_scanned,
            integrity_skips = report.integrity_skips,
            duration_ms = report.duration_ms,
            "aggregation cycle committed"
        );
        Ok(report)
    }

    /// Average rating for one entity; `None` means no active ratings.
    pub fn average_rating(
        &self,
        entity: EntityRef,
    ) -> Result<Option<AverageRating>, StorageError> {
        self.aggregates.get(entity)
    }

    /// Batch read; entities without ratings are absent from the map.
    pub fn average_ratings(
        &self,
        entities: &[EntityRef],
    ) -> Result<BTreeMap<EntityRef, AverageRating>, StorageError> {
        self.aggregates.get_many(entities)
    }

    pub fn stats(&self) -> JobStats {
        JobStats {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_noop: self.cycles_noop.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
        }
    }

    pub fn job_name(&self) -> &str {
        &self.config.job_name
    }
}

/// Single-flight guard; released on drop so every exit path unlocks.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool, job: &str) -> Result<Self, AggregationError> {
        match flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => Ok(Self { flag }),
            Err(_) => Err(AggregationError::CycleInProgress {
                job: job.to_string(),
            }),
        }
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
