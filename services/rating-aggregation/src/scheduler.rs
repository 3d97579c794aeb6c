//! Periodic scheduler loop
//!
//! Drives `AverageRatingJob::execute` on a fixed interval. The cycle itself
//! is synchronous blocking I/O, so it runs on the blocking pool. A failed
//! cycle is logged and retried on the next tick; the engine's commit
//! discipline makes the retry safe. Shutdown between cycles stops
//! immediately; shutdown during a cycle lets the in-flight transaction
//! commit or roll back whole.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::orchestrator::{AverageRatingJob, CycleStatus};

/// Run the job every `every` until `shutdown` flips to true.
pub async fn run(
    job: Arc<AverageRatingJob>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    // A slow cycle must not cause a burst of back-to-back triggers.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(job = job.job_name(), period_ms = every.as_millis() as u64, "scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let cycle_job = Arc::clone(&job);
                match tokio::task::spawn_blocking(move || cycle_job.execute()).await {
                    Ok(Ok(report)) => match report.status {
                        CycleStatus::Completed => debug!(
                            upserts = report.upserts,
                            deletes = report.deletes,
                            duration_ms = report.duration_ms,
                            "cycle completed"
                        ),
                        CycleStatus::NoOp => debug!("cycle no-op"),
                        CycleStatus::Skipped => debug!("cycle skipped, previous still running"),
                    },
                    Ok(Err(err)) => {
                        error!(%err, "cycle failed; retrying on next tick");
                    }
                    Err(join_err) => {
                        error!(%join_err, "cycle task panicked or was cancelled");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(job = job.job_name(), "scheduler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobConfig;
    use crate::memory::{MemoryOwnership, MemoryRatingSource, MemoryStore};
    use chrono::Utc;
    use types::ids::{ProviderId, WorkshopId};
    use types::rating::{Rating, Score};
    use uuid::Uuid;

    fn job_with_one_rating() -> (Arc<AverageRatingJob>, WorkshopId) {
        let source = Arc::new(MemoryRatingSource::new());
        let ownership = Arc::new(MemoryOwnership::new());
        let store = Arc::new(MemoryStore::new());
        let provider = ProviderId::new();
        let workshop = WorkshopId::new();
        ownership.assign(workshop, provider);
        source.insert(Rating::new(workshop, Uuid::now_v7(), Score::new(5), Utc::now()));
        let job = AverageRatingJob::new(
            JobConfig::default(),
            source,
            ownership,
            store.clone(),
            store.clone(),
            store,
        );
        (Arc::new(job), workshop)
    }

    #[tokio::test]
    async fn test_scheduler_runs_cycles_until_shutdown() {
        let (job, workshop) = job_with_one_rating();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run(
            Arc::clone(&job),
            Duration::from_millis(10),
            rx,
        ));

        // Give the loop a few ticks, then stop it.
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(job.stats().cycles_completed >= 1);
        assert!(job.average_rating(workshop.into()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scheduler_stops_when_sender_dropped() {
        let (job, _) = job_with_one_rating();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run(job, Duration::from_secs(3600), rx));
        drop(tx);
        handle.await.unwrap();
    }
}
