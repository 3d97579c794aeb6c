//! Rating Aggregation Service
//!
//! Maintains denormalized average ratings for workshops and for the
//! providers that own them, derived from an append/soft-delete rating log.
//!
//! The engine runs as a periodic batch job:
//! - a watermark marks the cutoff up to which ratings are already folded in
//! - an invalidation log catches changes that bypass watermark scanning
//!   (soft-deletes, amendments, backfills)
//! - every touched entity is fully recomputed from its current active
//!   rating set, so re-running a window is idempotent
//! - aggregate writes, deletes, and invalidation clearing commit in one
//!   transaction; the watermark advances only after the commit
//!
//! # Architecture
//!
//! ```text
//!  RatingSource   WorkshopOwnership      (external, read-only)
//!       │                │
//!   ┌───▼────────────────▼───┐
//!   │  AggregationComputer   │  ← pure: (watermark, pending) → diff
//!   └───────────┬────────────┘
//!               │
//!   ┌───────────▼────────────┐
//!   │   AverageRatingJob     │  ← single-flight cycle orchestration
//!   └───┬───────┬────────┬───┘
//!       │       │        │
//!  ┌────▼──┐ ┌──▼─────┐ ┌▼──────────┐
//!  │Water- │ │Invali- │ │ Aggregate │
//!  │marks  │ │dations │ │ Store     │
//!  └───────┘ └────────┘ └───────────┘
//! ```

pub mod compute;
pub mod config;
pub mod invalidation;
pub mod memory;
pub mod orchestrator;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod watermark;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
