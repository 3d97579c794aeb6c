//! Read-only collaborator seams
//!
//! The rating log and the workshop catalog are owned by other subsystems;
//! the engine consumes them through these traits and never writes back.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use types::errors::StorageError;
use types::ids::{ProviderId, WorkshopId};
use types::rating::Rating;

/// Read access to the raw rating log.
///
/// Only active (non-soft-deleted) ratings are ever returned.
pub trait RatingSource {
    /// Active ratings with `created_at` strictly after the watermark.
    fn active_ratings_created_after(
        &self,
        watermark: DateTime<Utc>,
    ) -> Result<Vec<Rating>, StorageError>;

    /// Cheap existence probe used to short-circuit no-op cycles.
    fn has_new_since(&self, watermark: DateTime<Utc>) -> Result<bool, StorageError>;

    /// All active ratings for the given workshops, regardless of age.
    ///
    /// Full recomputation needs the complete current set, not just the
    /// ratings behind the watermark window.
    fn active_ratings_for_workshops(
        &self,
        workshops: &BTreeSet<WorkshopId>,
    ) -> Result<Vec<Rating>, StorageError>;
}

/// Read access to the workshop → provider ownership mapping.
pub trait WorkshopOwnership {
    /// Owning provider, or `None` for an orphaned workshop.
    fn provider_id(&self, workshop: WorkshopId) -> Result<Option<ProviderId>, StorageError>;

    /// All workshops owned by the provider.
    fn workshops_for_provider(
        &self,
        provider: ProviderId,
    ) -> Result<Vec<WorkshopId>, StorageError>;
}
