//! Unique identifier types for rated entities
//!
//! All IDs use UUID v7 for time-sortable ordering, enabling efficient
//! chronological queries. Workshop and provider identifiers are distinct
//! newtypes so the two keyspaces cannot be confused at compile time;
//! `EntityRef` adds an explicit kind tag for the shared aggregate table.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a raw rating record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingId(Uuid);

impl RatingId {
    /// Create a new RatingId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RatingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RatingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a workshop
///
/// Workshops are the directly rated entities; each one is owned by
/// exactly one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkshopId(Uuid);

impl WorkshopId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkshopId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkshopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a provider (workshop owner)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(Uuid);

impl ProviderId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProviderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind-tagged key for the materialized aggregate table
///
/// Workshop and provider aggregates live in one table. The original data
/// model relied on the two UUID spaces never colliding; the explicit kind
/// tag makes a collision structurally impossible instead of probabilistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum EntityRef {
    Workshop(WorkshopId),
    Provider(ProviderId),
}

impl EntityRef {
    /// Raw UUID regardless of kind
    pub fn as_uuid(&self) -> &Uuid {
        match self {
            EntityRef::Workshop(id) => id.as_uuid(),
            EntityRef::Provider(id) => id.as_uuid(),
        }
    }

    pub fn is_workshop(&self) -> bool {
        matches!(self, EntityRef::Workshop(_))
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, EntityRef::Provider(_))
    }
}

impl From<WorkshopId> for EntityRef {
    fn from(id: WorkshopId) -> Self {
        EntityRef::Workshop(id)
    }
}

impl From<ProviderId> for EntityRef {
    fn from(id: ProviderId) -> Self {
        EntityRef::Provider(id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Workshop(id) => write!(f, "workshop:{}", id),
            EntityRef::Provider(id) => write!(f, "provider:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_id_creation() {
        let id1 = RatingId::new();
        let id2 = RatingId::new();
        assert_ne!(id1, id2, "RatingIds should be unique");
    }

    #[test]
    fn test_workshop_id_serialization() {
        let id = WorkshopId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: WorkshopId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_entity_ref_distinguishes_kinds() {
        let uuid = Uuid::now_v7();
        let as_workshop = EntityRef::Workshop(WorkshopId::from_uuid(uuid));
        let as_provider = EntityRef::Provider(ProviderId::from_uuid(uuid));
        assert_ne!(
            as_workshop, as_provider,
            "same UUID under different kinds must not collide"
        );
    }

    #[test]
    fn test_entity_ref_ordering_is_total() {
        let w = EntityRef::Workshop(WorkshopId::new());
        let p = EntityRef::Provider(ProviderId::new());
        // BTreeMap keys need a total order across kinds
        assert!(w < p || p < w);
    }

    #[test]
    fn test_entity_ref_serialization() {
        let entity = EntityRef::Provider(ProviderId::new());
        let json = serde_json::to_string(&entity).unwrap();
        let deserialized: EntityRef = serde_json::from_str(&json).unwrap();
        assert_eq!(entity, deserialized);
        assert!(json.contains("Provider"));
    }

    #[test]
    fn test_entity_ref_display() {
        let id = WorkshopId::new();
        let entity = EntityRef::from(id);
        assert_eq!(entity.to_string(), format!("workshop:{}", id));
    }
}
