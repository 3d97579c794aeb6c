//! Types library for the rating aggregation system
//!
//! This library provides the core type definitions shared between the
//! aggregation engine and its collaborators, ensuring type safety and
//! deterministic behavior.
//!
//! # Modules
//! - `ids`: Unique identifiers (RatingId, WorkshopId, ProviderId, EntityRef)
//! - `rating`: Raw rating records and score validation
//! - `aggregate`: Materialized average-rating values and cycle diffs
//! - `errors`: Error taxonomy

// Public modules
pub mod aggregate;
pub mod errors;
pub mod ids;
pub mod rating;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::*;
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::rating::*;
}
