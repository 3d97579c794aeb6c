//! Raw rating records
//!
//! Ratings are owned by the external rating subsystem and are immutable
//! once written, except for soft-deletion via the `active` flag. The
//! aggregation engine only ever reads them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ids::{RatingId, WorkshopId};

/// A rating score, restricted to the 1..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Create a new Score
    ///
    /// # Panics
    /// Panics if the value is outside 1..=5
    pub fn new(value: u8) -> Self {
        assert!(
            (Self::MIN..=Self::MAX).contains(&value),
            "Score must be between 1 and 5"
        );
        Self(value)
    }

    /// Try to create a Score, returning None if out of range
    pub fn try_new(value: u8) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Raw score value
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Score as a Decimal for mean arithmetic
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single rating of a workshop by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    /// The rated workshop
    pub workshop_id: WorkshopId,
    /// The user who left the rating
    pub rater_id: Uuid,
    pub score: Score,
    pub created_at: DateTime<Utc>,
    /// False once soft-deleted; inactive ratings never contribute to
    /// aggregates.
    pub active: bool,
}

impl Rating {
    /// Create a new active rating stamped with the given creation time.
    pub fn new(workshop_id: WorkshopId, rater_id: Uuid, score: Score, created_at: DateTime<Utc>) -> Self {
        Self {
            id: RatingId::new(),
            workshop_id,
            rater_id,
            score,
            created_at,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_score_bounds() {
        assert!(Score::try_new(0).is_none());
        assert!(Score::try_new(1).is_some());
        assert!(Score::try_new(5).is_some());
        assert!(Score::try_new(6).is_none());
    }

    #[test]
    #[should_panic(expected = "Score must be between 1 and 5")]
    fn test_score_panics_out_of_range() {
        Score::new(0);
    }

    #[test]
    fn test_score_as_decimal() {
        assert_eq!(Score::new(4).as_decimal(), Decimal::from(4));
    }

    #[test]
    fn test_rating_starts_active() {
        let rating = Rating::new(WorkshopId::new(), Uuid::now_v7(), Score::new(5), Utc::now());
        assert!(rating.active);
    }

    #[test]
    fn test_rating_serialization() {
        let rating = Rating::new(WorkshopId::new(), Uuid::now_v7(), Score::new(3), Utc::now());
        let json = serde_json::to_string(&rating).unwrap();
        let deserialized: Rating = serde_json::from_str(&json).unwrap();
        assert_eq!(rating, deserialized);
    }

    proptest! {
        #[test]
        fn prop_try_new_matches_range(value in 0u8..=20) {
            let expected = (1..=5).contains(&value);
            prop_assert_eq!(Score::try_new(value).is_some(), expected);
        }
    }
}
