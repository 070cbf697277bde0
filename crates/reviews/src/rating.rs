use serde::{Deserialize, Serialize};

use orderkit_core::{DomainError, ValueObject};

/// Star rating, 1 to 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl ValueObject for Rating {}

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::validation("rating must be between 1 and 5"))
        }
    }
}

impl TryFrom<i64> for Rating {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| DomainError::validation("rating must be between 1 and 5"))
            .and_then(Rating::try_from)
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> u8 {
        r.0
    }
}

/// Aggregate review figures for one product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub rating: f64,
    pub num_reviews: u32,
}

impl ReviewSummary {
    pub const EMPTY: ReviewSummary = ReviewSummary {
        rating: 0.0,
        num_reviews: 0,
    };

    /// Arithmetic mean of all ratings; 0 when there are none.
    pub fn from_ratings(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0u64, 0u32), |(s, c), r| (s + u64::from(r.value()), c + 1));

        if count == 0 {
            return Self::EMPTY;
        }

        Self {
            rating: sum as f64 / f64::from(count),
            num_reviews: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(Rating::try_from(0u8).is_err());
        assert!(Rating::try_from(6u8).is_err());
        assert!(Rating::try_from(-3i64).is_err());
        assert_eq!(Rating::try_from(5u8).unwrap().value(), 5);
    }

    #[test]
    fn deserialization_enforces_range() {
        assert!(serde_json::from_str::<Rating>("4").is_ok());
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }

    #[test]
    fn empty_summary_is_zero() {
        assert_eq!(ReviewSummary::from_ratings([]), ReviewSummary::EMPTY);
    }

    #[test]
    fn mean_of_mixed_ratings() {
        let ratings = [5u8, 4, 3].map(|v| Rating::try_from(v).unwrap());
        let summary = ReviewSummary::from_ratings(ratings);
        assert_eq!(summary.num_reviews, 3);
        assert!((summary.rating - 4.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn mean_stays_within_bounds(values in proptest::collection::vec(1u8..=5, 1..50)) {
            let summary = ReviewSummary::from_ratings(values.iter().map(|v| Rating::try_from(*v).unwrap()));
            prop_assert_eq!(summary.num_reviews as usize, values.len());
            prop_assert!(summary.rating >= 1.0 && summary.rating <= 5.0);
        }
    }
}
