// src/domain/rating.rs

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult};

/// A user rating on the 0-10 scale (0 clears the rating)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const UNRATED: Rating = Rating(0);

    pub fn new(value: u8) -> DomainResult<Self> {
        if value > 10 {
            return Err(DomainError::InvariantViolation(format!(
                "Rating {} is outside 0-10",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/10", self.0)
    }
}
