// src/domain/cast.rs
//
// Cast members and trailers hanging off a Movie.
// These are plain values owned by their Movie, never indexed on their own.

use serde::{Deserialize, Serialize};

/// A person credited on a movie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastMember {
    /// Catalog person id
    pub person_id: i64,
    pub name: String,
    pub character: Option<String>,
    pub profile_path: Option<String>,
    /// Billing position, lower first
    pub order: u32,
}

impl CastMember {
    pub fn new(person_id: i64, name: String, order: u32) -> Self {
        Self {
            person_id,
            name,
            character: None,
            profile_path: None,
            order,
        }
    }
}

/// A playable trailer reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trailer {
    pub name: String,
    pub source: String,
    pub site: String,
}
