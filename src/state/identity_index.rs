// src/state/identity_index.rs
//
// Identity Index - the single owner of every Movie.
//
// CRITICAL RULES:
// - Exactly one Movie per real-world movie, reachable from both provider ids
// - Collections hold internal ids into this index, never copies
// - A payload for a known movie is merged, never inserted twice

use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{validate_payload, DomainResult, Movie, MoviePayload};

/// Ways of addressing a movie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieKey<'a> {
    Internal(Uuid),
    Tracker(&'a str),
    Catalog(i64),
}

/// Result of merging a payload into the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    pub id: Uuid,
    pub created: bool,
    /// A duplicate entity that was folded into `id` and no longer exists
    pub absorbed: Option<Uuid>,
}

#[derive(Debug, Default)]
pub struct IdentityIndex {
    movies: HashMap<Uuid, Movie>,
    by_tracker: HashMap<String, Uuid>,
    by_catalog: HashMap<i64, Uuid>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a payload into the matching entity, creating it if unknown.
    ///
    /// When the payload links two entities that were so far only known by one id each,
    /// the catalog-only entity is folded into the tracker one.
    pub fn put(&mut self, payload: &MoviePayload) -> DomainResult<PutOutcome> {
        validate_payload(payload)?;

        let by_tracker = payload
            .tracker_id
            .as_ref()
            .and_then(|id| self.by_tracker.get(id).copied());
        let by_catalog = payload
            .catalog_id
            .and_then(|id| self.by_catalog.get(&id).copied());

        let outcome = match (by_tracker, by_catalog) {
            (Some(primary), Some(duplicate)) if primary != duplicate => {
                self.absorb(primary, duplicate);
                PutOutcome {
                    id: primary,
                    created: false,
                    absorbed: Some(duplicate),
                }
            }
            (Some(id), _) | (None, Some(id)) => PutOutcome {
                id,
                created: false,
                absorbed: None,
            },
            (None, None) => {
                let movie = Movie::new();
                let id = movie.id;
                self.movies.insert(id, movie);
                PutOutcome {
                    id,
                    created: true,
                    absorbed: None,
                }
            }
        };

        if let Some(movie) = self.movies.get_mut(&outcome.id) {
            movie.merge_from(payload);
        }
        self.reindex(outcome.id);

        Ok(outcome)
    }

    fn absorb(&mut self, primary: Uuid, duplicate: Uuid) {
        let Some(other) = self.movies.remove(&duplicate) else {
            return;
        };
        log::debug!("Folding duplicate movie {} into {}", duplicate, primary);

        for id in self.by_tracker.values_mut().chain(self.by_catalog.values_mut()) {
            if *id == duplicate {
                *id = primary;
            }
        }
        for movie in self.movies.values_mut() {
            for related in movie.related.iter_mut() {
                if *related == duplicate {
                    *related = primary;
                }
            }
        }
        if let Some(movie) = self.movies.get_mut(&primary) {
            movie.absorb(other);
        }
    }

    fn reindex(&mut self, id: Uuid) {
        let Some(movie) = self.movies.get(&id) else {
            return;
        };
        if let Some(tracker_id) = &movie.tracker_id {
            self.by_tracker.insert(tracker_id.clone(), id);
        }
        if let Some(catalog_id) = movie.catalog_id {
            self.by_catalog.insert(catalog_id, id);
        }
    }

    pub fn get(&self, key: MovieKey<'_>) -> Option<&Movie> {
        let id = self.resolve(key)?;
        self.movies.get(&id)
    }

    pub fn get_mut(&mut self, key: MovieKey<'_>) -> Option<&mut Movie> {
        let id = self.resolve(key)?;
        self.movies.get_mut(&id)
    }

    pub fn resolve(&self, key: MovieKey<'_>) -> Option<Uuid> {
        match key {
            MovieKey::Internal(id) => self.movies.contains_key(&id).then_some(id),
            MovieKey::Tracker(id) => self.by_tracker.get(id).copied(),
            MovieKey::Catalog(id) => self.by_catalog.get(&id).copied(),
        }
    }

    /// Resolve an identifier of unknown namespace (e.g. from a deep link).
    ///
    /// Tries the tracker namespace, then the catalog namespace, then internal ids.
    pub fn find(&self, raw: &str) -> Option<Uuid> {
        let raw = raw.trim();
        if let Some(id) = self.by_tracker.get(raw) {
            return Some(*id);
        }
        if let Ok(catalog_id) = raw.parse::<i64>() {
            if let Some(id) = self.by_catalog.get(&catalog_id) {
                return Some(*id);
            }
        }
        Uuid::parse_str(raw)
            .ok()
            .filter(|id| self.movies.contains_key(id))
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn clear(&mut self) {
        self.movies.clear();
        self.by_tracker.clear();
        self.by_catalog.clear();
    }
}
