// src/services/movie_write_service.rs
//
// Tracker Write Reconciliation
//
// CRITICAL RULES:
// - No optimistic mutation: the store changes only when the tracker answers
// - Batch writes carry the minimal diff; an empty diff sends nothing
// - Writes without a session are reported to the caller as Unauthorized
// - Mark seen -> remove from watchlist is the only cross-operation coupling

use std::sync::Arc;
use uuid::Uuid;

use crate::config::PreferencesConfig;
use crate::domain::{Movie, MoviePayload, Provider, Rating, ViewId};
use crate::error::NetworkError;
use crate::integrations::TrackerClient;
use crate::services::fetch_policy::CouplingRule;
use crate::services::movie_fetch_service::{report_failure, same_session};
use crate::services::tasks::TaskExecutor;
use crate::state::MoviesState;

/// User-scoped flag a batch operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieFlag {
    Seen,
    Watchlist,
    Collection,
}

impl MovieFlag {
    pub fn get(&self, movie: &Movie) -> bool {
        match self {
            MovieFlag::Seen => movie.watched,
            MovieFlag::Watchlist => movie.in_watchlist,
            MovieFlag::Collection => movie.in_collection,
        }
    }
}

/// One tracker write endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagWrite {
    MarkSeen,
    MarkUnseen,
    AddToWatchlist,
    RemoveFromWatchlist,
    AddToCollection,
    RemoveFromCollection,
}

impl FlagWrite {
    pub fn new(flag: MovieFlag, target: bool) -> Self {
        match (flag, target) {
            (MovieFlag::Seen, true) => FlagWrite::MarkSeen,
            (MovieFlag::Seen, false) => FlagWrite::MarkUnseen,
            (MovieFlag::Watchlist, true) => FlagWrite::AddToWatchlist,
            (MovieFlag::Watchlist, false) => FlagWrite::RemoveFromWatchlist,
            (MovieFlag::Collection, true) => FlagWrite::AddToCollection,
            (MovieFlag::Collection, false) => FlagWrite::RemoveFromCollection,
        }
    }

    /// Fill in the flag this write set when the tracker echo leaves it out
    fn apply_to(&self, payload: &mut MoviePayload) {
        let (slot, value) = match self {
            FlagWrite::MarkSeen => (&mut payload.watched, true),
            FlagWrite::MarkUnseen => (&mut payload.watched, false),
            FlagWrite::AddToWatchlist => (&mut payload.in_watchlist, true),
            FlagWrite::RemoveFromWatchlist => (&mut payload.in_watchlist, false),
            FlagWrite::AddToCollection => (&mut payload.in_collection, true),
            FlagWrite::RemoveFromCollection => (&mut payload.in_collection, false),
        };
        slot.get_or_insert(value);
    }
}

impl std::fmt::Display for FlagWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlagWrite::MarkSeen => "mark seen",
            FlagWrite::MarkUnseen => "mark unseen",
            FlagWrite::AddToWatchlist => "add to watchlist",
            FlagWrite::RemoveFromWatchlist => "remove from watchlist",
            FlagWrite::AddToCollection => "add to collection",
            FlagWrite::RemoveFromCollection => "remove from collection",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone)]
pub struct MovieWriteService {
    tracker: Arc<dyn TrackerClient>,
    executor: TaskExecutor,
    preferences: PreferencesConfig,
}

impl MovieWriteService {
    pub fn new(
        tracker: Arc<dyn TrackerClient>,
        executor: TaskExecutor,
        preferences: PreferencesConfig,
    ) -> Self {
        Self {
            tracker,
            executor,
            preferences,
        }
    }

    // ========================================================================
    // TOGGLES
    // ========================================================================

    pub fn toggle_seen(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid) {
        self.toggle(state, calling_id, movie_id, MovieFlag::Seen);
    }

    pub fn toggle_watchlist(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid) {
        self.toggle(state, calling_id, movie_id, MovieFlag::Watchlist);
    }

    pub fn toggle_collection(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid) {
        self.toggle(state, calling_id, movie_id, MovieFlag::Collection);
    }

    fn toggle(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid, flag: MovieFlag) {
        let Some(current) = state.movie(movie_id).map(|m| flag.get(m)) else {
            log::debug!("Toggle on unknown movie {}", movie_id);
            return;
        };
        self.set_flag(state, calling_id, &[movie_id], flag, !current);
    }

    // ========================================================================
    // BATCH
    // ========================================================================

    pub fn set_movies_seen(&self, state: &mut MoviesState, calling_id: ViewId, ids: &[Uuid], seen: bool) {
        self.set_flag(state, calling_id, ids, MovieFlag::Seen, seen);
    }

    pub fn set_movies_in_watchlist(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        ids: &[Uuid],
        in_watchlist: bool,
    ) {
        self.set_flag(state, calling_id, ids, MovieFlag::Watchlist, in_watchlist);
    }

    pub fn set_movies_in_collection(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        ids: &[Uuid],
        in_collection: bool,
    ) {
        self.set_flag(state, calling_id, ids, MovieFlag::Collection, in_collection);
    }

    fn set_flag(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        ids: &[Uuid],
        flag: MovieFlag,
        target: bool,
    ) {
        if !state.is_logged_in() {
            state.show_error(calling_id, NetworkError::Unauthorized);
            return;
        }
        let diff = minimal_diff(state, ids, |movie| flag.get(movie) != target);
        self.write_flags(state, calling_id, FlagWrite::new(flag, target), diff);
    }

    fn write_flags(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        op: FlagWrite,
        targets: Vec<(Uuid, String)>,
    ) {
        if targets.is_empty() {
            log::debug!("Nothing to {}", op);
            return;
        }

        let username = state.account().map(|a| a.username.clone());
        let requested: Vec<Uuid> = targets.iter().map(|(id, _)| *id).collect();
        let lookup_ids: Vec<String> = targets.into_iter().map(|(_, lookup)| lookup).collect();
        log::debug!("{} for {} movies", op, lookup_ids.len());

        state.show_loading(calling_id, true, false);

        let tracker = Arc::clone(&self.tracker);
        let this = self.clone();
        self.executor.spawn(
            "tracker flag write",
            async move {
                match op {
                    FlagWrite::MarkSeen => tracker.mark_seen(&lookup_ids).await,
                    FlagWrite::MarkUnseen => tracker.mark_unseen(&lookup_ids).await,
                    FlagWrite::AddToWatchlist => tracker.add_to_watchlist(&lookup_ids).await,
                    FlagWrite::RemoveFromWatchlist => tracker.remove_from_watchlist(&lookup_ids).await,
                    FlagWrite::AddToCollection => tracker.add_to_collection(&lookup_ids).await,
                    FlagWrite::RemoveFromCollection => {
                        tracker.remove_from_collection(&lookup_ids).await
                    }
                }
            },
            move |state, result| {
                state.show_loading(calling_id, false, false);
                if !same_session(state, username.as_deref()) {
                    log::debug!("Dropping {} result from a previous session", op);
                    return;
                }
                let payloads = match result {
                    Ok(payloads) => payloads,
                    Err(e) => {
                        report_failure(state, calling_id, &e);
                        return;
                    }
                };

                let payloads: Vec<MoviePayload> = payloads
                    .into_iter()
                    .map(|mut payload| {
                        payload.source = Some(Provider::Tracker);
                        op.apply_to(&mut payload);
                        payload
                    })
                    .collect();
                let changed = state.put_movies(&payloads);
                state.sync_membership(&changed);
                state.movie_flags_updated(calling_id, changed);

                if op == FlagWrite::MarkSeen
                    && CouplingRule::mark_seen_removes_from_watchlist(
                        state.is_logged_in(),
                        &this.preferences,
                    )
                {
                    log::debug!("Applying {}", CouplingRule::MarkSeenRemovesFromWatchlist);
                    let still_listed = minimal_diff(state, &requested, |movie| movie.in_watchlist);
                    this.write_flags(state, calling_id, FlagWrite::RemoveFromWatchlist, still_listed);
                }
            },
        );
    }

    // ========================================================================
    // RATING & CHECK-IN
    // ========================================================================

    pub fn submit_rating(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid, rating: Rating) {
        let Some(lookup) = self.writable_lookup(state, calling_id, movie_id) else {
            return;
        };
        let username = state.account().map(|a| a.username.clone());

        let tracker = Arc::clone(&self.tracker);
        self.executor.spawn(
            "tracker rating",
            async move { tracker.submit_rating(&lookup, rating).await },
            move |state, result| {
                if !same_session(state, username.as_deref()) {
                    return;
                }
                match result {
                    Ok(mut payload) => {
                        payload.source = Some(Provider::Tracker);
                        payload.user_rating.get_or_insert(rating.value());
                        match state.put_movie(&payload) {
                            Ok(id) => state.movie_rating_changed(calling_id, id),
                            Err(e) => report_failure(state, calling_id, &e),
                        }
                    }
                    Err(e) => report_failure(state, calling_id, &e),
                }
            },
        );
    }

    pub fn check_in(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid, message: &str) {
        let Some(lookup) = self.writable_lookup(state, calling_id, movie_id) else {
            return;
        };
        let username = state.account().map(|a| a.username.clone());
        let message = message.trim().to_string();

        state.show_loading(calling_id, true, false);

        let tracker = Arc::clone(&self.tracker);
        self.executor.spawn(
            "tracker check-in",
            async move { tracker.check_in(&lookup, &message).await },
            move |state, result| {
                state.show_loading(calling_id, false, false);
                if !same_session(state, username.as_deref()) {
                    return;
                }
                match result {
                    Ok(mut payload) => {
                        payload.source = Some(Provider::Tracker);
                        match state.put_movie(&payload) {
                            Ok(id) => state.set_watching(Some(id)),
                            Err(e) => report_failure(state, calling_id, &e),
                        }
                    }
                    Err(e) => report_failure(state, calling_id, &e),
                }
            },
        );
    }

    /// Tracker id for a single-movie write, or None after telling the caller why not
    fn writable_lookup(&self, state: &MoviesState, calling_id: ViewId, movie_id: Uuid) -> Option<String> {
        if !state.is_logged_in() {
            state.show_error(calling_id, NetworkError::Unauthorized);
            return None;
        }
        let lookup = state.movie(movie_id).and_then(|m| m.tracker_lookup_id());
        if lookup.is_none() {
            log::debug!("No tracker id for movie {}", movie_id);
        }
        lookup
    }
}

impl std::fmt::Debug for MovieWriteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieWriteService")
            .field("preferences", &self.preferences)
            .finish()
    }
}

/// Known movies among `ids` selected by `differs`, paired with their tracker lookup id
fn minimal_diff(
    state: &MoviesState,
    ids: &[Uuid],
    differs: impl Fn(&Movie) -> bool,
) -> Vec<(Uuid, String)> {
    let mut diff: Vec<(Uuid, String)> = Vec::new();
    for id in ids {
        let Some(movie) = state.movie(*id) else {
            log::debug!("Skipping unknown movie {}", id);
            continue;
        };
        if !differs(movie) || diff.iter().any(|(seen, _)| seen == id) {
            continue;
        }
        if let Some(lookup) = movie.tracker_lookup_id() {
            diff.push((*id, lookup));
        }
    }
    diff
}
