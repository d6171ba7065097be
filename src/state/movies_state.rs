// src/state/movies_state.rs
//
// Shared State Store
//
// CRITICAL RULES:
// - Mutated only from the core's serialized context
// - Every collection setter emits its own typed event
// - Collections store internal ids into the identity index
// - `None` means "not fetched yet", distinct from an empty fetched list

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::{
    CastMember, Filter, FilterSet, Movie, MoviePayload, MovieQueryType, PaginatedResult, Provider,
    Trailer, ViewId,
};
use crate::error::{AppResult, NetworkError};
use crate::events::{
    AccountChanged, CacheLoaded, CatalogConfigurationChanged, EventBus, FiltersChanged, InTheatresChanged,
    LibraryChanged, MovieFlagsUpdated, MovieInformationUpdated, MovieUserRatingChanged,
    PopularChanged, RecommendedChanged, SearchResultChanged, ShowError, ShowLoadingProgress,
    TrendingChanged, UpcomingChanged, WatchingChanged, WatchlistChanged,
};
use crate::state::identity_index::{IdentityIndex, MovieKey};
use crate::state::session::{Account, CatalogConfiguration};

/// Paginated listing of movie ids
pub type MoviePage = PaginatedResult<Uuid>;

/// Remote requests that must not run twice at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKey {
    Configuration,
    /// A collection fetch or a further page of a listing
    Query(MovieQueryType),
    Related(Uuid),
    Cast(Uuid),
    Trailers(Uuid),
}

/// Proof of owning the running request for a key. A restarted request gets a
/// new generation, so the completion of the one it replaced can no longer end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub key: RequestKey,
    generation: u64,
}

#[derive(Debug)]
pub struct MoviesState {
    bus: EventBus,

    account: Option<Account>,
    configuration: Option<CatalogConfiguration>,

    index: IdentityIndex,

    library: Option<Vec<Uuid>>,
    watchlist: Option<Vec<Uuid>>,
    trending: Option<Vec<Uuid>>,
    recommended: Option<Vec<Uuid>>,
    popular: Option<MoviePage>,
    now_playing: Option<MoviePage>,
    upcoming: Option<MoviePage>,
    search_result: Option<MoviePage>,
    search_query: Option<String>,

    watching: Option<Uuid>,

    filters: FilterSet,

    /// Collections already read from the local cache
    cache_loaded: HashSet<MovieQueryType>,
    /// Generation of the running request per key
    requests_in_flight: HashMap<RequestKey, u64>,
    next_generation: u64,
    /// Detail lookups of identifiers not in the index yet
    lookups_in_flight: HashSet<(Provider, String)>,
}

impl MoviesState {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            account: None,
            configuration: None,
            index: IdentityIndex::new(),
            library: None,
            watchlist: None,
            trending: None,
            recommended: None,
            popular: None,
            now_playing: None,
            upcoming: None,
            search_result: None,
            search_query: None,
            watching: None,
            filters: FilterSet::new(),
            cache_loaded: HashSet::new(),
            requests_in_flight: HashMap::new(),
            next_generation: 0,
            lookups_in_flight: HashSet::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // ========================================================================
    // SESSION
    // ========================================================================

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.account.is_some()
    }

    pub fn set_account(&mut self, account: Option<Account>) {
        if self.account == account {
            return;
        }
        self.account = account;
        self.bus.emit(AccountChanged::new(self.account.is_some()));
    }

    /// Drop every collection and the identity index.
    /// Filters and catalog configuration survive a session change.
    pub fn reset_session_state(&mut self) {
        self.index.clear();
        self.watching = None;
        self.search_query = None;
        self.requests_in_flight
            .retain(|key, _| *key == RequestKey::Configuration);
        self.lookups_in_flight.clear();
        self.set_library(None);
        self.set_watchlist(None);
        self.set_recommended(None);
        self.set_trending(None);
        self.set_popular(None);
        self.set_now_playing(None);
        self.set_upcoming(None);
        self.set_search_result(None);
    }

    pub fn configuration(&self) -> Option<&CatalogConfiguration> {
        self.configuration.as_ref()
    }

    pub fn set_configuration(&mut self, configuration: Option<CatalogConfiguration>) {
        self.configuration = configuration;
        self.bus.emit(CatalogConfigurationChanged::new());
    }

    // ========================================================================
    // IDENTITY INDEX
    // ========================================================================

    /// Merge a payload into the index and return the entity's internal id
    pub fn put_movie(&mut self, payload: &MoviePayload) -> AppResult<Uuid> {
        let outcome = self.index.put(payload)?;
        if let Some(absorbed) = outcome.absorbed {
            self.remap_collections(absorbed, outcome.id);
        }
        Ok(outcome.id)
    }

    /// Merge a listing; invalid payloads are skipped, duplicates collapse.
    pub fn put_movies(&mut self, payloads: &[MoviePayload]) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match self.put_movie(payload) {
                Ok(id) => {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                Err(e) => log::warn!("Skipping movie payload: {}", e),
            }
        }
        ids
    }

    pub fn movie(&self, id: Uuid) -> Option<&Movie> {
        self.index.get(MovieKey::Internal(id))
    }

    pub fn movie_mut(&mut self, id: Uuid) -> Option<&mut Movie> {
        self.index.get_mut(MovieKey::Internal(id))
    }

    pub fn movie_by(&self, key: MovieKey<'_>) -> Option<&Movie> {
        self.index.get(key)
    }

    /// Look up a movie by an identifier of unknown namespace
    pub fn find_movie(&self, raw: &str) -> Option<&Movie> {
        let id = self.index.find(raw)?;
        self.movie(id)
    }

    /// Resolve ids to entities, skipping any that are gone
    pub fn movies(&self, ids: &[Uuid]) -> Vec<&Movie> {
        ids.iter().filter_map(|id| self.movie(*id)).collect()
    }

    pub fn index(&self) -> &IdentityIndex {
        &self.index
    }

    fn remap_collections(&mut self, from: Uuid, to: Uuid) {
        fn remap(ids: &mut Vec<Uuid>, from: Uuid, to: Uuid) {
            if !ids.contains(&from) {
                return;
            }
            let already_present = ids.contains(&to);
            ids.retain(|id| *id != from || !already_present);
            for id in ids.iter_mut() {
                if *id == from {
                    *id = to;
                }
            }
        }

        for list in [
            &mut self.library,
            &mut self.watchlist,
            &mut self.trending,
            &mut self.recommended,
        ]
        .into_iter()
        .flatten()
        {
            remap(list, from, to);
        }
        for page in [
            &mut self.popular,
            &mut self.now_playing,
            &mut self.upcoming,
            &mut self.search_result,
        ]
        .into_iter()
        .flatten()
        {
            remap(&mut page.items, from, to);
        }
        if self.watching == Some(from) {
            self.watching = Some(to);
        }
    }

    // ========================================================================
    // COLLECTIONS
    // ========================================================================

    pub fn library(&self) -> Option<&[Uuid]> {
        self.library.as_deref()
    }

    pub fn set_library(&mut self, library: Option<Vec<Uuid>>) {
        self.library = library;
        self.bus.emit(LibraryChanged::new());
    }

    pub fn watchlist(&self) -> Option<&[Uuid]> {
        self.watchlist.as_deref()
    }

    pub fn set_watchlist(&mut self, watchlist: Option<Vec<Uuid>>) {
        self.watchlist = watchlist;
        self.bus.emit(WatchlistChanged::new());
    }

    pub fn trending(&self) -> Option<&[Uuid]> {
        self.trending.as_deref()
    }

    pub fn set_trending(&mut self, trending: Option<Vec<Uuid>>) {
        self.trending = trending;
        self.bus.emit(TrendingChanged::new());
    }

    pub fn recommended(&self) -> Option<&[Uuid]> {
        self.recommended.as_deref()
    }

    pub fn set_recommended(&mut self, recommended: Option<Vec<Uuid>>) {
        self.recommended = recommended;
        self.bus.emit(RecommendedChanged::new());
    }

    pub fn popular(&self) -> Option<&MoviePage> {
        self.popular.as_ref()
    }

    pub fn set_popular(&mut self, popular: Option<MoviePage>) {
        self.popular = popular;
        self.bus.emit(PopularChanged::new());
    }

    pub fn now_playing(&self) -> Option<&MoviePage> {
        self.now_playing.as_ref()
    }

    pub fn set_now_playing(&mut self, now_playing: Option<MoviePage>) {
        self.now_playing = now_playing;
        self.bus.emit(InTheatresChanged::new());
    }

    pub fn upcoming(&self) -> Option<&MoviePage> {
        self.upcoming.as_ref()
    }

    pub fn set_upcoming(&mut self, upcoming: Option<MoviePage>) {
        self.upcoming = upcoming;
        self.bus.emit(UpcomingChanged::new());
    }

    pub fn search_result(&self) -> Option<&MoviePage> {
        self.search_result.as_ref()
    }

    pub fn set_search_result(&mut self, search_result: Option<MoviePage>) {
        self.search_result = search_result;
        self.bus.emit(SearchResultChanged::new());
    }

    /// Query of the search currently shown, set before its first page arrives
    pub fn search_query(&self) -> Option<&str> {
        self.search_query.as_deref()
    }

    pub fn set_search_query(&mut self, query: Option<String>) {
        self.search_query = query;
    }

    /// Plain (unpaginated) collection backing a view type
    pub fn collection(&self, query_type: MovieQueryType) -> Option<&[Uuid]> {
        match query_type {
            MovieQueryType::Library => self.library(),
            MovieQueryType::Watchlist => self.watchlist(),
            MovieQueryType::Trending => self.trending(),
            MovieQueryType::Recommended => self.recommended(),
            _ => None,
        }
    }

    pub fn set_collection(&mut self, query_type: MovieQueryType, ids: Option<Vec<Uuid>>) {
        match query_type {
            MovieQueryType::Library => self.set_library(ids),
            MovieQueryType::Watchlist => self.set_watchlist(ids),
            MovieQueryType::Trending => self.set_trending(ids),
            MovieQueryType::Recommended => self.set_recommended(ids),
            other => log::error!("{} is not a plain collection", other),
        }
    }

    /// Paginated listing backing a view type
    pub fn page(&self, query_type: MovieQueryType) -> Option<&MoviePage> {
        match query_type {
            MovieQueryType::Popular => self.popular(),
            MovieQueryType::NowPlaying => self.now_playing(),
            MovieQueryType::Upcoming => self.upcoming(),
            MovieQueryType::Search => self.search_result(),
            _ => None,
        }
    }

    pub fn set_page(&mut self, query_type: MovieQueryType, page: Option<MoviePage>) {
        match query_type {
            MovieQueryType::Popular => self.set_popular(page),
            MovieQueryType::NowPlaying => self.set_now_playing(page),
            MovieQueryType::Upcoming => self.set_upcoming(page),
            MovieQueryType::Search => self.set_search_result(page),
            other => log::error!("{} is not a paginated listing", other),
        }
    }

    pub fn watching(&self) -> Option<Uuid> {
        self.watching
    }

    pub fn set_watching(&mut self, watching: Option<Uuid>) {
        self.watching = watching;
        self.bus.emit(WatchingChanged::new(watching));
    }

    /// Bring fetched library/watchlist membership in line with the entities' flags
    /// after a write round trip.
    pub fn sync_membership(&mut self, ids: &[Uuid]) {
        let mut library_changed = false;
        let mut watchlist_changed = false;

        for id in ids {
            let Some((in_library, in_watchlist)) =
                self.movie(*id).map(|m| (m.in_library(), m.in_watchlist))
            else {
                continue;
            };
            if let Some(library) = self.library.as_mut() {
                library_changed |= set_membership(library, *id, in_library);
            }
            if let Some(watchlist) = self.watchlist.as_mut() {
                watchlist_changed |= set_membership(watchlist, *id, in_watchlist);
            }
        }

        if library_changed {
            self.bus.emit(LibraryChanged::new());
        }
        if watchlist_changed {
            self.bus.emit(WatchlistChanged::new());
        }
    }

    // ========================================================================
    // LOCAL CACHE & REQUEST BOOKKEEPING
    // ========================================================================

    pub fn is_cache_loaded(&self, collection: MovieQueryType) -> bool {
        self.cache_loaded.contains(&collection)
    }

    pub fn mark_cache_loaded(&mut self, collection: MovieQueryType) {
        self.cache_loaded.insert(collection);
        self.bus.emit(CacheLoaded::new(collection));
    }

    /// Returns `None` if the same request is already running
    pub fn begin_request(&mut self, key: RequestKey) -> Option<RequestToken> {
        if self.requests_in_flight.contains_key(&key) {
            return None;
        }
        Some(self.restart_request(key))
    }

    /// Take over `key` whether or not a request for it is running
    pub fn restart_request(&mut self, key: RequestKey) -> RequestToken {
        self.next_generation += 1;
        self.requests_in_flight.insert(key, self.next_generation);
        RequestToken {
            key,
            generation: self.next_generation,
        }
    }

    /// Returns false if the request was superseded or dropped by a session reset
    pub fn end_request(&mut self, token: RequestToken) -> bool {
        if !self.is_request_current(token) {
            return false;
        }
        self.requests_in_flight.remove(&token.key);
        true
    }

    pub fn is_request_current(&self, token: RequestToken) -> bool {
        self.requests_in_flight.get(&token.key) == Some(&token.generation)
    }

    pub fn is_request_in_flight(&self, key: RequestKey) -> bool {
        self.requests_in_flight.contains_key(&key)
    }

    /// Returns false if `reference` is already being looked up at `provider`
    pub fn begin_lookup(&mut self, provider: Provider, reference: &str) -> bool {
        self.lookups_in_flight.insert((provider, reference.to_string()))
    }

    pub fn end_lookup(&mut self, provider: Provider, reference: &str) {
        self.lookups_in_flight.remove(&(provider, reference.to_string()));
    }

    // ========================================================================
    // ENTITY SUB-LISTS
    // ========================================================================

    pub fn set_related(&mut self, movie_id: Uuid, related: Vec<Uuid>) {
        if let Some(movie) = self.movie_mut(movie_id) {
            movie.related = related;
        }
    }

    pub fn set_cast(&mut self, movie_id: Uuid, cast: Vec<CastMember>) {
        if let Some(movie) = self.movie_mut(movie_id) {
            movie.cast = cast;
        }
    }

    pub fn set_trailers(&mut self, movie_id: Uuid, trailers: Vec<Trailer>) {
        if let Some(movie) = self.movie_mut(movie_id) {
            movie.trailers = trailers;
        }
    }

    // ========================================================================
    // FILTERS
    // ========================================================================

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn add_filter(&mut self, filter: Filter) -> bool {
        let changed = self.filters.add(filter);
        if changed {
            self.bus.emit(FiltersChanged::new());
        }
        changed
    }

    pub fn remove_filter(&mut self, filter: Filter) -> bool {
        let changed = self.filters.remove(filter);
        if changed {
            self.bus.emit(FiltersChanged::new());
        }
        changed
    }

    pub fn clear_filters(&mut self) -> bool {
        let changed = self.filters.clear();
        if changed {
            self.bus.emit(FiltersChanged::new());
        }
        changed
    }

    // ========================================================================
    // NOTIFICATIONS WITHOUT A COLLECTION SETTER
    // ========================================================================

    pub fn movie_information_updated(&self, calling_id: ViewId, movie_id: Uuid) {
        self.bus.emit(MovieInformationUpdated::new(calling_id, movie_id));
    }

    pub fn movie_flags_updated(&self, calling_id: ViewId, movie_ids: Vec<Uuid>) {
        self.bus.emit(MovieFlagsUpdated::new(calling_id, movie_ids));
    }

    pub fn movie_rating_changed(&self, calling_id: ViewId, movie_id: Uuid) {
        self.bus.emit(MovieUserRatingChanged::new(calling_id, movie_id));
    }

    /// Error channel; only the originating view hears about it
    pub fn show_error(&self, calling_id: ViewId, error: NetworkError) {
        self.bus.emit(ShowError::new(calling_id, error));
    }

    pub fn show_loading(&self, calling_id: ViewId, show: bool, secondary: bool) {
        if calling_id.is_background() {
            return;
        }
        self.bus.emit(ShowLoadingProgress::new(calling_id, show, secondary));
    }
}

fn set_membership(list: &mut Vec<Uuid>, id: Uuid, member: bool) -> bool {
    let present = list.contains(&id);
    if member && !present {
        list.push(id);
        true
    } else if !member && present {
        list.retain(|x| *x != id);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting<E: crate::events::StateEvent>(state: &MoviesState) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        state.bus().subscribe::<E, _>(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        counter
    }

    #[test]
    fn test_each_setter_emits_its_event() {
        let mut state = MoviesState::new(EventBus::new());
        let library = counting::<LibraryChanged>(&state);
        let popular = counting::<PopularChanged>(&state);

        state.set_library(Some(vec![]));
        state.set_popular(None);

        assert_eq!(library.load(Ordering::SeqCst), 1);
        assert_eq!(popular.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_collections_reference_index_entities() {
        let mut state = MoviesState::new(EventBus::new());
        let ids = state.put_movies(&[
            MoviePayload::tracker("tt0113277").with_title("Heat"),
            MoviePayload::tracker("tt0078748").with_title("Alien"),
        ]);
        state.set_watchlist(Some(ids.clone()));

        // A later detail merge is visible through the collection
        let detail = MoviePayload {
            overview: Some("Crime".to_string()),
            ..MoviePayload::tracker("tt0113277").as_detail()
        };
        state.put_movie(&detail).unwrap();

        let watchlist = state.movies(state.watchlist().unwrap());
        assert_eq!(watchlist.len(), 2);
        assert_eq!(watchlist[0].overview.as_deref(), Some("Crime"));
    }

    #[test]
    fn test_folded_duplicate_is_remapped_in_collections() {
        let mut state = MoviesState::new(EventBus::new());
        let tracker_ids = state.put_movies(&[MoviePayload::tracker("tt0113277")]);
        let catalog_ids = state.put_movies(&[MoviePayload::catalog(949)]);
        state.set_watchlist(Some(tracker_ids.clone()));
        state.set_popular(Some(PaginatedResult::new(catalog_ids, 1, 1)));

        state
            .put_movie(&MoviePayload {
                catalog_id: Some(949),
                ..MoviePayload::tracker("tt0113277")
            })
            .unwrap();

        assert_eq!(state.popular().unwrap().items, tracker_ids);
        assert_eq!(state.index().len(), 1);
    }

    #[test]
    fn test_filter_mutations_emit_only_on_change() {
        let mut state = MoviesState::new(EventBus::new());
        let filters = counting::<FiltersChanged>(&state);

        assert!(state.add_filter(Filter::Seen));
        assert!(!state.add_filter(Filter::Seen));
        assert!(state.add_filter(Filter::Unseen));
        assert!(!state.filters().contains(Filter::Seen));
        assert!(state.clear_filters());
        assert!(!state.clear_filters());

        assert_eq!(filters.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_sync_membership_updates_fetched_lists() {
        let mut state = MoviesState::new(EventBus::new());
        let ids = state.put_movies(&[MoviePayload {
            in_watchlist: Some(true),
            ..MoviePayload::tracker("tt0113277")
        }]);
        state.set_watchlist(Some(vec![]));
        let watchlist = counting::<WatchlistChanged>(&state);

        state.sync_membership(&ids);
        assert_eq!(state.watchlist().unwrap(), ids.as_slice());
        assert_eq!(watchlist.load(Ordering::SeqCst), 1);

        // Library never fetched: stays None
        assert!(state.library().is_none());
    }

    #[test]
    fn test_request_guard() {
        let mut state = MoviesState::new(EventBus::new());
        let key = RequestKey::Query(MovieQueryType::Popular);
        let token = state.begin_request(key).unwrap();
        assert!(state.begin_request(key).is_none());
        assert!(state.end_request(token));
        assert!(!state.is_request_in_flight(key));
        assert!(state.begin_request(key).is_some());
    }

    #[test]
    fn test_superseded_request_cannot_end_its_successor() {
        let mut state = MoviesState::new(EventBus::new());
        let key = RequestKey::Query(MovieQueryType::Search);
        let first = state.begin_request(key).unwrap();
        let second = state.restart_request(key);

        assert!(!state.end_request(first));
        assert!(state.is_request_in_flight(key));
        assert!(state.begin_request(key).is_none());
        assert!(state.end_request(second));
        assert!(!state.is_request_in_flight(key));
    }

    #[test]
    fn test_request_from_before_reset_is_stale() {
        let mut state = MoviesState::new(EventBus::new());
        let key = RequestKey::Query(MovieQueryType::Watchlist);
        let stale = state.begin_request(key).unwrap();
        let configuration = state.begin_request(RequestKey::Configuration).unwrap();
        state.reset_session_state();
        assert!(state.is_request_current(configuration));

        let fresh = state.begin_request(key).unwrap();
        assert!(!state.end_request(stale));
        assert!(state.is_request_current(fresh));
    }

    #[test]
    fn test_lookup_guard_is_per_provider_and_cleared_on_reset() {
        let mut state = MoviesState::new(EventBus::new());
        assert!(state.begin_lookup(Provider::Tracker, "heat-1995"));
        assert!(!state.begin_lookup(Provider::Tracker, "heat-1995"));
        assert!(state.begin_lookup(Provider::Catalog, "heat-1995"));

        state.reset_session_state();
        assert!(state.begin_lookup(Provider::Tracker, "heat-1995"));
        state.end_lookup(Provider::Tracker, "heat-1995");
        assert!(state.begin_lookup(Provider::Tracker, "heat-1995"));
    }

    #[test]
    fn test_reset_session_state() {
        let mut state = MoviesState::new(EventBus::new());
        let ids = state.put_movies(&[MoviePayload::tracker("tt0113277")]);
        state.set_library(Some(ids));
        state.add_filter(Filter::Collection);

        state.reset_session_state();

        assert!(state.library().is_none());
        assert!(state.index().is_empty());
        assert!(state.filters().contains(Filter::Collection));
    }
}
