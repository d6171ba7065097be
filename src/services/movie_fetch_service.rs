// src/services/movie_fetch_service.rs
//
// Fetch Orchestrator
//
// CRITICAL RULES:
// - Decides cache vs tracker vs catalog per view type, using the policy table
// - Never blocks: every fetch is spawned and observed through store notifications
// - Completions run on the serialized context and are the only writers of results
// - Tracker results from a previous session are dropped
// - Failures go to the error channel of the view that started the work

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    MoviePayload, MovieQueryType, PaginatedResult, Provider, ViewId, FIRST_PAGE,
};
use crate::error::{AppError, AppResult, NetworkError};
use crate::integrations::{CatalogClient, LocalMovieCache, TrackerClient};
use crate::services::fetch_policy::{policy_for, requires_login, DetailPlan, FetchTrigger};
use crate::services::tasks::TaskExecutor;
use crate::state::{MovieKey, MoviesState, RequestKey, RequestToken};

/// Where related movies are looked up
#[derive(Debug, Clone)]
enum RelatedSource {
    Catalog(i64),
    Tracker(String),
}

#[derive(Clone)]
pub struct MovieFetchService {
    tracker: Arc<dyn TrackerClient>,
    catalog: Arc<dyn CatalogClient>,
    cache: Arc<dyn LocalMovieCache>,
    executor: TaskExecutor,
}

impl MovieFetchService {
    pub fn new(
        tracker: Arc<dyn TrackerClient>,
        catalog: Arc<dyn CatalogClient>,
        cache: Arc<dyn LocalMovieCache>,
        executor: TaskExecutor,
    ) -> Self {
        Self {
            tracker,
            catalog,
            cache,
            executor,
        }
    }

    // ========================================================================
    // BOOTSTRAP
    // ========================================================================

    /// Image configuration; views render nothing until it is present
    pub fn fetch_configuration_if_needed(&self, state: &mut MoviesState) {
        if state.configuration().is_some() {
            return;
        }
        let Some(token) = state.begin_request(RequestKey::Configuration) else {
            return;
        };

        let catalog = Arc::clone(&self.catalog);
        self.executor.spawn(
            "catalog configuration",
            async move { catalog.fetch_configuration().await },
            move |state, result| {
                state.end_request(token);
                if let Ok(configuration) = result {
                    state.set_configuration(Some(configuration));
                }
            },
        );
    }

    /// Read library and watchlist from the local cache when they are still empty
    pub fn load_cached_collections(&self, state: &mut MoviesState) {
        self.load_cached(state, MovieQueryType::Library);
        self.load_cached(state, MovieQueryType::Watchlist);
    }

    fn load_cached(&self, state: &mut MoviesState, collection: MovieQueryType) {
        if state.is_cache_loaded(collection) {
            return;
        }
        if state.collection(collection).is_some_and(|ids| !ids.is_empty()) {
            state.mark_cache_loaded(collection);
            return;
        }

        let cache = Arc::clone(&self.cache);
        self.executor.spawn(
            "cache load",
            async move {
                match collection {
                    MovieQueryType::Library => cache.get_library().await,
                    _ => cache.get_watchlist().await,
                }
            },
            move |state, result| {
                if let Ok(payloads) = result {
                    let still_empty = state.collection(collection).map_or(true, |ids| ids.is_empty());
                    if still_empty && state.is_logged_in() && !payloads.is_empty() {
                        let ids = state.put_movies(&payloads);
                        log::debug!("Loaded {} cached movies into {}", ids.len(), collection);
                        state.set_collection(collection, Some(ids));
                    }
                }
                state.mark_cache_loaded(collection);
            },
        );
    }

    // ========================================================================
    // TRACKER COLLECTIONS (library, watchlist, trending, recommended)
    // ========================================================================

    /// Recommendations without a session are a caller bug
    pub fn fetch_recommended(&self, state: &mut MoviesState, calling_id: ViewId) -> AppResult<()> {
        self.refetch_logged_in_only(state, calling_id, MovieQueryType::Recommended)
    }

    /// Refetch a collection that has no meaning without a tracker session
    pub fn refetch_logged_in_only(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        collection: MovieQueryType,
    ) -> AppResult<()> {
        if !state.is_logged_in() {
            return Err(AppError::Precondition(format!(
                "{} requires a tracker session",
                collection
            )));
        }
        self.fetch_collection(state, calling_id, collection);
        Ok(())
    }

    pub fn fetch_collection_if_needed(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        collection: MovieQueryType,
    ) {
        let Some(policy) = policy_for(collection) else {
            return;
        };
        let items = state.collection(collection).map(<[Uuid]>::len);
        if policy
            .trigger
            .collection_needs_fetch(items, state.is_cache_loaded(collection))
        {
            self.fetch_collection(state, calling_id, collection);
        } else {
            log::debug!("{} fetch not needed", collection);
        }
    }

    pub fn fetch_collection(&self, state: &mut MoviesState, calling_id: ViewId, collection: MovieQueryType) {
        let username = state.account().map(|a| a.username.clone());
        if requires_login(collection) && username.is_none() {
            log::debug!("Skipping {} fetch: not logged in", collection);
            return;
        }
        let key = RequestKey::Query(collection);
        let Some(token) = state.begin_request(key) else {
            log::debug!("{} fetch already running", collection);
            return;
        };

        state.show_loading(calling_id, true, false);

        let tracker = Arc::clone(&self.tracker);
        let user = username.clone().unwrap_or_default();
        self.executor.spawn(
            "tracker collection",
            async move {
                match collection {
                    MovieQueryType::Library => tracker.fetch_library(&user).await,
                    MovieQueryType::Watchlist => tracker.fetch_watchlist(&user).await,
                    MovieQueryType::Recommended => tracker.fetch_recommendations().await,
                    _ => tracker.fetch_trending().await,
                }
            },
            move |state, result| {
                state.end_request(token);
                state.show_loading(calling_id, false, false);
                if requires_login(collection) && !same_session(state, username.as_deref()) {
                    log::debug!("Dropping {} result from a previous session", collection);
                    return;
                }
                match result {
                    Ok(payloads) => {
                        let ids = state.put_movies(&payloads);
                        state.set_collection(collection, Some(ids));
                    }
                    Err(e) => report_failure(state, calling_id, &e),
                }
            },
        );
    }

    // ========================================================================
    // CATALOG LISTINGS (popular, upcoming, now playing, search)
    // ========================================================================

    pub fn fetch_listing_if_needed(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        listing: MovieQueryType,
    ) {
        let trigger = policy_for(listing).map_or(FetchTrigger::Never, |p| p.trigger);
        let items = state.page(listing).map(|page| page.items.len());
        if trigger.collection_needs_fetch(items, true) {
            self.fetch_page(state, calling_id, listing, None, FIRST_PAGE);
        }
    }

    /// Clear the listing, then request its first page
    pub fn refresh_listing(&self, state: &mut MoviesState, calling_id: ViewId, listing: MovieQueryType) {
        state.set_page(listing, None);
        let token = state.restart_request(RequestKey::Query(listing));
        self.spawn_page(state, calling_id, token, listing, None, FIRST_PAGE);
    }

    pub fn fetch_next_listing_page(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        listing: MovieQueryType,
    ) {
        let next = state
            .page(listing)
            .filter(|page| page.can_fetch_next())
            .map(|page| (page.next_page(), page.query.clone()));
        match next {
            Some((page, query)) => self.fetch_page(state, calling_id, listing, query, page),
            None => log::debug!("No further {} page", listing),
        }
    }

    /// Start a new search. An identical query still restarts from the first page.
    pub fn search(&self, state: &mut MoviesState, calling_id: ViewId, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            self.clear_search(state);
            return;
        }
        state.set_search_query(Some(query.to_string()));
        state.set_search_result(None);
        let token = state.restart_request(RequestKey::Query(MovieQueryType::Search));
        self.spawn_page(
            state,
            calling_id,
            token,
            MovieQueryType::Search,
            Some(query.to_string()),
            FIRST_PAGE,
        );
    }

    pub fn fetch_next_search_page(&self, state: &mut MoviesState, calling_id: ViewId) {
        self.fetch_next_listing_page(state, calling_id, MovieQueryType::Search);
    }

    pub fn clear_search(&self, state: &mut MoviesState) {
        state.set_search_query(None);
        state.set_search_result(None);
    }

    fn fetch_page(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        listing: MovieQueryType,
        query: Option<String>,
        page: u32,
    ) {
        let Some(token) = state.begin_request(RequestKey::Query(listing)) else {
            log::debug!("{} page request already running", listing);
            return;
        };
        self.spawn_page(state, calling_id, token, listing, query, page);
    }

    fn spawn_page(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        token: RequestToken,
        listing: MovieQueryType,
        query: Option<String>,
        page: u32,
    ) {
        let secondary = page > FIRST_PAGE;
        state.show_loading(calling_id, true, secondary);

        let catalog = Arc::clone(&self.catalog);
        let search_query = query.clone().unwrap_or_default();
        self.executor.spawn(
            "catalog listing",
            async move {
                match listing {
                    MovieQueryType::Popular => catalog.fetch_popular(page).await,
                    MovieQueryType::Upcoming => catalog.fetch_upcoming(page).await,
                    MovieQueryType::NowPlaying => catalog.fetch_now_playing(page).await,
                    _ => catalog.search(&search_query, page).await,
                }
            },
            move |state, result| {
                state.show_loading(calling_id, false, secondary);
                if !state.end_request(token) {
                    log::debug!("Dropping superseded {} page {}", listing, page);
                    return;
                }

                if listing == MovieQueryType::Search && state.search_query() != query.as_deref() {
                    log::debug!("Dropping results of a superseded search");
                    return;
                }

                match result {
                    Ok(fetched) => store_page(state, listing, query, fetched),
                    Err(e) => report_failure(state, calling_id, &e),
                }
            },
        );
    }

    // ========================================================================
    // DETAIL
    // ========================================================================

    /// Detail for a movie known to the index. Both providers are asked
    /// independently when eligible.
    pub fn fetch_detail_if_needed(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        movie_id: Uuid,
        force: bool,
    ) {
        let logged_in = state.is_logged_in();
        let Some(movie) = state.movie(movie_id) else {
            log::debug!("Detail requested for unknown movie {}", movie_id);
            return;
        };

        let plan = DetailPlan::for_movie(movie, logged_in, force);
        let tracker_lookup = movie.tracker_lookup_id();
        let catalog_id = movie.catalog_id;

        if let (true, Some(lookup)) = (plan.tracker, tracker_lookup) {
            self.fetch_tracker_detail(state, calling_id, Some(movie_id), lookup);
        }
        if let (true, Some(id)) = (plan.catalog, catalog_id) {
            self.fetch_catalog_detail(state, calling_id, Some(movie_id), id);
        }
    }

    /// Detail for an identifier of unknown namespace (deep link, view parameter).
    ///
    /// Unknown identifiers are resolved through the tracker first.
    pub fn fetch_detail_by_reference(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        reference: &str,
        force: bool,
    ) {
        if let Some(movie_id) = state.find_movie(reference).map(|m| m.id) {
            self.fetch_detail_if_needed(state, calling_id, movie_id, force);
            return;
        }

        let reference = reference.trim();
        if state.is_logged_in() {
            self.fetch_tracker_detail(state, calling_id, None, reference.to_string());
        } else if let Ok(catalog_id) = reference.parse::<i64>() {
            self.fetch_catalog_detail(state, calling_id, None, catalog_id);
        } else {
            log::debug!("Cannot resolve {} without a tracker session", reference);
            state.show_error(calling_id, NetworkError::NotFound(Provider::Catalog));
        }
    }

    fn fetch_tracker_detail(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        movie_id: Option<Uuid>,
        lookup: String,
    ) {
        if !start_full_fetch(state, movie_id, Provider::Tracker, &lookup) {
            return;
        }
        let username = state.account().map(|a| a.username.clone());
        state.show_loading(calling_id, true, false);

        let tracker = Arc::clone(&self.tracker);
        let reference = lookup.clone();
        self.executor.spawn(
            "tracker detail",
            async move { tracker.fetch_detail(&lookup).await },
            move |state, result| {
                state.show_loading(calling_id, false, false);
                if !same_session(state, username.as_deref()) {
                    return;
                }
                if movie_id.is_none() {
                    state.end_lookup(Provider::Tracker, &reference);
                }
                let movie_id = current_target(state, movie_id, |state| {
                    state.find_movie(&reference).map(|m| m.id)
                });
                match result {
                    Ok(payload) => {
                        store_detail(state, calling_id, movie_id, Provider::Tracker, payload);
                    }
                    Err(e) => {
                        fail_full_fetch(state, movie_id, Provider::Tracker);
                        report_failure(state, calling_id, &e);
                    }
                }
            },
        );
    }

    fn fetch_catalog_detail(
        &self,
        state: &mut MoviesState,
        calling_id: ViewId,
        movie_id: Option<Uuid>,
        catalog_id: i64,
    ) {
        let reference = catalog_id.to_string();
        if !start_full_fetch(state, movie_id, Provider::Catalog, &reference) {
            return;
        }
        state.show_loading(calling_id, true, false);

        let catalog = Arc::clone(&self.catalog);
        let this = self.clone();
        self.executor.spawn(
            "catalog detail",
            async move { catalog.fetch_detail(catalog_id).await },
            move |state, result| {
                state.show_loading(calling_id, false, false);
                if movie_id.is_none() {
                    state.end_lookup(Provider::Catalog, &reference);
                }
                let movie_id = current_target(state, movie_id, |state| {
                    state.movie_by(MovieKey::Catalog(catalog_id)).map(|m| m.id)
                });
                match result {
                    Ok(payload) => {
                        if let Some(id) =
                            store_detail(state, calling_id, movie_id, Provider::Catalog, payload)
                        {
                            this.fetch_trailers_if_needed(state, calling_id, id);
                        }
                    }
                    Err(e) => {
                        fail_full_fetch(state, movie_id, Provider::Catalog);
                        report_failure(state, calling_id, &e);
                    }
                }
            },
        );
    }

    /// Trailers ride along with a catalog detail; failures are only logged
    pub fn fetch_trailers_if_needed(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid) {
        let Some(catalog_id) = state
            .movie(movie_id)
            .filter(|m| m.trailers.is_empty())
            .and_then(|m| m.catalog_id)
        else {
            return;
        };
        let key = RequestKey::Trailers(movie_id);
        let Some(token) = state.begin_request(key) else {
            return;
        };

        let catalog = Arc::clone(&self.catalog);
        self.executor.spawn(
            "catalog trailers",
            async move { catalog.fetch_trailers(catalog_id).await },
            move |state, result| {
                state.end_request(token);
                if let Ok(trailers) = result {
                    if !trailers.is_empty() {
                        state.set_trailers(movie_id, trailers);
                        state.movie_information_updated(calling_id, movie_id);
                    }
                }
            },
        );
    }

    // ========================================================================
    // SUB-LISTS (related, cast)
    // ========================================================================

    /// Related movies come from the catalog when its id is known, else from the tracker
    pub fn fetch_related_if_needed(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid) {
        let Some(movie) = state.movie(movie_id) else {
            return;
        };
        if !movie.related.is_empty() {
            return;
        }
        let source = match (movie.catalog_id, movie.tracker_id.clone()) {
            (Some(id), _) => RelatedSource::Catalog(id),
            (None, Some(id)) => RelatedSource::Tracker(id),
            (None, None) => return,
        };
        let key = RequestKey::Related(movie_id);
        let Some(token) = state.begin_request(key) else {
            return;
        };

        state.show_loading(calling_id, true, false);

        let catalog = Arc::clone(&self.catalog);
        let tracker = Arc::clone(&self.tracker);
        self.executor.spawn(
            "related movies",
            async move {
                match source {
                    RelatedSource::Catalog(id) => catalog.fetch_related(id).await,
                    RelatedSource::Tracker(id) => tracker.fetch_related(&id).await,
                }
            },
            move |state, result| {
                state.end_request(token);
                state.show_loading(calling_id, false, false);
                match result {
                    Ok(payloads) => {
                        let mut ids = state.put_movies(&payloads);
                        ids.retain(|id| *id != movie_id);
                        if !ids.is_empty() {
                            state.set_related(movie_id, ids);
                            state.movie_information_updated(calling_id, movie_id);
                        }
                    }
                    Err(e) => report_failure(state, calling_id, &e),
                }
            },
        );
    }

    pub fn fetch_cast_if_needed(&self, state: &mut MoviesState, calling_id: ViewId, movie_id: Uuid) {
        let Some(catalog_id) = state
            .movie(movie_id)
            .filter(|m| m.cast.is_empty())
            .and_then(|m| m.catalog_id)
        else {
            return;
        };
        let key = RequestKey::Cast(movie_id);
        let Some(token) = state.begin_request(key) else {
            return;
        };

        state.show_loading(calling_id, true, false);

        let catalog = Arc::clone(&self.catalog);
        self.executor.spawn(
            "catalog cast",
            async move { catalog.fetch_cast(catalog_id).await },
            move |state, result| {
                state.end_request(token);
                state.show_loading(calling_id, false, false);
                match result {
                    Ok(mut cast) => {
                        if !cast.is_empty() {
                            cast.sort_by_key(|member| member.order);
                            state.set_cast(movie_id, cast);
                            state.movie_information_updated(calling_id, movie_id);
                        }
                    }
                    Err(e) => report_failure(state, calling_id, &e),
                }
            },
        );
    }
}

impl std::fmt::Debug for MovieFetchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieFetchService")
            .field("executor", &self.executor)
            .finish()
    }
}

// ============================================================================
// COMPLETION HELPERS
// ============================================================================

/// Errors reach the originating view; precondition failures only reach the log
pub(crate) fn report_failure(state: &MoviesState, calling_id: ViewId, error: &AppError) {
    if error.is_precondition() {
        log::error!("{}", error);
        return;
    }
    state.show_error(calling_id, error.network_error());
}

/// A tracker result belongs to the session that requested it
pub(crate) fn same_session(state: &MoviesState, username: Option<&str>) -> bool {
    state.account().map(|a| a.username.as_str()) == username
}

/// Claim the fetch: the entity's in-flight marker, or a lookup slot for an unknown reference
fn start_full_fetch(
    state: &mut MoviesState,
    movie_id: Option<Uuid>,
    provider: Provider,
    reference: &str,
) -> bool {
    let Some(id) = movie_id else {
        if state.begin_lookup(provider, reference) {
            return true;
        }
        log::debug!("{} lookup of {} already in flight", provider, reference);
        return false;
    };
    let Some(movie) = state.movie_mut(id) else {
        return true;
    };
    if movie.mark_full_fetch_started(provider) {
        true
    } else {
        log::debug!("{} detail for {} already in flight", provider, movie);
        false
    }
}

/// The entity a detail completion belongs to now. A merge while the fetch was running
/// may have folded the requested entity into another one.
fn current_target(
    state: &MoviesState,
    movie_id: Option<Uuid>,
    by_provider_id: impl FnOnce(&MoviesState) -> Option<Uuid>,
) -> Option<Uuid> {
    let requested = movie_id?;
    if state.movie(requested).is_some() {
        return Some(requested);
    }
    by_provider_id(state).or(Some(requested))
}

fn fail_full_fetch(state: &mut MoviesState, movie_id: Option<Uuid>, provider: Provider) {
    if let Some(movie) = movie_id.and_then(|id| state.movie_mut(id)) {
        movie.mark_full_fetch_failed(provider);
    }
}

/// Merge a detail payload into the entity it was requested for
fn store_detail(
    state: &mut MoviesState,
    calling_id: ViewId,
    movie_id: Option<Uuid>,
    provider: Provider,
    mut payload: MoviePayload,
) -> Option<Uuid> {
    payload.source = Some(provider);
    payload.detail = true;
    if let Some(requested) = movie_id.and_then(|id| state.movie(id)) {
        if payload.tracker_id.is_none() {
            payload.tracker_id = requested.tracker_id.clone();
        }
        if payload.catalog_id.is_none() {
            payload.catalog_id = requested.catalog_id;
        }
    }

    match state.put_movie(&payload) {
        Ok(id) => {
            state.movie_information_updated(calling_id, id);
            Some(id)
        }
        Err(e) => {
            fail_full_fetch(state, movie_id, provider);
            report_failure(state, calling_id, &e);
            None
        }
    }
}

fn store_page(
    state: &mut MoviesState,
    listing: MovieQueryType,
    query: Option<String>,
    fetched: PaginatedResult<MoviePayload>,
) {
    let ids = state.put_movies(&fetched.items);
    let mut page = PaginatedResult::new(ids, fetched.page, fetched.total_pages);
    page.query = query;

    let merged = match state.page(listing).cloned() {
        Some(current) if page.page > FIRST_PAGE => {
            if current.page + 1 != page.page {
                log::debug!(
                    "Dropping {} page {} (have page {})",
                    listing,
                    page.page,
                    current.page
                );
                return;
            }
            current.append(page)
        }
        None if page.page > FIRST_PAGE => {
            log::debug!("Dropping {} page {} after a reset", listing, page.page);
            return;
        }
        _ => page,
    };
    state.set_page(listing, Some(merged));
}
