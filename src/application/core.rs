// src/application/core.rs
//
// Core Runtime - the serialized context
//
// CRITICAL RULES:
// - MovieCore (store, services, controller) is touched only by CoreRuntime's loop
// - Everything else talks to it through CoreHandle commands
// - Store notifications reach the controller as queued commands, after the current dispatch
// - Worker completions are queued the same way

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::application::controller::MovieController;
use crate::application::intents::MovieIntent;
use crate::application::views::MovieView;
use crate::config::CoreConfig;
use crate::domain::{MovieQueryType, ViewId};
use crate::error::{AppError, AppResult};
use crate::events::{
    AccountChanged, CacheLoaded, CatalogConfigurationChanged, EventBus, FiltersChanged,
    InTheatresChanged, LibraryChanged, MovieFlagsUpdated, MovieInformationUpdated,
    MovieUserRatingChanged, PopularChanged, RecommendedChanged, SearchResultChanged, ShowError,
    ShowLoadingProgress, StateEvent, TrendingChanged, UpcomingChanged, WatchingChanged,
    WatchlistChanged,
};
use crate::integrations::{CatalogClient, LocalMovieCache, TrackerClient};
use crate::services::fetch_policy::{policy_for, CouplingRule, FetchTrigger, RefreshRule};
use crate::services::tasks::{CompletionSink, StateUpdate, TaskExecutor};
use crate::services::{MovieFetchService, MovieWriteService};
use crate::state::{Account, MoviesState};

/// Work to run on the serialized context
pub type CoreCommand = Box<dyn FnOnce(&mut MovieCore) + Send>;

// ============================================================================
// CORE
// ============================================================================

pub struct MovieCore {
    state: MoviesState,
    fetch: MovieFetchService,
    write: MovieWriteService,
    controller: MovieController,
    shut_down: bool,
}

impl MovieCore {
    pub fn new(
        state: MoviesState,
        fetch: MovieFetchService,
        write: MovieWriteService,
        controller: MovieController,
    ) -> Self {
        Self {
            state,
            fetch,
            write,
            controller,
            shut_down: false,
        }
    }

    pub fn state(&self) -> &MoviesState {
        &self.state
    }

    pub fn controller(&self) -> &MovieController {
        &self.controller
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Catalog configuration and the local cache, both only when missing
    pub fn init(&mut self) {
        log::info!("Initializing movie core");
        self.fetch.fetch_configuration_if_needed(&mut self.state);
        self.fetch.load_cached_collections(&mut self.state);
    }

    pub fn shutdown(&mut self) {
        log::info!("Shutting down movie core ({} views attached)", self.controller.len());
        self.shut_down = true;
    }

    /// Attach-time fetch policy first, then render whatever is already there
    pub fn attach(&mut self, id: ViewId, view: Box<dyn MovieView>) -> AppResult<()> {
        self.controller.attach(id, view)?;
        self.fetch_if_needed(id);
        self.controller.populate(&self.state, id);
        Ok(())
    }

    pub fn detach(&mut self, id: ViewId) {
        self.controller.detach(id);
    }

    /// A new identity tears the old session state down before it is announced
    pub fn set_account(&mut self, account: Option<Account>) {
        if self.state.account() == account.as_ref() {
            return;
        }
        log::info!(
            "Tracker session {}",
            if account.is_some() { "established" } else { "closed" }
        );
        self.state.reset_session_state();
        self.state.set_account(account);
    }

    // ========================================================================
    // FETCH POLICY PER VIEW
    // ========================================================================

    fn fetch_if_needed(&mut self, id: ViewId) {
        let Some(query_type) = self.controller.query_type(id) else {
            return;
        };
        let Some(policy) = policy_for(query_type) else {
            return;
        };
        if policy.requires_login && !self.state.is_logged_in() {
            log::debug!("Not fetching {} for {}: logged out", query_type, id);
            return;
        }
        let parameter = self.controller.request_parameter(id);
        let state = &mut self.state;

        match policy.trigger {
            FetchTrigger::EmptyAfterCacheLoad | FetchTrigger::Empty => {
                self.fetch.fetch_collection_if_needed(state, id, query_type)
            }
            FetchTrigger::EmptyFirstPage => self.fetch.fetch_listing_if_needed(state, id, query_type),
            FetchTrigger::EntityNeedsFullFetch => {
                if let Some(reference) = parameter {
                    self.fetch.fetch_detail_by_reference(state, id, &reference, false);
                }
            }
            FetchTrigger::SubListEmpty => {
                let Some(reference) = parameter else {
                    return;
                };
                match state.find_movie(&reference).map(|m| m.id) {
                    Some(movie_id) => self.fetch_sub_list(id, query_type, movie_id),
                    None => self.fetch.fetch_detail_by_reference(state, id, &reference, false),
                }
            }
            FetchTrigger::Never => log::debug!("{} is only fetched on request", query_type),
        }
    }

    fn fetch_sub_list(&mut self, id: ViewId, query_type: MovieQueryType, movie_id: Uuid) {
        match query_type {
            MovieQueryType::Related => self.fetch.fetch_related_if_needed(&mut self.state, id, movie_id),
            MovieQueryType::Cast => self.fetch.fetch_cast_if_needed(&mut self.state, id, movie_id),
            _ => {}
        }
    }

    /// Id to report prefetch progress to: an attached view of that type, or nobody
    fn calling_id_for(&self, query_type: MovieQueryType) -> ViewId {
        self.controller
            .first_attached(query_type)
            .unwrap_or(ViewId::BACKGROUND)
    }

    fn prefetch(&mut self, collection: MovieQueryType) {
        if !self.state.is_logged_in() {
            return;
        }
        let id = self.calling_id_for(collection);
        self.fetch.fetch_collection_if_needed(&mut self.state, id, collection);
    }

    // ========================================================================
    // INTENTS
    // ========================================================================

    pub fn handle_intent(&mut self, id: ViewId, intent: MovieIntent) {
        let Some(query_type) = self.controller.query_type(id) else {
            log::debug!("Ignoring {:?} from detached {}", intent, id);
            return;
        };
        log::debug!("{} ({}) -> {:?}", id, query_type, intent);

        let state = &mut self.state;
        match intent {
            MovieIntent::AddFilter(filter) => {
                state.add_filter(filter);
            }
            MovieIntent::RemoveFilter(filter) => {
                state.remove_filter(filter);
            }
            MovieIntent::ClearFilters => {
                state.clear_filters();
            }
            MovieIntent::Refresh => self.refresh(id, query_type),
            MovieIntent::ToggleSeen(movie) => self.write.toggle_seen(state, id, movie),
            MovieIntent::ToggleWatchlist(movie) => self.write.toggle_watchlist(state, id, movie),
            MovieIntent::ToggleCollection(movie) => self.write.toggle_collection(state, id, movie),
            MovieIntent::SetSeen { movies, seen } => {
                self.write.set_movies_seen(state, id, &movies, seen)
            }
            MovieIntent::SetInWatchlist {
                movies,
                in_watchlist,
            } => self.write.set_movies_in_watchlist(state, id, &movies, in_watchlist),
            MovieIntent::SetInCollection {
                movies,
                in_collection,
            } => self.write.set_movies_in_collection(state, id, &movies, in_collection),
            MovieIntent::Search(query) => self.fetch.search(state, id, &query),
            MovieIntent::ClearSearch => self.fetch.clear_search(state),
            MovieIntent::SubmitRating { movie, rating } => {
                self.write.submit_rating(state, id, movie, rating)
            }
            MovieIntent::ScrolledToBottom => match query_type {
                MovieQueryType::Popular | MovieQueryType::Upcoming | MovieQueryType::NowPlaying => {
                    self.fetch.fetch_next_listing_page(state, id, query_type)
                }
                MovieQueryType::Search => self.fetch.fetch_next_search_page(state, id),
                _ => {}
            },
            MovieIntent::CheckIn { movie, message } => self.write.check_in(state, id, movie, &message),
        }
    }

    fn refresh(&mut self, id: ViewId, query_type: MovieQueryType) {
        let Some(policy) = policy_for(query_type) else {
            return;
        };
        let state = &mut self.state;
        match policy.refresh {
            RefreshRule::Refetch => self.fetch.fetch_collection(state, id, query_type),
            RefreshRule::RestartFromFirstPage => self.fetch.refresh_listing(state, id, query_type),
            RefreshRule::RefetchLoggedInOnly => {
                if let Err(e) = self.fetch.refetch_logged_in_only(state, id, query_type) {
                    log::error!("{}", e);
                }
            }
            RefreshRule::Force => {
                if let Some(reference) = self.controller.request_parameter(id) {
                    self.fetch.fetch_detail_by_reference(state, id, &reference, true);
                }
            }
            RefreshRule::NewQuery => {
                if let Some(query) = state.search_query().map(str::to_string) {
                    self.fetch.search(state, id, &query);
                }
            }
            RefreshRule::Unsupported => log::debug!("{} has no refresh", query_type),
        }
    }

    // ========================================================================
    // STORE NOTIFICATIONS
    // ========================================================================

    fn on_collection_changed<E: StateEvent>(&mut self, event: &E) {
        self.controller.populate_scope(&self.state, event.scope());
    }

    fn on_configuration_changed(&mut self, _event: &CatalogConfigurationChanged) {
        self.controller.populate_all(&self.state);
    }

    fn on_account_changed(&mut self, event: &AccountChanged) {
        self.controller.populate_all(&self.state);
        for (id, _) in self.controller.attached() {
            self.fetch_if_needed(id);
        }
        if event.logged_in {
            self.prefetch(MovieQueryType::Library);
            self.prefetch(MovieQueryType::Watchlist);
        }
    }

    fn on_cache_loaded(&mut self, event: &CacheLoaded) {
        self.prefetch(event.collection);
    }

    fn on_flags_updated(&mut self, event: &MovieFlagsUpdated) {
        let origin = self.controller.query_type(event.calling_id);
        if CouplingRule::refetch_recommended_on_flag_change(origin) {
            log::debug!("Applying {}", CouplingRule::RefetchRecommendedOnFlagChange);
            if let Err(e) = self.fetch.fetch_recommended(&mut self.state, event.calling_id) {
                log::error!("{}", e);
            }
        }
        self.controller.populate_scope(&self.state, event.scope());
    }

    fn on_information_updated(&mut self, event: &MovieInformationUpdated) {
        self.controller.populate_scope(&self.state, event.scope());

        // Results chain into whatever the calling view still lacks
        match self.controller.query_type(event.calling_id) {
            Some(MovieQueryType::Detail) => {
                self.fetch
                    .fetch_detail_if_needed(&mut self.state, event.calling_id, event.movie_id, false);
            }
            Some(query_type @ (MovieQueryType::Related | MovieQueryType::Cast)) => {
                self.fetch_sub_list(event.calling_id, query_type, event.movie_id);
            }
            _ => {}
        }
    }

    fn on_rating_changed(&mut self, event: &MovieUserRatingChanged) {
        self.controller.populate_scope(&self.state, event.scope());
    }

    fn on_watching_changed(&mut self, event: &WatchingChanged) {
        if let Some(movie_id) = event.movie_id {
            self.fetch
                .fetch_detail_if_needed(&mut self.state, ViewId::BACKGROUND, movie_id, false);
        }
        self.controller.populate_scope(&self.state, event.scope());
    }

    fn on_show_error(&mut self, event: &ShowError) {
        self.controller.show_error(event.calling_id, event.error);
    }

    fn on_show_loading(&mut self, event: &ShowLoadingProgress) {
        self.controller
            .show_loading(event.calling_id, event.show, event.secondary);
    }
}

impl std::fmt::Debug for MovieCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieCore")
            .field("controller", &self.controller)
            .field("logged_in", &self.state.is_logged_in())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

// ============================================================================
// HANDLER REGISTRATION
// ============================================================================

/// Forward every store notification to the core as a queued command
pub fn register_controller_handlers(bus: &EventBus, handle: &CoreHandle) {
    forward::<LibraryChanged>(bus, handle, MovieCore::on_collection_changed);
    forward::<WatchlistChanged>(bus, handle, MovieCore::on_collection_changed);
    forward::<TrendingChanged>(bus, handle, MovieCore::on_collection_changed);
    forward::<PopularChanged>(bus, handle, MovieCore::on_collection_changed);
    forward::<InTheatresChanged>(bus, handle, MovieCore::on_collection_changed);
    forward::<UpcomingChanged>(bus, handle, MovieCore::on_collection_changed);
    forward::<RecommendedChanged>(bus, handle, MovieCore::on_collection_changed);
    forward::<SearchResultChanged>(bus, handle, MovieCore::on_collection_changed);
    forward::<FiltersChanged>(bus, handle, MovieCore::on_collection_changed);

    forward::<CatalogConfigurationChanged>(bus, handle, MovieCore::on_configuration_changed);
    forward::<AccountChanged>(bus, handle, MovieCore::on_account_changed);
    forward::<CacheLoaded>(bus, handle, MovieCore::on_cache_loaded);

    forward::<MovieFlagsUpdated>(bus, handle, MovieCore::on_flags_updated);
    forward::<MovieInformationUpdated>(bus, handle, MovieCore::on_information_updated);
    forward::<MovieUserRatingChanged>(bus, handle, MovieCore::on_rating_changed);
    forward::<WatchingChanged>(bus, handle, MovieCore::on_watching_changed);

    forward::<ShowError>(bus, handle, MovieCore::on_show_error);
    forward::<ShowLoadingProgress>(bus, handle, MovieCore::on_show_loading);

    log::debug!("Controller handlers registered");
}

fn forward<E: StateEvent>(bus: &EventBus, handle: &CoreHandle, react: fn(&mut MovieCore, &E)) {
    let handle = handle.clone();
    bus.subscribe::<E, _>(move |event| {
        let event = event.clone();
        handle.dispatch(move |core| react(core, &event));
    });
}

// ============================================================================
// HANDLE
// ============================================================================

/// Cloneable entry point to the serialized context
#[derive(Clone)]
pub struct CoreHandle {
    tx: mpsc::UnboundedSender<CoreCommand>,
    next_view: Arc<AtomicU32>,
}

impl CoreHandle {
    pub fn dispatch(&self, command: impl FnOnce(&mut MovieCore) + Send + 'static) {
        if self.tx.send(Box::new(command)).is_err() {
            log::warn!("Core runtime stopped, command dropped");
        }
    }

    /// Allocate an id for `view` and attach it
    pub fn attach(&self, view: Box<dyn MovieView>) -> ViewId {
        let id = ViewId(self.next_view.fetch_add(1, Ordering::SeqCst));
        self.dispatch(move |core| {
            if let Err(e) = core.attach(id, view) {
                log::error!("{}", e);
            }
        });
        id
    }

    pub fn detach(&self, id: ViewId) {
        self.dispatch(move |core| core.detach(id));
    }

    pub fn intent(&self, id: ViewId, intent: MovieIntent) {
        self.dispatch(move |core| core.handle_intent(id, intent));
    }

    pub fn set_account(&self, account: Option<Account>) {
        self.dispatch(move |core| core.set_account(account));
    }

    pub fn init(&self) {
        self.dispatch(MovieCore::init);
    }

    pub fn shutdown(&self) {
        self.dispatch(MovieCore::shutdown);
    }

    /// Read from the core once the commands queued before this one have run
    pub async fn query<T, F>(&self, read: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&MovieCore) -> T + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.dispatch(move |core| {
            let _ = reply.send(read(core));
        });
        response
            .await
            .map_err(|_| AppError::Other("core runtime stopped".to_string()))
    }
}

impl CompletionSink for CoreHandle {
    fn submit(&self, update: StateUpdate) {
        self.dispatch(move |core| update(&mut core.state));
    }
}

impl std::fmt::Debug for CoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

// ============================================================================
// RUNTIME
// ============================================================================

pub struct CoreRuntime {
    core: MovieCore,
    rx: mpsc::UnboundedReceiver<CoreCommand>,
    executor: TaskExecutor,
}

impl CoreRuntime {
    /// Wire store, services and controller around one command queue
    pub fn new(
        config: CoreConfig,
        tracker: Arc<dyn TrackerClient>,
        catalog: Arc<dyn CatalogClient>,
        cache: Arc<dyn LocalMovieCache>,
    ) -> (Self, CoreHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = CoreHandle {
            tx,
            next_view: Arc::new(AtomicU32::new(1)),
        };

        let executor = TaskExecutor::new(Arc::new(handle.clone()));
        let bus = EventBus::new();
        register_controller_handlers(&bus, &handle);

        let fetch = MovieFetchService::new(Arc::clone(&tracker), catalog, cache, executor.clone());
        let write = MovieWriteService::new(tracker, executor.clone(), config.preferences.clone());
        let controller = MovieController::new(config.filters.clone());
        let core = MovieCore::new(MoviesState::new(bus), fetch, write, controller);

        (Self { core, rx, executor }, handle)
    }

    pub fn core(&self) -> &MovieCore {
        &self.core
    }

    /// Process commands until shutdown
    pub async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            command(&mut self.core);
            if self.core.is_shut_down() {
                break;
            }
        }
        log::info!("Core runtime stopped");
    }

    /// Process commands until none are queued and no task is in flight
    pub async fn run_until_idle(&mut self) {
        loop {
            // Sampled first: a task submits its completion before it stops counting
            let idle = self.executor.in_flight() == 0;
            match self.rx.try_recv() {
                Ok(command) => command(&mut self.core),
                Err(mpsc::error::TryRecvError::Empty) if idle => break,
                Err(mpsc::error::TryRecvError::Empty) => tokio::task::yield_now().await,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }
    }
}

impl std::fmt::Debug for CoreRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreRuntime")
            .field("core", &self.core)
            .field("executor", &self.executor)
            .finish()
    }
}
