// src/application/controller.rs
//
// View Controller
//
// Keeps the registry of attached views and renders store state into them.
//
// CRITICAL RULES:
// - Rendering reads the store, it never mutates it
// - Only attached views are rendered or signalled
// - Login-gated views render Unauthorized while logged out
// - Nothing is rendered before the catalog configuration arrives

use chrono::Utc;
use std::collections::BTreeMap;

use crate::application::dto::{DetailCapabilities, DiscoverTab, MovieOperation};
use crate::application::views::{MovieListView, MovieView};
use crate::config::FilterConfig;
use crate::domain::{FilterContext, Movie, MovieQueryType, ViewId};
use crate::error::{AppError, AppResult, NetworkError};
use crate::events::EventScope;
use crate::services::fetch_policy::requires_login;
use crate::services::projection::{filter_movies, flat, sectioned, ListHeader, ListItem, SectionSpec};
use crate::state::MoviesState;

pub struct MovieController {
    views: BTreeMap<ViewId, Box<dyn MovieView>>,
    filters: FilterConfig,
}

impl MovieController {
    pub fn new(filters: FilterConfig) -> Self {
        Self {
            views: BTreeMap::new(),
            filters,
        }
    }

    // ========================================================================
    // REGISTRY
    // ========================================================================

    pub fn attach(&mut self, id: ViewId, view: Box<dyn MovieView>) -> AppResult<()> {
        if id.is_background() {
            return Err(AppError::Precondition(
                "the background id cannot be attached".to_string(),
            ));
        }
        if self.views.contains_key(&id) {
            return Err(AppError::Precondition(format!("{} is already attached", id)));
        }
        log::debug!("Attached {} ({})", id, view.query_type());
        self.views.insert(id, view);
        Ok(())
    }

    /// Returns the view; work it started keeps running
    pub fn detach(&mut self, id: ViewId) -> Option<Box<dyn MovieView>> {
        let view = self.views.remove(&id);
        if view.is_some() {
            log::debug!("Detached {}", id);
        }
        view
    }

    pub fn is_attached(&self, id: ViewId) -> bool {
        self.views.contains_key(&id)
    }

    pub fn query_type(&self, id: ViewId) -> Option<MovieQueryType> {
        self.views.get(&id).map(|v| v.query_type())
    }

    pub fn request_parameter(&self, id: ViewId) -> Option<String> {
        self.views.get(&id).and_then(|v| v.request_parameter())
    }

    /// Attached views with their query types, in attach-id order
    pub fn attached(&self) -> Vec<(ViewId, MovieQueryType)> {
        self.views
            .iter()
            .map(|(id, view)| (*id, view.query_type()))
            .collect()
    }

    pub fn first_attached(&self, query_type: MovieQueryType) -> Option<ViewId> {
        self.views
            .iter()
            .find(|(_, view)| view.query_type() == query_type)
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    // ========================================================================
    // SIGNALS
    // ========================================================================

    pub fn show_error(&mut self, id: ViewId, error: NetworkError) {
        match self.views.get_mut(&id) {
            Some(view) => view.show_error(error),
            None => log::debug!("Dropping {} for detached {}", error, id),
        }
    }

    pub fn show_loading(&mut self, id: ViewId, show: bool, secondary: bool) {
        if let Some(view) = self.views.get_mut(&id) {
            if secondary {
                view.show_secondary_loading(show);
            } else {
                view.show_loading(show);
            }
        }
    }

    // ========================================================================
    // RENDERING
    // ========================================================================

    pub fn populate(&mut self, state: &MoviesState, id: ViewId) {
        let ctx = self.filter_context();
        if let Some(view) = self.views.get_mut(&id) {
            render(&mut **view, state, &ctx);
        }
    }

    pub fn populate_scope(&mut self, state: &MoviesState, scope: EventScope) {
        let ctx = self.filter_context();
        for (id, view) in self.views.iter_mut() {
            if scope.includes(*id, view.query_type()) {
                render(&mut **view, state, &ctx);
            }
        }
    }

    pub fn populate_all(&mut self, state: &MoviesState) {
        self.populate_scope(state, EventScope::AllViews);
    }

    fn filter_context(&self) -> FilterContext {
        self.filters.context(Utc::now())
    }
}

impl std::fmt::Debug for MovieController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieController")
            .field("views", &self.attached())
            .field("filters", &self.filters)
            .finish()
    }
}

fn render(view: &mut dyn MovieView, state: &MoviesState, ctx: &FilterContext) {
    let query_type = view.query_type();
    if requires_login(query_type) && !state.is_logged_in() {
        view.show_error(NetworkError::Unauthorized);
        return;
    }
    if state.configuration().is_none() {
        log::debug!("Catalog configuration not loaded yet, deferring {}", query_type);
        return;
    }

    let parameter = view.request_parameter();
    let movie = parameter.as_deref().and_then(|p| state.find_movie(p));

    if let Some(search) = view.as_search() {
        search.set_query(state.search_result().and_then(|r| r.query.as_deref()));
    }

    if let Some(list) = view.as_list() {
        render_list(list, query_type, movie, state, ctx);
    } else if let Some(cast_list) = view.as_cast_list() {
        if let Some(movie) = movie.filter(|_| query_type == MovieQueryType::Cast) {
            cast_list.set_title(movie.title.as_deref());
            if !movie.cast.is_empty() {
                cast_list.set_cast(flat(
                    Some(ListHeader::Query(MovieQueryType::Cast)),
                    movie.cast.iter().cloned(),
                ));
            }
        }
    } else if let Some(detail) = view.as_detail() {
        if let Some(movie) = movie {
            detail.set_capabilities(DetailCapabilities::for_movie(state.is_logged_in(), movie));
            detail.set_movie(movie);
        }
    } else if let Some(rate) = view.as_rate() {
        if let Some(movie) = movie {
            rate.set_movie(movie);
            rate.set_mark_watched_visible(!movie.watched);
        }
    } else if let Some(discover) = view.as_discover() {
        discover.set_tabs(&DiscoverTab::for_session(state.is_logged_in()));
    } else if let Some(checkin) = view.as_checkin() {
        if let Some(movie) = movie {
            checkin.set_movie(movie);
        }
    }
}

fn render_list(
    list: &mut dyn MovieListView,
    query_type: MovieQueryType,
    movie: Option<&Movie>,
    state: &MoviesState,
    ctx: &FilterContext,
) {
    let logged_in = state.is_logged_in();

    let mut require_filtering = false;
    if logged_in {
        if query_type.supports_filtering() {
            list.set_filters_visible(true);
            list.show_active_filters(state.filters());
            require_filtering = !state.filters().is_empty();
        }
    } else {
        list.set_filters_visible(false);
    }

    let (ids, header) = match query_type {
        MovieQueryType::Related => (
            movie.map(|m| m.related.as_slice()),
            Some(ListHeader::Query(MovieQueryType::Related)),
        ),
        q if q.is_paginated() => (state.page(q).map(|page| page.items.as_slice()), None),
        q => (state.collection(q), None),
    };
    let Some(ids) = ids else {
        list.set_items(None);
        return;
    };

    let mut movies = state.movies(ids);
    if require_filtering && !movies.is_empty() {
        movies = filter_movies(&movies, state.filters(), ctx);
    }

    match SectionSpec::for_query(query_type) {
        Some(spec) => list.set_items(Some(owned(sectioned(&movies, &spec, ctx)))),
        None => {
            list.set_items(Some(owned(flat(header, movies))));
            if logged_in {
                list.allow_batch_operations(&MovieOperation::BATCH);
            } else {
                list.disable_batch_operations();
            }
        }
    }
}

fn owned(items: Vec<ListItem<&Movie>>) -> Vec<ListItem<Movie>> {
    items.into_iter().map(|item| item.map(Movie::clone)).collect()
}
