// src/application/views.rs
//
// Presentation Surface Contracts
//
// Every surface implements the base `MovieView`; what it can render is exposed through
// optional capability accessors instead of an inheritance chain.
//
// CRITICAL RULES:
// - Views only receive data; they never reach into the store
// - A view answers None for every capability it does not have

use crate::application::dto::{DetailCapabilities, DiscoverTab, MovieOperation};
use crate::domain::{CastMember, FilterSet, Movie, MovieQueryType};
use crate::error::NetworkError;
use crate::services::ListItem;

/// Base contract shared by all presentation surfaces
pub trait MovieView: Send {
    fn query_type(&self) -> MovieQueryType;

    /// Movie reference for entity views (tracker id, catalog id or internal id)
    fn request_parameter(&self) -> Option<String> {
        None
    }

    fn show_error(&mut self, error: NetworkError);

    fn show_loading(&mut self, show: bool);

    fn show_secondary_loading(&mut self, _show: bool) {}

    // ========================================================================
    // CAPABILITIES
    // ========================================================================

    fn as_list(&mut self) -> Option<&mut dyn MovieListView> {
        None
    }

    fn as_search(&mut self) -> Option<&mut dyn SearchView> {
        None
    }

    fn as_cast_list(&mut self) -> Option<&mut dyn CastListView> {
        None
    }

    fn as_detail(&mut self) -> Option<&mut dyn MovieDetailView> {
        None
    }

    fn as_rate(&mut self) -> Option<&mut dyn MovieRateView> {
        None
    }

    fn as_discover(&mut self) -> Option<&mut dyn DiscoverView> {
        None
    }

    fn as_checkin(&mut self) -> Option<&mut dyn CheckinView> {
        None
    }
}

/// Renders a (possibly sectioned) list of movies
pub trait MovieListView {
    /// `None` means the collection was not fetched yet
    fn set_items(&mut self, items: Option<Vec<ListItem<Movie>>>);

    fn set_filters_visible(&mut self, visible: bool);

    fn show_active_filters(&mut self, filters: &FilterSet);

    fn allow_batch_operations(&mut self, operations: &[MovieOperation]);

    fn disable_batch_operations(&mut self);
}

/// A list view fed by a free-text query
pub trait SearchView {
    fn set_query(&mut self, query: Option<&str>);
}

pub trait CastListView {
    fn set_title(&mut self, title: Option<&str>);

    fn set_cast(&mut self, items: Vec<ListItem<CastMember>>);
}

pub trait MovieDetailView {
    fn set_movie(&mut self, movie: &Movie);

    fn set_capabilities(&mut self, capabilities: DetailCapabilities);
}

pub trait MovieRateView {
    fn set_movie(&mut self, movie: &Movie);

    fn set_mark_watched_visible(&mut self, visible: bool);
}

pub trait DiscoverView {
    fn set_tabs(&mut self, tabs: &[DiscoverTab]);
}

pub trait CheckinView {
    fn set_movie(&mut self, movie: &Movie);
}
