// src/application/mod.rs
//
// Application Layer
//
// ARCHITECTURE:
// - Sits above the store and the services
// - Owns the view registry and the serialized command loop
// - Views talk to it through intents only

pub mod controller;
pub mod core;
pub mod dto;
pub mod intents;
pub mod views;


pub use self::core::{register_controller_handlers, CoreCommand, CoreHandle, CoreRuntime, MovieCore};
pub use controller::MovieController;
pub use dto::{DetailCapabilities, DiscoverTab, MovieOperation};
pub use intents::MovieIntent;
pub use views::{
    CastListView, CheckinView, DiscoverView, MovieDetailView, MovieListView, MovieRateView,
    MovieView, SearchView,
};
