// src/services/mod.rs
//
// Services Module - Orchestration Layer

pub mod fetch_policy;
pub mod movie_fetch_service;
pub mod movie_write_service;
pub mod projection;
pub mod tasks;

#[cfg(test)]
mod movie_fetch_service_tests;

// Re-export all services and their types
pub use fetch_policy::{
    policy_for,
    requires_login,
    CouplingRule,
    DetailPlan,
    FetchPolicy,
    FetchTrigger,
    RefreshRule,
    POLICY_TABLE,
};

pub use movie_fetch_service::MovieFetchService;

pub use movie_write_service::{
    FlagWrite,
    MovieFlag,
    MovieWriteService,
};

pub use projection::{
    filter_movies,
    flat,
    sectioned,
    ListHeader,
    ListItem,
    SectionSpec,
};

pub use tasks::{
    CompletionSink,
    StateUpdate,
    TaskExecutor,
};
