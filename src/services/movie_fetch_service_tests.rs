// src/services/movie_fetch_service_tests.rs
//
// Fetch Orchestrator Tests
//
// Collaborators are mockall mocks; completions are collected from the executor and
// applied to a real store, the way the core runtime does it.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::domain::{CastMember, MoviePayload, MovieQueryType, PaginatedResult, Provider, Trailer, ViewId};
    use crate::error::{AppError, NetworkError};
    use crate::events::{EventBus, ShowError, ShowLoadingProgress};
    use crate::integrations::{MockCatalogClient, MockLocalMovieCache, MockTrackerClient};
    use crate::services::movie_fetch_service::MovieFetchService;
    use crate::services::tasks::{CompletionSink, StateUpdate, TaskExecutor};
    use crate::state::{Account, MovieKey, MoviesState, RequestKey};

    const VIEW: ViewId = ViewId(7);

    #[derive(Default)]
    struct CollectingSink {
        updates: Mutex<Vec<StateUpdate>>,
    }

    impl CompletionSink for CollectingSink {
        fn submit(&self, update: StateUpdate) {
            self.updates.lock().unwrap().push(update);
        }
    }

    struct Harness {
        state: MoviesState,
        service: MovieFetchService,
        executor: TaskExecutor,
        sink: Arc<CollectingSink>,
        errors: Arc<Mutex<Vec<(ViewId, NetworkError)>>>,
        loading: Arc<Mutex<Vec<(bool, bool)>>>,
    }

    impl Harness {
        fn new(tracker: MockTrackerClient, catalog: MockCatalogClient, cache: MockLocalMovieCache) -> Self {
            let sink = Arc::new(CollectingSink::default());
            let executor = TaskExecutor::new(sink.clone());
            let service = MovieFetchService::new(
                Arc::new(tracker),
                Arc::new(catalog),
                Arc::new(cache),
                executor.clone(),
            );
            let state = MoviesState::new(EventBus::new());

            let errors = Arc::new(Mutex::new(Vec::new()));
            let sink_errors = Arc::clone(&errors);
            state.bus().subscribe::<ShowError, _>(move |e| {
                sink_errors.lock().unwrap().push((e.calling_id, e.error));
            });
            let loading = Arc::new(Mutex::new(Vec::new()));
            let sink_loading = Arc::clone(&loading);
            state.bus().subscribe::<ShowLoadingProgress, _>(move |e| {
                sink_loading.lock().unwrap().push((e.show, e.secondary));
            });

            Self {
                state,
                service,
                executor,
                sink,
                errors,
                loading,
            }
        }

        fn logged_in(mut self) -> Self {
            self.state.set_account(Some(Account::new("alice")));
            self
        }

        /// Apply completions until no task is left, including tasks spawned by completions
        async fn settle(&mut self) {
            loop {
                while self.executor.in_flight() > 0 {
                    tokio::task::yield_now().await;
                }
                let updates: Vec<StateUpdate> = self.sink.updates.lock().unwrap().drain(..).collect();
                if updates.is_empty() {
                    break;
                }
                for update in updates {
                    update(&mut self.state);
                }
            }
        }

        fn errors(&self) -> Vec<(ViewId, NetworkError)> {
            self.errors.lock().unwrap().clone()
        }
    }

    fn page(ids: &[i64], page: u32, total_pages: u32) -> PaginatedResult<MoviePayload> {
        PaginatedResult::new(
            ids.iter().map(|id| MoviePayload::catalog(*id)).collect(),
            page,
            total_pages,
        )
    }

    // ========================================================================
    // COLLECTIONS
    // ========================================================================

    #[tokio::test]
    async fn test_library_fetch_waits_for_local_cache() {
        let mut tracker = MockTrackerClient::new();
        tracker
            .expect_fetch_library()
            .withf(|user| user == "alice")
            .times(1)
            .returning(|_| Ok(vec![MoviePayload::tracker("tt0113277")]));
        let mut cache = MockLocalMovieCache::new();
        cache.expect_get_library().times(1).returning(|| Ok(vec![]));
        cache.expect_get_watchlist().times(1).returning(|| Ok(vec![]));

        let mut h = Harness::new(tracker, MockCatalogClient::new(), cache).logged_in();

        // Cache not consulted yet: no remote fetch
        h.service.fetch_collection_if_needed(&mut h.state, VIEW, MovieQueryType::Library);
        h.settle().await;
        assert!(h.state.library().is_none());

        h.service.load_cached_collections(&mut h.state);
        h.settle().await;
        assert!(h.state.is_cache_loaded(MovieQueryType::Library));

        h.service.fetch_collection_if_needed(&mut h.state, VIEW, MovieQueryType::Library);
        h.settle().await;
        assert_eq!(h.state.library().map(|ids| ids.len()), Some(1));

        // Populated now: nothing more to fetch
        h.service.fetch_collection_if_needed(&mut h.state, VIEW, MovieQueryType::Library);
        h.settle().await;
    }

    #[tokio::test]
    async fn test_cached_watchlist_is_loaded_when_logged_in() {
        let mut cache = MockLocalMovieCache::new();
        cache.expect_get_library().returning(|| Ok(vec![]));
        cache
            .expect_get_watchlist()
            .returning(|| Ok(vec![MoviePayload::tracker("tt0078748").with_title("Alien")]));

        let mut h = Harness::new(MockTrackerClient::new(), MockCatalogClient::new(), cache).logged_in();
        h.service.load_cached_collections(&mut h.state);
        h.settle().await;

        let watchlist = h.state.movies(h.state.watchlist().unwrap());
        assert_eq!(watchlist[0].title.as_deref(), Some("Alien"));
        assert!(h.state.is_cache_loaded(MovieQueryType::Watchlist));
    }

    #[tokio::test]
    async fn test_recommended_without_session_fails_fast() {
        let mut tracker = MockTrackerClient::new();
        tracker.expect_fetch_recommendations().never();

        let mut h = Harness::new(tracker, MockCatalogClient::new(), MockLocalMovieCache::new());
        let result = h.service.fetch_recommended(&mut h.state, VIEW);

        assert!(matches!(result, Err(AppError::Precondition(_))));
        h.settle().await;
        assert!(h.errors().is_empty());
    }

    #[tokio::test]
    async fn test_previous_session_results_are_dropped() {
        let mut tracker = MockTrackerClient::new();
        tracker
            .expect_fetch_watchlist()
            .returning(|_| Ok(vec![MoviePayload::tracker("tt0113277")]));

        let mut h = Harness::new(tracker, MockCatalogClient::new(), MockLocalMovieCache::new()).logged_in();
        h.service.fetch_collection(&mut h.state, VIEW, MovieQueryType::Watchlist);

        // Session changes before the completion is applied
        h.state.reset_session_state();
        h.state.set_account(Some(Account::new("bob")));
        h.settle().await;

        assert!(h.state.watchlist().is_none());
        assert!(h.state.index().is_empty());
    }

    #[tokio::test]
    async fn test_tracker_failure_reaches_calling_view_only() {
        let mut tracker = MockTrackerClient::new();
        tracker.expect_fetch_trending().returning(|| {
            Err(AppError::provider(Provider::Tracker, NetworkError::Network))
        });

        let mut h = Harness::new(tracker, MockCatalogClient::new(), MockLocalMovieCache::new());
        h.service.fetch_collection(&mut h.state, VIEW, MovieQueryType::Trending);
        h.settle().await;

        assert_eq!(h.errors(), vec![(VIEW, NetworkError::Network)]);
        assert!(h.state.trending().is_none());
        assert_eq!(*h.loading.lock().unwrap(), vec![(true, false), (false, false)]);
    }

    // ========================================================================
    // PAGINATION
    // ========================================================================

    #[tokio::test]
    async fn test_popular_pages_append_until_last() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_popular()
            .withf(|page| *page == 1)
            .times(1)
            .returning(|_| Ok(page(&[1, 2], 1, 2)));
        catalog
            .expect_fetch_popular()
            .withf(|page| *page == 2)
            .times(1)
            .returning(|_| Ok(page(&[3], 2, 2)));

        let mut h = Harness::new(MockTrackerClient::new(), catalog, MockLocalMovieCache::new());

        h.service.fetch_listing_if_needed(&mut h.state, VIEW, MovieQueryType::Popular);
        h.settle().await;
        h.service.fetch_next_listing_page(&mut h.state, VIEW, MovieQueryType::Popular);
        h.settle().await;
        // page == total_pages: no request
        h.service.fetch_next_listing_page(&mut h.state, VIEW, MovieQueryType::Popular);
        h.settle().await;

        let popular = h.state.popular().unwrap();
        assert_eq!(popular.items.len(), 3);
        assert_eq!(popular.page, 2);
        assert!(h.loading.lock().unwrap().contains(&(true, true)));
    }

    #[tokio::test]
    async fn test_refresh_clears_before_requesting_first_page() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_upcoming()
            .withf(|page| *page == 1)
            .times(2)
            .returning(|_| Ok(page(&[1], 1, 3)));

        let mut h = Harness::new(MockTrackerClient::new(), catalog, MockLocalMovieCache::new());
        h.service.fetch_listing_if_needed(&mut h.state, VIEW, MovieQueryType::Upcoming);
        h.settle().await;
        assert!(h.state.upcoming().is_some());

        h.service.refresh_listing(&mut h.state, VIEW, MovieQueryType::Upcoming);
        assert!(h.state.upcoming().is_none());
        h.settle().await;
        assert_eq!(h.state.upcoming().unwrap().page, 1);
    }

    #[tokio::test]
    async fn test_superseded_page_keeps_the_refresh_guard() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_upcoming()
            .withf(|page| *page == 1)
            .times(2)
            .returning(|_| Ok(page(&[1], 1, 3)));

        let mut h = Harness::new(MockTrackerClient::new(), catalog, MockLocalMovieCache::new());
        h.service.fetch_listing_if_needed(&mut h.state, VIEW, MovieQueryType::Upcoming);
        while h.executor.in_flight() > 0 {
            tokio::task::yield_now().await;
        }
        let stale: Vec<StateUpdate> = h.sink.updates.lock().unwrap().drain(..).collect();

        h.service.refresh_listing(&mut h.state, VIEW, MovieQueryType::Upcoming);
        for update in stale {
            update(&mut h.state);
        }
        assert!(h.state.upcoming().is_none());
        assert!(h.state.is_request_in_flight(RequestKey::Query(MovieQueryType::Upcoming)));

        // Still guarded: no third request
        h.service.fetch_listing_if_needed(&mut h.state, VIEW, MovieQueryType::Upcoming);
        h.settle().await;

        assert_eq!(h.state.upcoming().unwrap().items.len(), 1);
        assert!(!h.state.is_request_in_flight(RequestKey::Query(MovieQueryType::Upcoming)));
        assert_eq!(
            *h.loading.lock().unwrap(),
            vec![(true, false), (true, false), (false, false), (false, false)]
        );
    }

    #[tokio::test]
    async fn test_search_pages_carry_the_query() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search()
            .withf(|query, page| query == "heat" && *page == 1)
            .times(1)
            .returning(|_, _| Ok(page(&[949], 1, 2)));
        catalog
            .expect_search()
            .withf(|query, page| query == "heat" && *page == 2)
            .times(1)
            .returning(|_, _| Ok(page(&[1000], 2, 2)));

        let mut h = Harness::new(MockTrackerClient::new(), catalog, MockLocalMovieCache::new());
        h.service.search(&mut h.state, VIEW, "  heat ");
        h.settle().await;
        h.service.fetch_next_search_page(&mut h.state, VIEW);
        h.settle().await;

        let result = h.state.search_result().unwrap();
        assert_eq!(result.query.as_deref(), Some("heat"));
        assert_eq!(result.items.len(), 2);

        h.service.clear_search(&mut h.state);
        assert!(h.state.search_result().is_none());
        assert!(h.state.search_query().is_none());
    }

    #[tokio::test]
    async fn test_superseded_search_is_dropped() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_search()
            .withf(|query, _| query == "alien")
            .returning(|_, _| Ok(page(&[348], 1, 1)));
        catalog
            .expect_search()
            .withf(|query, _| query == "heat")
            .returning(|_, _| Ok(page(&[949], 1, 1)));

        let mut h = Harness::new(MockTrackerClient::new(), catalog, MockLocalMovieCache::new());
        h.service.search(&mut h.state, VIEW, "alien");
        h.service.search(&mut h.state, VIEW, "heat");
        h.settle().await;

        let result = h.state.search_result().unwrap();
        assert_eq!(result.query.as_deref(), Some("heat"));
        let movies = h.state.movies(&result.items);
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].catalog_id, Some(949));
    }

    // ========================================================================
    // DETAIL
    // ========================================================================

    #[tokio::test]
    async fn test_detail_fans_out_once_per_provider() {
        let mut tracker = MockTrackerClient::new();
        tracker
            .expect_fetch_detail()
            .withf(|id| id == "tt0113277")
            .times(1)
            .returning(|_| {
                Ok(MoviePayload {
                    watched: Some(true),
                    ..MoviePayload::tracker("tt0113277")
                })
            });
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_detail()
            .withf(|id| *id == 949)
            .times(1)
            .returning(|_| Ok(MoviePayload::catalog(949).with_title("Heat")));
        catalog.expect_fetch_trailers().times(1).returning(|_| {
            Ok(vec![Trailer {
                name: "Trailer".to_string(),
                source: "abc".to_string(),
                site: "youtube".to_string(),
            }])
        });

        let mut h = Harness::new(tracker, catalog, MockLocalMovieCache::new()).logged_in();
        let id = h
            .state
            .put_movie(&MoviePayload {
                catalog_id: Some(949),
                ..MoviePayload::tracker("tt0113277")
            })
            .unwrap();

        h.service.fetch_detail_if_needed(&mut h.state, VIEW, id, false);
        // Second request while both are in flight issues nothing
        h.service.fetch_detail_if_needed(&mut h.state, VIEW, id, false);
        h.settle().await;

        let movie = h.state.movie(id).unwrap();
        assert!(movie.watched);
        assert_eq!(movie.title.as_deref(), Some("Heat"));
        assert!(!movie.needs_full_fetch(Provider::Tracker));
        assert!(!movie.needs_full_fetch(Provider::Catalog));
        assert_eq!(movie.trailers.len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failures_are_independent() {
        let mut tracker = MockTrackerClient::new();
        tracker
            .expect_fetch_detail()
            .returning(|_| Ok(MoviePayload { watched: Some(true), ..MoviePayload::tracker("tt0113277") }));
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_detail()
            .returning(|_| Err(AppError::provider(Provider::Catalog, NetworkError::Network)));

        let mut h = Harness::new(tracker, catalog, MockLocalMovieCache::new()).logged_in();
        let id = h
            .state
            .put_movie(&MoviePayload {
                catalog_id: Some(949),
                ..MoviePayload::tracker("tt0113277")
            })
            .unwrap();

        h.service.fetch_detail_if_needed(&mut h.state, VIEW, id, false);
        h.settle().await;

        let movie = h.state.movie(id).unwrap();
        assert!(movie.watched);
        assert!(!movie.needs_full_fetch(Provider::Tracker));
        // Retry allowed after failure
        assert!(movie.needs_full_fetch(Provider::Catalog));
        assert_eq!(h.errors(), vec![(VIEW, NetworkError::Network)]);
    }

    #[tokio::test]
    async fn test_failed_detail_of_folded_entity_can_be_retried() {
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_detail()
            .times(1)
            .returning(|_| Err(AppError::provider(Provider::Catalog, NetworkError::Network)));

        let mut h = Harness::new(MockTrackerClient::new(), catalog, MockLocalMovieCache::new());
        let tracked = h.state.put_movie(&MoviePayload::tracker("tt0113277")).unwrap();
        let catalog_only = h.state.put_movie(&MoviePayload::catalog(949)).unwrap();

        h.service.fetch_detail_if_needed(&mut h.state, VIEW, catalog_only, false);
        while h.executor.in_flight() > 0 {
            tokio::task::yield_now().await;
        }

        // Linking both ids folds the requested entity away before its failure is applied
        let merged = h
            .state
            .put_movie(&MoviePayload {
                catalog_id: Some(949),
                ..MoviePayload::tracker("tt0113277")
            })
            .unwrap();
        assert_eq!(merged, tracked);
        assert!(h.state.movie(catalog_only).is_none());

        h.settle().await;

        let movie = h.state.movie(merged).unwrap();
        assert!(!movie.is_fetch_in_flight(Provider::Catalog));
        assert!(movie.needs_full_fetch(Provider::Catalog));
        assert_eq!(h.errors(), vec![(VIEW, NetworkError::Network)]);
    }

    #[tokio::test]
    async fn test_opaque_reference_resolves_through_tracker() {
        let mut tracker = MockTrackerClient::new();
        tracker
            .expect_fetch_detail()
            .withf(|id| id == "heat-1995")
            .times(1)
            .returning(|_| {
                Ok(MoviePayload {
                    catalog_id: Some(949),
                    ..MoviePayload::tracker("tt0113277")
                })
            });

        let mut h = Harness::new(tracker, MockCatalogClient::new(), MockLocalMovieCache::new()).logged_in();
        h.service.fetch_detail_by_reference(&mut h.state, VIEW, "heat-1995", false);
        h.settle().await;

        let movie = h.state.movie_by(MovieKey::Catalog(949)).unwrap();
        assert_eq!(movie.tracker_id.as_deref(), Some("tt0113277"));
        // The catalog detail is still owed; the controller chains it
        assert!(movie.needs_full_fetch(Provider::Catalog));
    }

    #[tokio::test]
    async fn test_numeric_reference_without_session_goes_to_catalog() {
        let mut tracker = MockTrackerClient::new();
        tracker.expect_fetch_detail().never();
        let mut catalog = MockCatalogClient::new();
        catalog
            .expect_fetch_detail()
            .withf(|id| *id == 348)
            .returning(|_| Ok(MoviePayload::catalog(348).with_title("Alien")));
        catalog.expect_fetch_trailers().returning(|_| Ok(vec![]));

        let mut h = Harness::new(tracker, catalog, MockLocalMovieCache::new());
        h.service.fetch_detail_by_reference(&mut h.state, VIEW, "348", false);
        h.settle().await;

        assert!(h.state.find_movie("348").is_some());
    }

    // ========================================================================
    // SUB-LISTS
    // ========================================================================

    #[tokio::test]
    async fn test_related_falls_back_to_tracker() {
        let mut tracker = MockTrackerClient::new();
        tracker
            .expect_fetch_related()
            .withf(|id| id == "tt0113277")
            .times(1)
            .returning(|_| Ok(vec![MoviePayload::tracker("tt0102926")]));

        let mut h = Harness::new(tracker, MockCatalogClient::new(), MockLocalMovieCache::new());
        let id = h.state.put_movie(&MoviePayload::tracker("tt0113277")).unwrap();

        h.service.fetch_related_if_needed(&mut h.state, VIEW, id);
        h.settle().await;

        let related = h.state.movie(id).unwrap().related.clone();
        assert_eq!(related.len(), 1);
        assert!(h.state.movie(related[0]).is_some());
    }

    #[tokio::test]
    async fn test_cast_is_ordered_by_billing() {
        let mut catalog = MockCatalogClient::new();
        catalog.expect_fetch_cast().times(1).returning(|_| {
            Ok(vec![
                CastMember::new(2, "Robert De Niro".to_string(), 1),
                CastMember::new(1, "Al Pacino".to_string(), 0),
            ])
        });

        let mut h = Harness::new(MockTrackerClient::new(), catalog, MockLocalMovieCache::new());
        let id = h.state.put_movie(&MoviePayload::catalog(949)).unwrap();

        h.service.fetch_cast_if_needed(&mut h.state, VIEW, id);
        h.service.fetch_cast_if_needed(&mut h.state, VIEW, id);
        h.settle().await;

        let cast = &h.state.movie(id).unwrap().cast;
        assert_eq!(cast[0].name, "Al Pacino");
        assert_eq!(cast.len(), 2);
    }
}
