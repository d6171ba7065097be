// src/services/projection.rs
//
// Filter / Section Engine
//
// Pure derivation of a view's projection from entities already resolved out of the
// store. No state access, no events.
//
// CRITICAL RULES:
// - Filters combine with AND and keep the input order
// - In a sectioned projection an item lands in at most one section
// - Sections claim items in processing order, but are emitted in display order
// - Empty sections produce no header

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::{DomainError, DomainResult, Filter, FilterContext, FilterSet, Movie, MovieQueryType};

/// Header row in a projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListHeader {
    /// Title of a section claimed by a filter
    Section(Filter),
    /// Title of a whole list (related movies, cast)
    Query(MovieQueryType),
}

impl ListHeader {
    pub fn title(&self) -> &'static str {
        match self {
            ListHeader::Section(filter) => filter.title(),
            ListHeader::Query(MovieQueryType::Related) => "RELATED",
            ListHeader::Query(MovieQueryType::Cast) => "CAST",
            ListHeader::Query(_) => "",
        }
    }
}

/// One row of a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ListItem<T> {
    Header(ListHeader),
    Item(T),
}

impl<T> ListItem<T> {
    pub fn item(&self) -> Option<&T> {
        match self {
            ListItem::Item(item) => Some(item),
            ListItem::Header(_) => None,
        }
    }

    pub fn header(&self) -> Option<ListHeader> {
        match self {
            ListItem::Header(header) => Some(*header),
            ListItem::Item(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ListItem<U> {
        match self {
            ListItem::Header(header) => ListItem::Header(header),
            ListItem::Item(item) => ListItem::Item(f(item)),
        }
    }
}

/// Ordered section filters plus the order in which they claim items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpec {
    display: Vec<Filter>,
    processing: Vec<Filter>,
}

impl SectionSpec {
    /// `processing` must be a permutation of `display`
    pub fn new(display: Vec<Filter>, processing: Vec<Filter>) -> DomainResult<Self> {
        let display_set: HashSet<Filter> = display.iter().copied().collect();
        let processing_set: HashSet<Filter> = processing.iter().copied().collect();
        if display.len() != processing.len()
            || display_set.len() != display.len()
            || display_set != processing_set
        {
            return Err(DomainError::InvariantViolation(
                "section processing order must be a permutation of the display order".to_string(),
            ));
        }
        Ok(Self {
            display,
            processing,
        })
    }

    /// Claim and display in the same order
    pub fn in_display_order(display: Vec<Filter>) -> DomainResult<Self> {
        let processing = display.clone();
        Self::new(display, processing)
    }

    /// Watched movies are claimed before released ones, but listed after them
    pub fn watchlist() -> Self {
        Self {
            display: vec![Filter::Upcoming, Filter::Soon, Filter::Released, Filter::Seen],
            processing: vec![Filter::Upcoming, Filter::Soon, Filter::Seen, Filter::Released],
        }
    }

    /// Section layout used by a view type, if it is sectioned at all
    pub fn for_query(query_type: MovieQueryType) -> Option<Self> {
        match query_type {
            MovieQueryType::Watchlist => Some(Self::watchlist()),
            _ => None,
        }
    }

    pub fn display_order(&self) -> &[Filter] {
        &self.display
    }

    pub fn processing_order(&self) -> &[Filter] {
        &self.processing
    }
}

/// Keep the movies every active filter matches, in input order
pub fn filter_movies<'a>(
    movies: &[&'a Movie],
    filters: &FilterSet,
    ctx: &FilterContext,
) -> Vec<&'a Movie> {
    movies
        .iter()
        .copied()
        .filter(|movie| filters.matches(movie, ctx))
        .collect()
}

/// Unsectioned projection, optionally headed by a list title
pub fn flat<T>(header: Option<ListHeader>, items: impl IntoIterator<Item = T>) -> Vec<ListItem<T>> {
    header
        .map(ListItem::Header)
        .into_iter()
        .chain(items.into_iter().map(ListItem::Item))
        .collect()
}

pub fn sectioned<'a>(
    movies: &[&'a Movie],
    spec: &SectionSpec,
    ctx: &FilterContext,
) -> Vec<ListItem<&'a Movie>> {
    let mut seen = HashSet::new();
    let mut pool: Vec<&'a Movie> = movies
        .iter()
        .copied()
        .filter(|movie| seen.insert(movie.id))
        .collect();

    let mut claimed: HashMap<Filter, Vec<&'a Movie>> = HashMap::new();
    for filter in spec.processing_order() {
        let (mut section, rest): (Vec<&Movie>, Vec<&Movie>) =
            pool.into_iter().partition(|movie| filter.matches(movie, ctx));
        pool = rest;

        if !section.is_empty() {
            filter.sort_order().sort(&mut section);
            claimed.insert(*filter, section);
        }
    }

    if !pool.is_empty() {
        log::debug!("{} movies matched no section", pool.len());
    }

    let mut result = Vec::with_capacity(movies.len() + spec.display_order().len());
    for filter in spec.display_order() {
        if let Some(section) = claimed.remove(filter) {
            result.push(ListItem::Header(ListHeader::Section(*filter)));
            result.extend(section.into_iter().map(ListItem::Item));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MoviePayload;
    use chrono::{DateTime, Duration, Utc};

    fn now() -> DateTime<Utc> {
        "2024-06-01T00:00:00Z".parse().unwrap()
    }

    fn ctx() -> FilterContext {
        FilterContext::new(now(), Duration::days(30), 70)
    }

    fn movie(id: i64, released_in_days: Option<i64>, watched: bool, collected: bool) -> Movie {
        let mut movie = Movie::from_payload(&MoviePayload::catalog(id));
        movie.released = released_in_days.map(|d| now() + Duration::days(d));
        movie.watched = watched;
        movie.in_collection = collected;
        movie.rating_percent = (id as u8).wrapping_mul(13) % 100;
        movie
    }

    fn sample() -> Vec<Movie> {
        vec![
            movie(1, Some(-400), true, true),
            movie(2, Some(-10), false, false),
            movie(3, Some(5), false, true),
            movie(4, Some(20), true, false),
            movie(5, Some(90), false, false),
            movie(6, None, true, true),
            movie(7, Some(-1), true, false),
            movie(8, Some(400), false, true),
        ]
    }

    fn catalog_ids(items: &[ListItem<&Movie>]) -> Vec<Option<i64>> {
        items
            .iter()
            .map(|item| item.item().and_then(|m| m.catalog_id))
            .collect()
    }

    #[test]
    fn test_filtering_is_and_over_every_subset() {
        let movies = sample();
        let refs: Vec<&Movie> = movies.iter().collect();
        let ctx = ctx();

        for mask in 0u32..(1 << Filter::ALL.len()) {
            let filters: FilterSet = Filter::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, f)| *f)
                .collect();

            let expected: Vec<&Movie> = refs
                .iter()
                .copied()
                .filter(|m| filters.iter().all(|f| f.matches(m, &ctx)))
                .collect();

            assert_eq!(filter_movies(&refs, &filters, &ctx), expected, "mask {:#b}", mask);
        }
    }

    #[test]
    fn test_item_failing_one_filter_is_excluded() {
        let movies = sample();
        let refs: Vec<&Movie> = movies.iter().collect();
        let filters: FilterSet = [Filter::Seen, Filter::Collection].into_iter().collect();

        let result = filter_movies(&refs, &filters, &ctx());
        let ids: Vec<i64> = result.iter().filter_map(|m| m.catalog_id).collect();
        assert_eq!(ids, vec![1, 6]);
    }

    #[test]
    fn test_flat_with_header() {
        let result = flat(Some(ListHeader::Query(MovieQueryType::Related)), vec![1, 2]);
        assert_eq!(
            result,
            vec![
                ListItem::Header(ListHeader::Query(MovieQueryType::Related)),
                ListItem::Item(1),
                ListItem::Item(2),
            ]
        );
        assert_eq!(flat::<u8>(None, vec![]), vec![]);
    }

    #[test]
    fn test_watchlist_sections_display_order() {
        let movies = sample();
        let refs: Vec<&Movie> = movies.iter().collect();
        let result = sectioned(&refs, &SectionSpec::watchlist(), &ctx());

        let headers: Vec<ListHeader> = result.iter().filter_map(|i| i.header()).collect();
        assert_eq!(
            headers,
            vec![
                ListHeader::Section(Filter::Upcoming),
                ListHeader::Section(Filter::Soon),
                ListHeader::Section(Filter::Released),
                ListHeader::Section(Filter::Seen),
            ]
        );

        // Seen claims before Released: 1 and 7 are released but watched
        assert_eq!(
            catalog_ids(&result),
            vec![
                None,
                Some(5),
                Some(8),
                None,
                Some(3),
                Some(4),
                None,
                Some(2),
                None,
                Some(1),
                Some(7),
                Some(6),
            ]
        );
    }

    #[test]
    fn test_each_item_in_at_most_one_section() {
        let movies = sample();
        let refs: Vec<&Movie> = movies.iter().collect();
        let ctx = ctx();

        for spec in [
            SectionSpec::watchlist(),
            SectionSpec::in_display_order(vec![Filter::Seen, Filter::Collection]).unwrap(),
            SectionSpec::in_display_order(vec![Filter::HighlyRated, Filter::NotReleased]).unwrap(),
        ] {
            let result = sectioned(&refs, &spec, &ctx);
            let ids: Vec<i64> = result
                .iter()
                .filter_map(|i| i.item().and_then(|m| m.catalog_id))
                .collect();
            let unique: HashSet<i64> = ids.iter().copied().collect();
            assert_eq!(ids.len(), unique.len());

            // Exactly the movies matching at least one section survive
            for movie in &movies {
                let matches_any = spec.display_order().iter().any(|f| f.matches(movie, &ctx));
                assert_eq!(unique.contains(&movie.catalog_id.unwrap()), matches_any);
            }
        }
    }

    #[test]
    fn test_empty_sections_have_no_header() {
        let movies = vec![movie(1, Some(-10), false, false)];
        let refs: Vec<&Movie> = movies.iter().collect();
        let result = sectioned(&refs, &SectionSpec::watchlist(), &ctx());
        assert_eq!(
            result.iter().filter_map(|i| i.header()).collect::<Vec<_>>(),
            vec![ListHeader::Section(Filter::Released)]
        );
    }

    #[test]
    fn test_undated_watchlist_movie_lands_in_released() {
        let movies = vec![movie(1, None, false, false), movie(2, Some(5), false, false)];
        let refs: Vec<&Movie> = movies.iter().collect();
        let result = sectioned(&refs, &SectionSpec::watchlist(), &ctx());
        assert_eq!(
            catalog_ids(&result),
            vec![None, Some(2), None, Some(1)]
        );
        assert_eq!(result[2], ListItem::Header(ListHeader::Section(Filter::Released)));
    }

    #[test]
    fn test_section_spec_rejects_mismatched_orders() {
        assert!(SectionSpec::new(vec![Filter::Seen], vec![Filter::Unseen]).is_err());
        assert!(SectionSpec::new(vec![Filter::Seen, Filter::Seen], vec![Filter::Seen, Filter::Seen]).is_err());
        assert!(SectionSpec::new(
            vec![Filter::Released, Filter::Seen],
            vec![Filter::Seen, Filter::Released]
        )
        .is_ok());
    }
}
