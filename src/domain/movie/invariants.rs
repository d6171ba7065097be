use super::entity::{Movie, MoviePayload};
use crate::domain::{DomainError, DomainResult};

/// Validates all Movie invariants
pub fn validate_movie(movie: &Movie) -> DomainResult<()> {
    validate_identity(movie.tracker_id.as_deref(), movie.catalog_id)?;
    validate_user_rating(movie.user_rating)?;
    validate_rating_percent(movie.rating_percent)?;
    Ok(())
}

/// A payload must be addressable before it can enter the identity index
pub fn validate_payload(payload: &MoviePayload) -> DomainResult<()> {
    validate_identity(payload.tracker_id.as_deref(), payload.catalog_id)?;
    if let Some(rating) = payload.user_rating {
        validate_user_rating(rating)?;
    }
    if let Some(percent) = payload.rating_percent {
        validate_rating_percent(percent)?;
    }
    Ok(())
}

/// At least one provider id must be present
fn validate_identity(tracker_id: Option<&str>, catalog_id: Option<i64>) -> DomainResult<()> {
    let has_tracker = tracker_id.is_some_and(|id| !id.trim().is_empty());
    if !has_tracker && catalog_id.is_none() {
        return Err(DomainError::InvariantViolation(
            "Movie must carry a tracker id or a catalog id".to_string(),
        ));
    }
    Ok(())
}

fn validate_user_rating(rating: u8) -> DomainResult<()> {
    if rating > 10 {
        return Err(DomainError::InvariantViolation(format!(
            "User rating {} is outside 0-10",
            rating
        )));
    }
    Ok(())
}

fn validate_rating_percent(percent: u8) -> DomainResult<()> {
    if percent > 100 {
        return Err(DomainError::InvariantViolation(format!(
            "Rating percent {} is outside 0-100",
            percent
        )));
    }
    Ok(())
}

/// Invariants that must hold true for the Movie domain:
///
/// 1. Internal identity (UUID) is immutable
/// 2. Once fetched, at least one provider id is known
/// 3. Provider ids, once known, never change
/// 4. User rating is within 0-10, public rating within 0-100
/// 5. User-scoped flags only ever come from the tracker

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_without_ids_fails() {
        let payload = MoviePayload::default();
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn test_blank_tracker_id_fails() {
        let payload = MoviePayload::tracker("  ");
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn test_out_of_range_rating_fails() {
        let payload = MoviePayload {
            user_rating: Some(11),
            ..MoviePayload::tracker("tt0113277")
        };
        assert!(validate_payload(&payload).is_err());
    }

    #[test]
    fn test_valid_movie() {
        let movie = Movie::from_payload(&MoviePayload::catalog(949));
        assert!(validate_movie(&movie).is_ok());
    }
}
