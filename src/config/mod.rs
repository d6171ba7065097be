// src/config/mod.rs
//
// Core configuration: filter thresholds and user preferences.
// Every field has a default so a partial JSON document is valid.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::FilterContext;
use crate::error::AppResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub filters: FilterConfig,
    pub preferences: PreferencesConfig,
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Boundary between SOON and UPCOMING
    pub soon_threshold_days: i64,
    /// HIGHLY RATED cutoff, percent
    pub highly_rated_cutoff: u8,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            soon_threshold_days: 30,
            highly_rated_cutoff: 70,
        }
    }
}

impl FilterConfig {
    pub fn context(&self, now: DateTime<Utc>) -> FilterContext {
        FilterContext::new(
            now,
            Duration::days(self.soon_threshold_days),
            self.highly_rated_cutoff,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    pub remove_from_watchlist_on_watched: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.filters.soon_threshold_days, 30);
        assert_eq!(config.filters.highly_rated_cutoff, 70);
        assert!(!config.preferences.remove_from_watchlist_on_watched);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{"preferences":{"remove_from_watchlist_on_watched":true}}"#)
                .unwrap();
        assert!(config.preferences.remove_from_watchlist_on_watched);
        assert_eq!(config.filters.soon_threshold_days, 30);
    }

    #[test]
    fn test_invalid_json_is_a_serialization_error() {
        let err = CoreConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, crate::error::AppError::Serialization(_)));
    }
}
