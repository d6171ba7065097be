// src/error/types.rs
use crate::domain::{DomainError, Provider};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories a view can be told about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkError {
    /// The operation needs a tracker session that is absent or rejected
    Unauthorized,
    /// The provider does not know the requested resource
    NotFound(Provider),
    /// Transport-level failure
    Network,
    Unknown,
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::Unauthorized => write!(f, "unauthorized"),
            NetworkError::NotFound(provider) => write!(f, "not found on {}", provider),
            NetworkError::Network => write!(f, "network error"),
            NetworkError::Unknown => write!(f, "unknown error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not logged in")]
    Unauthorized,

    #[error("{provider} request failed: {error}")]
    Provider {
        provider: Provider,
        error: NetworkError,
    },

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resource not found")]
    NotFound,

    #[error("Other error: {0}")]
    Other(String),
}

impl AppError {
    pub fn provider(provider: Provider, error: NetworkError) -> Self {
        AppError::Provider { provider, error }
    }

    /// Category surfaced on the view error channel
    pub fn network_error(&self) -> NetworkError {
        match self {
            AppError::Unauthorized => NetworkError::Unauthorized,
            AppError::Provider { error, .. } => *error,
            _ => NetworkError::Unknown,
        }
    }

    /// Programming errors are logged, never shown to a view
    pub fn is_precondition(&self) -> bool {
        matches!(self, AppError::Precondition(_))
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::Other(format!("UUID error: {}", err))
    }
}

impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::Other(format!("Date parse error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_mapping() {
        assert_eq!(
            AppError::Unauthorized.network_error(),
            NetworkError::Unauthorized
        );
        assert_eq!(
            AppError::provider(Provider::Catalog, NetworkError::NotFound(Provider::Catalog))
                .network_error(),
            NetworkError::NotFound(Provider::Catalog)
        );
        assert_eq!(
            AppError::Other("boom".to_string()).network_error(),
            NetworkError::Unknown
        );
    }

    #[test]
    fn test_serializes_as_message() {
        let json = serde_json::to_string(&AppError::Unauthorized).unwrap();
        assert_eq!(json, "\"Not logged in\"");
    }
}
