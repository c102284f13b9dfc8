// src/errors.rs
use thiserror::Error;

/// Main error type for the riide driver console core.
///
/// Remote-call failures split into two families at the action boundary:
/// tolerated ones are logged and local state proceeds, surfaced ones are
/// returned to the caller. The split is per action, not per variant; see
/// the session operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Convenience type alias for Results
pub type DriverResult<T> = Result<T, AppError>;

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            AppError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            AppError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

// Helper functions for creating common errors
impl AppError {
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        AppError::InvalidTransition(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        AppError::Storage(msg.into())
    }

    /// Whether the error means the remote resource simply does not exist,
    /// as opposed to the call itself failing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::Http { status: 404, .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::NotFound("driver profile".to_string());
        assert_eq!(error.to_string(), "Not found: driver profile");

        let error = AppError::validation_error("offer_id", "offer is not pending");
        assert_eq!(
            error.to_string(),
            "Validation failed for 'offer_id': offer is not pending"
        );
    }

    #[test]
    fn test_helper_functions() {
        assert!(matches!(
            AppError::not_found("x"),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::invalid_transition("x"),
            AppError::InvalidTransition(_)
        ));
        assert!(matches!(
            AppError::unauthorized("x"),
            AppError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_is_not_found() {
        assert!(AppError::not_found("profile").is_not_found());
        assert!(
            AppError::Http {
                status: 404,
                message: "missing".to_string()
            }
            .is_not_found()
        );
        assert!(!AppError::Network("down".to_string()).is_not_found());
    }
}
