use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::error;

use crate::time_service::TimeError;

// =============================================================================
// API Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Time(#[from] TimeError),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("route not found")]
    NotFound,

    #[error("Upgrade Required")]
    UpgradeRequired,

    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),

    #[error("timezone is required")]
    MissingTimezone,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Time(_) | ApiError::InvalidBody(_) | ApiError::MissingTimezone => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::UpgradeRequired => StatusCode::UPGRADE_REQUIRED,
            ApiError::OriginNotAllowed(_) => StatusCode::FORBIDDEN,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of every error response.
///
/// `path` and `method` are filled in by the `error_envelope` middleware, which
/// finds the partially built body in the response extensions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: bool,
    pub message: String,
    pub code: u16,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub method: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = ErrorEnvelope {
            error: true,
            message: self.to_string(),
            code: status.as_u16(),
            path: String::new(),
            method: String::new(),
        };
        let mut response = (status, Json(envelope.clone())).into_response();
        response.extensions_mut().insert(envelope);
        response
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Response for a handler that panicked. The panic payload is logged, never
/// sent to the client.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic payload"
    };
    error!("Handler panicked: {}", detail);
    ApiError::Internal.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_errors_are_bad_request() {
        let err = ApiError::from(TimeError::UnknownTimezone("Nope/Nowhere".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "invalid timezone: Nope/Nowhere");
    }

    #[test]
    fn test_into_response_carries_envelope() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let envelope = response.extensions().get::<ErrorEnvelope>().unwrap();
        assert!(envelope.error);
        assert_eq!(envelope.code, 404);
        assert_eq!(envelope.message, "route not found");
    }

    #[test]
    fn test_panic_response_hides_payload() {
        let response = panic_response(Box::new("db password is hunter2".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = response.extensions().get::<ErrorEnvelope>().unwrap();
        assert_eq!(envelope.code, 500);
        assert_eq!(envelope.message, "internal server error");
    }

    #[test]
    fn test_missing_timezone_is_bad_request() {
        assert_eq!(ApiError::MissingTimezone.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingTimezone.to_string(), "timezone is required");
    }
}
