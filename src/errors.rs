use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
///
/// The variants line up with how the prefill pipeline treats a failure:
/// `NotFound` and `BadRequest` abort a request before or during the company and
/// geocoding steps, `ExternalApiError` is an upstream that did not answer (only
/// fatal for company lookup and geocoding), and `DatabaseError` /
/// `InternalError` always fail the whole request.
#[derive(Debug)]
pub enum AppError {
    /// Cache store or audit table failure.
    DatabaseError(sqlx::Error),
    /// Company or address could not be resolved.
    NotFound(String),
    /// Malformed identifier, address or coordinates.
    BadRequest(String),
    /// Upstream source unavailable (non-2xx, transport error, timeout, open breaker).
    ExternalApiError(String),
    /// Optional capability not configured in this deployment.
    ServiceUnavailable(String),
    /// Unexpected failure.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the failure means "this upstream did not answer".
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self.root(), AppError::ExternalApiError(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    ///
    /// Internal failures keep their diagnostic detail in the `details` field so
    /// a failed request is never mistaken for a partial result.
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone(), None)
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.clone().into_response();
            }
        };

        let body = match details {
            Some(details) => Json(json!({ "error": error_message, "details": details })),
            None => Json(json!({ "error": error_message })),
        };

        (status, body).into_response()
    }
}

impl Clone for AppError {
    /// `sqlx::Error` is not cloneable, so `DatabaseError` degrades to an
    /// `InternalError` carrying the original message.
    fn clone(&self) -> Self {
        match self {
            AppError::DatabaseError(e) => AppError::InternalError(format!("database: {}", e)),
            AppError::NotFound(msg) => AppError::NotFound(msg.clone()),
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::ExternalApiError(msg) => AppError::ExternalApiError(msg.clone()),
            AppError::ServiceUnavailable(msg) => AppError::ServiceUnavailable(msg.clone()),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("serialization: {}", err))
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(AppError::DatabaseError).context(context)
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(AppError::DatabaseError).with_context(f)
    }
}

/// Converts "upstream unavailable" into an absent value at the call site.
///
/// Every other error kind (store failures, internal errors) still propagates.
pub trait UpstreamExt<T> {
    fn or_unavailable(self, source: &str) -> Result<Option<T>, AppError>;
}

impl<T> UpstreamExt<T> for Result<T, AppError> {
    fn or_unavailable(self, source: &str) -> Result<Option<T>, AppError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_upstream_unavailable() => {
                tracing::warn!("{} unavailable, continuing without it: {}", source, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_preserves_root_kind() {
        let failed: Result<(), AppError> = Err(AppError::ExternalApiError("timeout".to_string()));
        let err = failed.context("elevation lookup").unwrap_err();
        assert!(err.is_upstream_unavailable());
        assert_eq!(err.to_string(), "elevation lookup: External API error: timeout");
    }

    #[test]
    fn test_or_unavailable_swallows_only_upstream_errors() {
        let upstream: Result<u32, AppError> = Err(AppError::ExternalApiError("503".into()));
        assert_eq!(upstream.or_unavailable("overpass").unwrap(), None);

        let internal: Result<u32, AppError> = Err(AppError::InternalError("boom".into()));
        assert!(internal.or_unavailable("overpass").is_err());

        let ok: Result<u32, AppError> = Ok(7);
        assert_eq!(ok.or_unavailable("overpass").unwrap(), Some(7));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ExternalApiError("x".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::WithContext {
                source: Box::new(AppError::NotFound("x".into())),
                context: "ctx".into(),
            }
            .into_response()
            .status(),
            StatusCode::NOT_FOUND
        );
    }
}
