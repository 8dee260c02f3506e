use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::time::Duration;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Bad request error (invalid input).
    BadRequest(String),
    /// The upstream API answered with a non-success status.
    Upstream {
        /// Status code returned by the upstream API.
        status: u16,
        /// Upstream response body or reason.
        message: String,
    },
    /// Error interacting with an external API (transport, parsing).
    ExternalApiError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Upstream { status, message } => {
                write!(f, "Upstream API error {}: {}", status, message)
            }
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Upstream failures keep the upstream status code so callers see what
    /// BSale actually answered.
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Upstream { status, message } => {
                tracing::error!("Upstream API error {}: {}", status, message);
                (
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                    json!({
                        "error": "Upstream API error",
                        "details": message,
                    }),
                )
            }
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": "External service error",
                        "details": msg,
                    }),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (*source).into_response();
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
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

/// Why a product's variant list could not be obtained.
///
/// Always recovered by the enrichment pipeline: the product falls back to the
/// empty record and its siblings are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantFetchError {
    /// Non-success status or transport failure.
    Unavailable {
        /// Upstream status, absent on transport failures.
        status: Option<u16>,
        message: String,
    },
    /// The upstream did not answer within the bound.
    Timeout(Duration),
    /// The product id cannot be used as a path segment; nothing was sent.
    InvalidId(String),
}

impl fmt::Display for VariantFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantFetchError::Unavailable {
                status: Some(status),
                message,
            } => write!(f, "upstream unavailable ({}): {}", status, message),
            VariantFetchError::Unavailable {
                status: None,
                message,
            } => write!(f, "upstream unavailable: {}", message),
            VariantFetchError::Timeout(after) => {
                write!(f, "upstream timed out after {}ms", after.as_millis())
            }
            VariantFetchError::InvalidId(id) => write!(f, "invalid product id {:?}", id),
        }
    }
}

impl std::error::Error for VariantFetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_keeps_status() {
        let response = AppError::Upstream {
            status: 401,
            message: "invalid token".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_invalid_upstream_status_maps_to_bad_gateway() {
        let response = AppError::Upstream {
            status: 42,
            message: "weird".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_context_delegates_status() {
        let result: Result<(), AppError> = Err(AppError::Upstream {
            status: 404,
            message: "product 9".to_string(),
        });
        let response = result
            .context("loading product")
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bad_request_maps_to_400() {
        let response = AppError::BadRequest("Invalid product id".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_variant_fetch_error_display() {
        let err = VariantFetchError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "upstream timed out after 5000ms");
    }
}
