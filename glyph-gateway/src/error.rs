use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use glyph_core::GlyphError;

/// Wraps `GlyphError` so it can be returned directly from axum handlers.
/// `Transient` failures are logged and mapped to 503 rather than
/// propagated as a hard error, matching the degrade-gracefully intent of
/// the upstream-call retries (spec.md §7).
#[derive(Debug)]
pub struct ApiError(pub GlyphError);

impl From<GlyphError> for ApiError {
    fn from(err: GlyphError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            GlyphError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            GlyphError::InsufficientBalance { .. } => {
                (StatusCode::PAYMENT_REQUIRED, self.0.to_string())
            }
            GlyphError::NoNodes => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()),
            GlyphError::UpstreamNodeError(_) => (StatusCode::BAD_GATEWAY, self.0.to_string()),
            GlyphError::BadCountersignature => (StatusCode::BAD_GATEWAY, self.0.to_string()),
            GlyphError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            GlyphError::Forbidden(_) => (StatusCode::FORBIDDEN, self.0.to_string()),
            GlyphError::BadSignature => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            GlyphError::OutOfRange(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            GlyphError::Transient(msg) => {
                tracing::warn!(error = %msg, "transient failure");
                (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string())
            }
            GlyphError::Storage(_) | GlyphError::Other(_) => {
                tracing::error!(error = %self.0, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
