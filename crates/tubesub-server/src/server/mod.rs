//! Inbound HTTP surface: the WebSub callback and a health check.

mod health;
mod notify;
mod verify;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use thiserror::Error;
use tracing::{error, warn};

use tubesub_core::WebSubConfig;

use crate::storage::{Database, DatabaseError};

pub use notify::topic_from_headers;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<WebSubConfig>,
}

/// Build the router: the callback endpoint (GET = verification, POST =
/// notification; anything else is 405) plus `GET /health`.
pub fn build_router(state: AppState) -> Router {
    let callback_path = state.config.callback_path().to_string();
    Router::new()
        .route(&callback_path, get(verify::verify).post(notify::notify))
        .route("/health", get(health::health))
        .with_state(state)
}

/// Callback endpoint failures, each mapped to the status the hub acts on.
#[derive(Debug, Error)]
pub enum WebSubError {
    #[error("server verify token is not configured")]
    MissingVerifyToken,

    #[error("server secret is not configured")]
    MissingSecret,

    #[error("verify token mismatch")]
    TokenMismatch,

    #[error("missing hub.challenge")]
    MissingChallenge,

    #[error("unsupported hub.mode: {0:?}")]
    UnsupportedMode(String),

    #[error("unsubscribe was never requested")]
    UnrequestedUnsubscribe,

    #[error("no pending subscribe request for topic")]
    UnboundVerification,

    #[error("invalid or missing signature")]
    BadSignature,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl WebSubError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingVerifyToken | Self::MissingSecret | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::TokenMismatch
            | Self::UnrequestedUnsubscribe
            | Self::UnboundVerification
            | Self::BadSignature => StatusCode::FORBIDDEN,
            Self::MissingChallenge | Self::UnsupportedMode(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebSubError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "WebSub callback failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "WebSub callback rejected");
        }
        // Storage details stay in the log.
        let body = match self {
            Self::Database(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_protocol_statuses() {
        assert_eq!(WebSubError::MissingVerifyToken.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(WebSubError::MissingSecret.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            WebSubError::Database(DatabaseError::Query("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(WebSubError::TokenMismatch.status(), StatusCode::FORBIDDEN);
        assert_eq!(WebSubError::UnboundVerification.status(), StatusCode::FORBIDDEN);
        assert_eq!(WebSubError::UnrequestedUnsubscribe.status(), StatusCode::FORBIDDEN);
        assert_eq!(WebSubError::BadSignature.status(), StatusCode::FORBIDDEN);
        assert_eq!(WebSubError::MissingChallenge.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            WebSubError::UnsupportedMode("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
