use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::error;

use super::AppState;

/// `GET /health`: liveness plus a database round trip.
pub(super) async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "ok": true, "db": true }))),
        Err(e) => {
            error!(error = %e, "Health check database query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "db": false, "error": e.to_string() })),
            )
        }
    }
}
