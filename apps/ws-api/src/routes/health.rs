use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

/// Cache key the health probe writes and reads back.
pub const HEALTH_KEY: &str = "ws-api:health";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    /// Timestamp read back from the cache.
    pub last: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Round-trips a timestamp through the cache so a broken cache connection reports unhealthy.
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    state.kv.set(HEALTH_KEY, &now).await?;
    let last = state.kv.get(HEALTH_KEY).await?;

    Ok(Json(HealthResponse {
        status: "OK",
        service: "ws-api",
        last,
    }))
}
