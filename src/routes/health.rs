//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    /// `ok`, `degraded` after a failed write, or `memory` when nothing is persisted
    pub persistence: String,
    pub annotations: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (persistent, annotations_healthy, annotations) = {
        let store = state.annotations();
        (store.is_persistent(), store.persistence_healthy(), store.len())
    };
    let theme_healthy = state.theme().persistence_healthy();

    let persistence = if !persistent {
        "memory"
    } else if annotations_healthy && theme_healthy {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "annotation-store".to_string(),
        persistence: persistence.to_string(),
        annotations,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}
