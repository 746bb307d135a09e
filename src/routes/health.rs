use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{services::sync::SyncStatus, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Serialize)]
struct HealthView {
    status: &'static str,
    trips: usize,
    sync: SyncStatus,
}

async fn health(State(state): State<AppState>) -> Json<HealthView> {
    let trips = state.board.read().await.len();
    Json(HealthView {
        status: "ok",
        trips,
        sync: state.sync.status().await,
    })
}
