use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    board::{self, BoardTotals, ImportSummary, StageSummary},
    error::AppError,
    filter::{self, RangeShortcut, TripFilter},
    models::{
        pipeline::StepDirection,
        trip::{self, Trip, ASSIGNEES},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trips))
        .route("/import", post(import_trips))
        .route("/:id/move", post(move_trip))
        .route("/:id/step", post(step_trip))
        .route("/:id/assign", post(assign_trip))
}

#[derive(Debug, Deserialize)]
pub struct TripQuery {
    start: Option<String>,
    end: Option<String>,
    range: Option<String>,
    q: Option<String>,
}

#[derive(Serialize)]
struct BoardView {
    trips: Vec<Trip>,
    stages: Vec<StageSummary>,
    totals: BoardTotals,
}

async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<TripQuery>,
) -> Json<BoardView> {
    let filter = build_filter(&query);
    let board = state.board.read().await;
    let trips = filter.apply(board.trips());
    drop(board);
    let stages = board::stage_summaries(&trips);
    let totals = board::totals(&trips);
    Json(BoardView {
        trips,
        stages,
        totals,
    })
}

fn build_filter(query: &TripQuery) -> TripFilter {
    let (start, end) = match query.range.as_deref() {
        // a shortcut always wins over explicit bounds; an unknown one
        // clears them, same as the quick-select buttons it replaces
        Some(raw) => match RangeShortcut::parse(raw) {
            Some(shortcut) => shortcut.bounds(Local::now().date_naive()),
            None => (None, None),
        },
        None => (
            query.start.as_deref().and_then(filter::parse_date_only),
            query.end.as_deref().and_then(filter::parse_date_only),
        ),
    };
    TripFilter {
        start,
        end,
        search: query.q.clone(),
    }
}

async fn import_trips(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportSummary>, AppError> {
    let rows = trip::records_from_csv(&body)?;
    let mut board = state.board.write().await;
    let summary = board.reconcile(&rows);
    state.publish_local(board).await;
    info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "csv import merged"
    );
    Ok(Json(summary))
}

#[derive(Deserialize)]
struct MoveRequest {
    stage: String,
}

async fn move_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<Trip>, AppError> {
    let mut board = state.board.write().await;
    let trip = board
        .move_trip(&trip_id, &request.stage)
        .cloned()
        .ok_or(AppError::NotFound)?;
    state.publish_local(board).await;
    Ok(Json(trip))
}

#[derive(Deserialize)]
struct StepRequest {
    direction: StepDirection,
}

async fn step_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(request): Json<StepRequest>,
) -> Result<Json<Trip>, AppError> {
    let mut board = state.board.write().await;
    let trip = board
        .step_trip(&trip_id, request.direction)
        .cloned()
        .ok_or(AppError::NotFound)?;
    state.publish_local(board).await;
    Ok(Json(trip))
}

#[derive(Deserialize)]
struct AssignRequest {
    #[serde(rename = "assignedTo")]
    assigned_to: String,
}

async fn assign_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Trip>, AppError> {
    let assignee = request.assigned_to.trim().to_string();
    if !assignee.is_empty() && !ASSIGNEES.contains(&assignee.as_str()) {
        return Err(AppError::BadRequest(format!("unknown assignee: {assignee}")));
    }
    let mut board = state.board.write().await;
    let trip = board
        .assign_trip(&trip_id, &assignee)
        .cloned()
        .ok_or(AppError::NotFound)?;
    state.publish_local(board).await;
    Ok(Json(trip))
}
