use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use pantheon::{history_limit, DebateView};
use pantheon_agents::RoundDriver;
use pantheon_ledger::{Ledger, LedgerError};
use pantheon_models::{DebateStats, ParsedDebate};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::error::DaemonError;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<RoundDriver>,
    pub ledger: Arc<dyn Ledger>,
    pub scheduler: Option<Arc<Scheduler>>,
    /// Rounds started by the trigger endpoint. Shared with the scheduler
    /// when there is one.
    pub rounds: TaskTracker,
    pub started: Instant,
}

impl AppState {
    pub fn new(driver: Arc<RoundDriver>, scheduler: Option<Arc<Scheduler>>) -> Self {
        let rounds = scheduler
            .as_ref()
            .map(|s| s.rounds())
            .unwrap_or_default();
        Self {
            ledger: driver.ledger(),
            driver,
            scheduler,
            rounds,
            started: Instant::now(),
        }
    }
}

/// Request failures rendered as `{success: false, error}`.
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    BadRequest(String),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(e @ LedgerError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Ledger(e) => {
                error!(error = %e, "Ledger request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        let body = json!({ "success": false, "error": message });
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/status", get(status))
        .route("/api/debate/latest", get(latest_debate))
        .route("/api/debate/count", get(debate_count))
        .route("/api/debate/history", get(debate_history))
        .route("/api/debate/stats", get(debate_stats))
        .route("/api/debate/trigger", post(trigger_round))
        .route("/api/debate/:id", get(debate_by_id))
        .with_state(state)
}

/// Serve until `cancel` fires, then drain open connections.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), DaemonError> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP API listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("HTTP API stopped");
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "pantheon-daemon",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started.elapsed().as_secs(),
        "timestamp": Utc::now(),
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "driver": state.driver.status(),
        "scheduler": state.scheduler.as_ref().map(|s| s.stats()),
    }))
}

async fn latest_debate(State(state): State<AppState>) -> ApiResult {
    match state.ledger.latest_debate().await? {
        Some(record) => Ok(Json(json!({
            "success": true,
            "debate": DebateView::from(record),
        }))),
        None => Ok(Json(json!({
            "success": true,
            "message": "No debates yet",
            "totalDebates": 0,
        }))),
    }
}

async fn debate_count(State(state): State<AppState>) -> ApiResult {
    let total = state.ledger.total_debates().await?;
    Ok(Json(json!({ "success": true, "totalDebates": total })))
}

async fn debate_by_id(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult {
    let Path(id) = id?;
    let record = state.ledger.debate(id).await?;
    Ok(Json(json!({ "success": true, "debate": DebateView::from(record) })))
}

async fn debate_history(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    let limit = history_limit(query.limit);
    let debates: Vec<DebateView> = state
        .ledger
        .recent_debates(limit)
        .await?
        .into_iter()
        .map(DebateView::from)
        .collect();
    Ok(Json(json!({
        "success": true,
        "count": debates.len(),
        "debates": debates,
    })))
}

async fn debate_stats(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    let limit = history_limit(query.limit);
    let records = state.ledger.recent_debates(limit).await?;
    let fetched = records.len();
    let parsed: Vec<ParsedDebate> = records
        .iter()
        .filter_map(|record| match record.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(id = record.id, error = %e, "Skipping undecodable debate");
                None
            }
        })
        .collect();
    Ok(Json(json!({
        "success": true,
        "window": fetched,
        "stats": DebateStats::from_debates(&parsed),
    })))
}

async fn trigger_round(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let Some(permit) = state.driver.try_begin() else {
        info!("Manual trigger rejected, round already in flight");
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "error": "A debate round is already in progress",
            })),
        );
    };

    let round_id = permit.round_id();
    info!(round_id = %round_id, "Manual round triggered");
    let driver = Arc::clone(&state.driver);
    state.rounds.spawn(async move {
        if let Err(e) = driver.run_with_permit(permit).await {
            error!(round_id = %round_id, error = %e, "Manual round failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "message": "Debate round started",
            "roundId": round_id,
        })),
    )
}
