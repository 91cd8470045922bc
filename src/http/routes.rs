//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Extension, State},
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::error;

use crate::app::AppState;
use crate::http::middleware::{limit_commands, require_participant, AuthenticatedParticipant};
use crate::lobby::{Cancellation, Challenge, LobbyError};
use crate::race::{
    LockProgress, MatchOutcome, MatchState, ParticipantId, RaceError, StateConflict,
};
use crate::store::{CatalogError, LEADERBOARD_SIZE};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Upper bound for a single HTTP request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origins
        .iter()
        .filter_map(|s| s.parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no auth required; /ws checks its own token)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Race commands (auth + per-participant rate limit)
    let command_routes = Router::new()
        .route("/race/challenge", post(challenge_handler))
        .route("/race/accept", post(accept_handler))
        .route("/race/cancel", post(cancel_handler))
        .route("/race/pick", post(pick_handler))
        .route("/race/lock", post(lock_handler))
        .route("/race/forfeit", post(forfeit_handler))
        .layer(middleware::from_fn_with_state(state.clone(), limit_commands))
        .layer(middleware::from_fn_with_state(state.clone(), require_participant));

    // Read-only routes (auth required)
    let query_routes = Router::new()
        .route("/race/current", get(current_handler))
        .route("/race/wins", get(wins_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_participant));

    Router::new()
        .merge(public_routes)
        .merge(command_routes)
        .merge(query_routes)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub live_matches: usize,
    pub running_matches: usize,
    pub occupied_participants: usize,
    pub pending_challenges: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: uptime_secs(),
        live_matches: state.table.live_matches(),
        running_matches: state.table.running_matches(),
        occupied_participants: state.registry.occupied(),
        pending_challenges: state.lobby.pending_challenges(),
    })
}

// ============================================================================
// Race commands
// ============================================================================

#[derive(Deserialize)]
struct ChallengeRequest {
    opponent: ParticipantId,
    track_length: u64,
}

async fn challenge_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedParticipant>,
    Json(req): Json<ChallengeRequest>,
) -> Result<(StatusCode, Json<Challenge>), AppError> {
    let challenge = state
        .lobby
        .challenge(auth.participant, req.opponent, req.track_length)?;
    Ok((StatusCode::CREATED, Json(challenge)))
}

async fn accept_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedParticipant>,
) -> Result<Json<MatchState>, AppError> {
    Ok(Json(state.lobby.accept(auth.participant)?))
}

async fn cancel_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedParticipant>,
) -> Result<Json<Cancellation>, AppError> {
    Ok(Json(state.lobby.cancel(auth.participant)?))
}

#[derive(Deserialize)]
struct PickRequest {
    unit: String,
}

#[derive(Serialize)]
struct PickResponse {
    unit: String,
    roster_size: usize,
}

async fn pick_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedParticipant>,
    Json(req): Json<PickRequest>,
) -> Result<Json<PickResponse>, AppError> {
    let roster_size = state.lobby.pick(auth.participant, &req.unit).await?;
    Ok(Json(PickResponse {
        unit: req.unit,
        roster_size,
    }))
}

#[derive(Serialize)]
struct LockResponse {
    progress: LockProgress,
}

async fn lock_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedParticipant>,
) -> Result<Json<LockResponse>, AppError> {
    let progress = state.lobby.lock(auth.participant)?;
    Ok(Json(LockResponse { progress }))
}

#[derive(Serialize)]
struct ForfeitResponse {
    outcome: MatchOutcome,
}

async fn forfeit_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedParticipant>,
) -> Result<Json<ForfeitResponse>, AppError> {
    let outcome = state.lobby.forfeit(auth.participant).await?;
    Ok(Json(ForfeitResponse { outcome }))
}

// ============================================================================
// Queries
// ============================================================================

async fn current_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedParticipant>,
) -> Result<Json<MatchState>, AppError> {
    Ok(Json(state.lobby.current(auth.participant)?))
}

#[derive(Serialize)]
struct WinsResponse {
    participant: ParticipantId,
    wins: u64,
}

async fn wins_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedParticipant>,
) -> Result<Json<WinsResponse>, AppError> {
    let wins = state
        .wins
        .wins(auth.participant)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(WinsResponse {
        participant: auth.participant,
        wins,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub participant: ParticipantId,
    pub name: String,
    pub wins: u64,
}

async fn leaderboard_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let standings = state
        .wins
        .leaderboard(LEADERBOARD_SIZE)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let names = join_all(
        standings
            .iter()
            .map(|s| state.identities.display_name(s.participant)),
    )
    .await;

    let entries = standings
        .into_iter()
        .zip(names)
        .map(|(standing, name)| LeaderboardEntry {
            rank: standing.rank,
            participant: standing.participant,
            name: name.unwrap_or_else(|_| format!("User {}", standing.participant)),
            wins: standing.wins,
        })
        .collect();

    Ok(Json(entries))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LobbyError> for AppError {
    fn from(err: LobbyError) -> Self {
        match err {
            LobbyError::Race(RaceError::Validation(e)) => AppError::BadRequest(e.to_string()),
            LobbyError::Race(RaceError::Conflict(e @ StateConflict::NoSuchMatch(_))) => {
                AppError::NotFound(e.to_string())
            }
            LobbyError::Race(RaceError::Conflict(e)) => AppError::Conflict(e.to_string()),
            LobbyError::Catalog(e @ CatalogError::NotFound(_)) => AppError::NotFound(e.to_string()),
            LobbyError::Catalog(e @ CatalogError::Unavailable(_)) => {
                error!(error = %e, "Unit catalog unavailable");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
