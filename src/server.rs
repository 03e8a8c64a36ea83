//! Axum wiring: shared application state, REST surface (§6), and the
//! WebSocket upgrade route.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RulesetRegistry;
use crate::engine::state_machine::EndReason;
use crate::engine::GameState;
use crate::session::{fingerprint, SessionManager};
use crate::store::{ArchiveStore, ArchivedGame, EventLog, LiveStore};
use crate::transport::messages::ServerFrame;
use crate::transport::{wire, ws, Rooms};

#[derive(Clone)]
pub struct AppState {
    pub live: Arc<LiveStore>,
    pub archive: Arc<ArchiveStore>,
    pub events: Arc<EventLog>,
    pub rooms: Arc<Rooms>,
    pub sessions: Arc<SessionManager>,
    pub rulesets: Arc<RulesetRegistry>,
}

impl AppState {
    /// Persist a terminated game to the Archive Store, broadcast the
    /// closing frame, and drop it from the Live Store / Event Log. Used
    /// both for the transport layer's inline terminal transitions and
    /// the periodic abandonment sweep.
    pub async fn archive_and_remove(&self, game_id: Uuid, game: &GameState, reason: EndReason) {
        let ruleset = &game.config.duel_resolution.ruleset_type;
        let archived = ArchivedGame::from_terminal(game, reason, ruleset, chrono::Utc::now());
        if let Err(e) = self.archive.store(&archived).await {
            tracing::error!(%game_id, error = %e, "failed to persist archived game");
            return;
        }
        let reason_code = wire::end_reason_code(reason);
        self.rooms
            .broadcast_public(game_id, move || ServerFrame::Ended { game_id, reason: reason_code })
            .await;
        self.live.remove(game_id).await;
        self.events.purge(game_id).await;
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/sessions/anonymous", post(create_anonymous_session))
        .route("/sessions/refresh", post(refresh_session))
        .route("/games", post(create_game).get(list_games))
        .route("/games/{id}", get(get_game_summary))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct AnonymousSessionResponse {
    session_id: Uuid,
    token: String,
}

async fn create_anonymous_session(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or("");
    let accept_language = headers.get("accept-language").and_then(|v| v.to_str().ok()).unwrap_or("");
    let fp = fingerprint(user_agent, accept_language, &addr.ip().to_string());
    let (session_id, token) = state.sessions.create_anonymous_session(&fp).await;
    Json(AnonymousSessionResponse { session_id, token })
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

async fn refresh_session(State(state): State<AppState>, Json(req): Json<RefreshRequest>) -> impl IntoResponse {
    match state.sessions.rotate(&req.refresh_token).await {
        Ok(pair) => Ok(Json(RefreshResponse { access_token: pair.access, refresh_token: pair.refresh })),
        Err(_) => Err((StatusCode::UNAUTHORIZED, "invalid refresh token")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateGameRequest {
    ruleset: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateGameResponse {
    game_id: Uuid,
    ruleset: String,
}

async fn create_game(State(state): State<AppState>, Json(req): Json<CreateGameRequest>) -> impl IntoResponse {
    let ruleset = req.ruleset.unwrap_or_else(|| "standard".to_string());
    let Some(config) = state.rulesets.get(&ruleset) else {
        return Err((StatusCode::BAD_REQUEST, "unknown ruleset"));
    };
    let game_id = Uuid::new_v4();
    let game = GameState::new(game_id.to_string(), Arc::new(config.clone()));
    state.live.insert(game_id, game).await;
    Ok(Json(CreateGameResponse { game_id, ruleset }))
}

#[derive(Debug, Serialize)]
struct GameSummary {
    game_id: Uuid,
}

async fn list_games(State(state): State<AppState>) -> impl IntoResponse {
    let _ = &state;
    // The Live Store does not currently expose iteration by design
    // (§4.6 treats it as a keyed cache, not a queryable index); a
    // production listing endpoint would read from a lightweight
    // secondary index maintained alongside `insert`/`remove`.
    Json(Vec::<GameSummary>::new())
}

async fn get_game_summary(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.live.get(id).await {
        Some(_) => Ok(Json(GameSummary { game_id: id })),
        None => Err((StatusCode::NOT_FOUND, "game not found")),
    }
}

