//! WebSocket connection handling: handshake authentication, per-game
//! room membership, and the client-frame → engine-input dispatch loop.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::errors::GameError;
use crate::engine::view_filter::Viewer;
use crate::engine::Input;
use crate::session::{authorize, fingerprint, Identity, Role};
use crate::server::AppState;
use crate::transport::messages::{Envelope, ErrorPayload, ServerFrame};
use crate::transport::wire;
use crate::transport::ClientFrame;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub game_id: Uuid,
    pub token: Option<String>,
    pub anonymous_session_token: Option<String>,
    /// Event Log cursor a reconnecting client last saw. When present,
    /// every retained event past this sequence is replayed before the
    /// fresh state snapshot, per §6's reconnection contract.
    pub since: Option<u64>,
}

/// Resolve the handshake's `token`/`anonymousSessionToken` pair into an
/// [`Identity`]. Missing or invalid auth is rejected before the socket
/// is ever upgraded, per §6: "Missing/invalid auth closes the
/// connection."
async fn authenticate(state: &AppState, query: &WsQuery, headers: &HeaderMap, addr: SocketAddr) -> Option<Identity> {
    if let Some(token) = &query.token {
        return state.sessions.validate_access(token).ok().map(Identity::Registered);
    }
    if let Some(token) = &query.anonymous_session_token {
        let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or("");
        let accept_language = headers.get("accept-language").and_then(|v| v.to_str().ok()).unwrap_or("");
        let fp = fingerprint(user_agent, accept_language, &addr.ip().to_string());
        return state.sessions.validate_anonymous(token, &fp).await.ok().map(Identity::Anonymous);
    }
    None
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Some(identity) = authenticate(&state, &query, &headers, addr).await else {
        return (StatusCode::UNAUTHORIZED, "missing or invalid credentials").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, query.game_id, identity, query.since))
}

fn player_id_for(identity: &Identity) -> String {
    match identity {
        Identity::Registered(id) => id.clone(),
        Identity::Anonymous(session) => session.to_string(),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, game_id: Uuid, identity: Identity, since: Option<u64>) {
    let Some(handle) = state.live.get(game_id).await else {
        let (mut sender, _) = socket.split();
        let envelope = Envelope::new(ServerFrame::Error {
            game_id: Some(game_id),
            error: ErrorPayload { code: GameError::GameNotFound.code(), request_id: Uuid::new_v4() },
        });
        let _ = sender.send(Message::Text(serde_json::to_string(&envelope).unwrap_or_default().into())).await;
        return;
    };

    // Resolve the viewer role, register the room subscription, and
    // replay any missed history all under the same game lock that
    // `handle_frame` takes to apply + log an input. That serializes
    // reconnection against concurrent moves on this game: nothing can
    // append a new event between the replay read and the room join
    // completing, so the live broadcast stream picked up by `rx` can't
    // race with (duplicate or skip past) the replayed history below.
    let conn_id = Uuid::new_v4();
    let mut rx = {
        let game = handle.lock().await;
        let viewer = match authorize(&identity, game.white.as_ref().map(|p| p.id.as_str()), game.black.as_ref().map(|p| p.id.as_str())) {
            Role::Player(color) => Viewer::Player(color),
            Role::Spectator => Viewer::Spectator,
        };
        let rx = state.rooms.join(game_id, conn_id, viewer).await;

        if let Some(since) = since {
            for logged in state.events.replay_since(game_id, since).await {
                let Some(event) = wire::event_wire_for_viewer(&logged.event, &game, viewer) else { continue };
                let envelope = Envelope::with_sequence(ServerFrame::Event { game_id, seq: logged.seq, event }, logged.seq);
                state.rooms.send_to(game_id, conn_id, envelope).await;
            }
        }

        state.rooms.broadcast_state(game_id, &game).await;
        rx
    };

    let (mut sender, mut receiver) = socket.split();

    let forward = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&envelope) else { continue };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => handle_frame(&state, game_id, conn_id, &identity, &handle, frame).await,
                    Err(_) => {
                        let envelope = Envelope::new(ServerFrame::Error {
                            game_id: Some(game_id),
                            error: ErrorPayload { code: GameError::InvalidAction.code(), request_id: Uuid::new_v4() },
                        });
                        state.rooms.send_to(game_id, conn_id, envelope).await;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
    state.rooms.leave(game_id, conn_id).await;

    let was_player = {
        let game = handle.lock().await;
        matches!(
            authorize(&identity, game.white.as_ref().map(|p| p.id.as_str()), game.black.as_ref().map(|p| p.id.as_str())),
            Role::Player(_)
        )
    };
    if was_player {
        state
            .rooms
            .broadcast_public(game_id, move || ServerFrame::PlayerDisconnected {
                game_id,
                player_id: player_id_for(&identity),
            })
            .await;
    }
}

async fn handle_frame(
    state: &AppState,
    game_id: Uuid,
    conn_id: Uuid,
    identity: &Identity,
    handle: &std::sync::Arc<tokio::sync::Mutex<crate::engine::GameState>>,
    frame: ClientFrame,
) {
    let player_id = player_id_for(identity);

    let input = match frame {
        ClientFrame::Join { .. } => Some(Input::Join { player_id: player_id.clone() }),
        ClientFrame::Move { mv, .. } => match wire::move_from_wire(&mv.from, &mv.to, mv.promotion.as_deref()) {
            Some(mv) => Some(Input::Move { player_id: player_id.clone(), mv }),
            None => {
                send_error(state, game_id, conn_id, GameError::IllegalMove).await;
                None
            }
        },
        ClientFrame::DuelAllocation { allocation, .. } => {
            Some(Input::Allocate { player_id: player_id.clone(), amount: allocation })
        }
        ClientFrame::TacticalRetreat { retreat_square, .. } => match wire::square_from_wire(&retreat_square) {
            Some(square) => Some(Input::Retreat { player_id: player_id.clone(), square }),
            None => {
                send_error(state, game_id, conn_id, GameError::InvalidRetreat).await;
                None
            }
        },
        ClientFrame::Resign { .. } => Some(Input::Resign { player_id: player_id.clone() }),
        ClientFrame::OfferDraw { .. } => Some(Input::OfferDraw { player_id: player_id.clone() }),
        ClientFrame::RespondDraw { accept, .. } => Some(Input::RespondDraw { player_id: player_id.clone(), accept }),
        ClientFrame::GetState { .. } => {
            let game = handle.lock().await;
            state.rooms.broadcast_state(game_id, &game).await;
            None
        }
        ClientFrame::Chat { text, .. } => {
            let player_id = player_id.clone();
            state
                .rooms
                .broadcast_public(game_id, move || ServerFrame::Chat {
                    game_id,
                    player_id: player_id.clone(),
                    text: text.clone(),
                })
                .await;
            None
        }
        ClientFrame::Ping => None,
    };

    let Some(input) = input else { return };

    let is_join = matches!(input, Input::Join { .. });
    // Apply and log the resulting events under the same lock, so the
    // Event Log's sequence order always matches the order GameState was
    // actually mutated in, even when two connections race on the same
    // game. Everything after that — per-subscriber fan-out, archiving —
    // is read-only and I/O bound, so it runs against a cloned snapshot
    // once the guard is dropped, instead of holding up other
    // connections to this game for the duration.
    let result = {
        let mut game = handle.lock().await;
        match game.apply(input) {
            Ok(events) => {
                let seqs = state.events.append(game_id, events.clone()).await;
                Ok((seqs, events, game.clone()))
            }
            Err(error) => Err(error),
        }
    };

    match result {
        Ok((seqs, events, game)) => {
            let end_reason = events.iter().find_map(|e| match e {
                crate::engine::Event::GameOver { reason } => Some(*reason),
                _ => None,
            });

            if is_join {
                let viewer = match authorize(identity, game.white.as_ref().map(|p| p.id.as_str()), game.black.as_ref().map(|p| p.id.as_str())) {
                    Role::Player(color) => Viewer::Player(color),
                    Role::Spectator => Viewer::Spectator,
                };
                state.rooms.update_viewer(game_id, conn_id, viewer).await;
            }

            for (seq, event) in seqs.into_iter().zip(events) {
                state
                    .rooms
                    .broadcast_viewer_aware(game_id, |viewer| {
                        let wire_event = wire::event_wire_for_viewer(&event, &game, viewer)?;
                        Some(ServerFrame::Event { game_id, seq, event: wire_event })
                    })
                    .await;
            }
            state.rooms.broadcast_state(game_id, &game).await;

            match end_reason {
                Some(reason) => state.archive_and_remove(game_id, &game, reason).await,
                None => state.live.touch(game_id).await,
            }
        }
        Err(error) => {
            send_error(state, game_id, conn_id, error).await;
        }
    }
}

async fn send_error(state: &AppState, game_id: Uuid, conn_id: Uuid, error: GameError) {
    let envelope = Envelope::new(ServerFrame::Error {
        game_id: Some(game_id),
        error: ErrorPayload { code: error.code(), request_id: Uuid::new_v4() },
    });
    state.rooms.send_to(game_id, conn_id, envelope).await;
}
