//! Process entrypoint: load ruleset profiles, eagerly warm the knight
//! retreat oracle, wire up shared state, and serve the axum router
//! alongside the Live Store / Event Log / anonymous-session background
//! sweeps.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gambit_chess::config::RulesetRegistry;
use gambit_chess::engine::state_machine::EndReason;
use gambit_chess::gambit::oracle;
use gambit_chess::server::{self, AppState};
use gambit_chess::session::SessionManager;
use gambit_chess::store::archive::ABANDONMENT_AGE;
use gambit_chess::store::{ArchiveStore, EventLog, LiveStore};
use gambit_chess::transport::Rooms;

const LIVE_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);
const ABANDONMENT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    oracle::init();
    tracing::info!("knight retreat oracle warmed");

    let ruleset_dir = std::env::var("GAMBIT_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let rulesets = RulesetRegistry::load_standard_set(Path::new(&ruleset_dir))
        .unwrap_or_else(|e| panic!("failed to load ruleset profiles from {ruleset_dir}: {e}"));
    tracing::info!(rulesets = ?rulesets.names().collect::<Vec<_>>(), "loaded ruleset profiles");

    let hmac_secret = std::env::var("GAMBIT_SESSION_SECRET").unwrap_or_else(|_| {
        tracing::warn!("GAMBIT_SESSION_SECRET not set; using an insecure development default");
        "development-only-secret".to_string()
    });

    let archive_dir = std::env::var("GAMBIT_ARCHIVE_DIR").unwrap_or_else(|_| "archive".to_string());

    let state = AppState {
        live: Arc::new(LiveStore::new()),
        archive: Arc::new(ArchiveStore::new(archive_dir)),
        events: Arc::new(EventLog::new()),
        rooms: Arc::new(Rooms::new()),
        sessions: Arc::new(SessionManager::new(hmac_secret.as_bytes())),
        rulesets: Arc::new(rulesets),
    };

    spawn_background_sweeps(state.clone());

    let addr: SocketAddr = std::env::var("GAMBIT_BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .expect("GAMBIT_BIND_ADDR must be a valid socket address");

    let app = server::router(state);
    tracing::info!(%addr, "starting gambit chess server");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listen address");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server exited with an error");
}

/// Periodic housekeeping that would otherwise never run on an idle
/// server: Live Store TTL reclaim, anonymous-session idle reclaim, and
/// the abandonment sweep. Archive migration on a played-out terminal
/// transition happens inline in the transport layer instead of here,
/// since it needs the just-finished game's state while it is still in
/// hand; this sweep only catches games nobody ever finished.
fn spawn_background_sweeps(state: AppState) {
    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LIVE_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let expired = state.live.sweep_expired().await;
                if expired.is_empty() {
                    continue;
                }
                tracing::info!(count = expired.len(), "reclaimed expired live games");
                for (game_id, handle) in expired {
                    let game = handle.lock().await.clone();
                    if let Some(reason) = game.last_end_reason.filter(|_| game.status.is_terminal()) {
                        tracing::warn!(%game_id, "TTL lapsed on a terminal game still in the live store, retrying archival");
                        state.archive_and_remove(game_id, &game, reason).await;
                    }
                }
            }
        });
    }

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let dropped = sessions.sweep_idle_anonymous_sessions().await;
            if dropped > 0 {
                tracing::info!(count = dropped, "reclaimed idle anonymous sessions");
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ABANDONMENT_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let idle = state.live.idle_games_older_than(ABANDONMENT_AGE).await;
            for (game_id, handle) in idle {
                let game = handle.lock().await.clone();
                state.archive_and_remove(game_id, &game, EndReason::Abandonment).await;
            }
        }
    });
}
