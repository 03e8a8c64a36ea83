//! Per-game fan-out. Unlike a single shared broadcast channel, each
//! subscriber gets its own `mpsc` sender so publishing can hand every
//! recipient a snapshot filtered to *their* [`Viewer`] role — the View
//! Filter invariant (§4.7) requires different bytes per recipient, not
//! just a shared multicast. Each subscriber's queue is bounded; a
//! connection that cannot keep up is dropped rather than left to grow
//! without bound, per §5's backpressure contract.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::engine::view_filter::{self, Viewer};
use crate::engine::GameState;
use crate::transport::messages::{Envelope, ServerFrame};
use crate::transport::wire::GameStateWire;

/// Per-connection outbound queue depth before the connection is
/// considered unable to keep up and is dropped.
const QUEUE_CAPACITY: usize = 64;

struct Subscriber {
    viewer: Viewer,
    tx: mpsc::Sender<Envelope>,
}

#[derive(Default)]
pub struct Rooms {
    games: RwLock<HashMap<Uuid, HashMap<Uuid, Subscriber>>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn_id` as a subscriber of `game_id` with the given
    /// viewer role, returning the receiving half of its private
    /// channel.
    pub async fn join(&self, game_id: Uuid, conn_id: Uuid, viewer: Viewer) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        self.games.write().await.entry(game_id).or_default().insert(conn_id, Subscriber { viewer, tx });
        rx
    }

    /// Update a subscriber's viewer role in place — used when a
    /// spectator's `Join` seats them as a player, so every broadcast
    /// after that point reflects their new role instead of the one
    /// cached at connect time.
    pub async fn update_viewer(&self, game_id: Uuid, conn_id: Uuid, viewer: Viewer) {
        let mut games = self.games.write().await;
        if let Some(sub) = games.get_mut(&game_id).and_then(|subs| subs.get_mut(&conn_id)) {
            sub.viewer = viewer;
        }
    }

    pub async fn leave(&self, game_id: Uuid, conn_id: Uuid) {
        let mut games = self.games.write().await;
        if let Some(subs) = games.get_mut(&game_id) {
            subs.remove(&conn_id);
            if subs.is_empty() {
                games.remove(&game_id);
            }
        }
    }

    /// Drop subscribers whose queue rejected the last send: either the
    /// socket is gone (closed) or the connection is too slow to drain
    /// its queue (full). Both are treated the same — the client must
    /// reconnect.
    async fn evict(&self, game_id: Uuid, stale: Vec<Uuid>) {
        if stale.is_empty() {
            return;
        }
        let mut games = self.games.write().await;
        if let Some(subs) = games.get_mut(&game_id) {
            for conn_id in stale {
                subs.remove(&conn_id);
            }
            if subs.is_empty() {
                games.remove(&game_id);
            }
        }
    }

    /// Push a freshly-filtered snapshot of `game` to every subscriber,
    /// each seeing only what their role is entitled to.
    pub async fn broadcast_state(&self, game_id: Uuid, game: &GameState) {
        let mut stale = Vec::new();
        {
            let games = self.games.read().await;
            let Some(subs) = games.get(&game_id) else { return };
            for (conn_id, sub) in subs {
                let view = view_filter::filter(game, sub.viewer);
                let wire = GameStateWire::from(&view);
                let envelope = Envelope::new(ServerFrame::StateUpdated { game_id, state: wire });
                if sub.tx.try_send(envelope).is_err() {
                    stale.push(*conn_id);
                }
            }
        }
        self.evict(game_id, stale).await;
    }

    /// Send the same envelope, built once per subscriber, to every
    /// subscriber. For frames with no viewer-sensitive payload (duel
    /// started, tactical-retreat made, game-over, chat).
    pub async fn broadcast_public(&self, game_id: Uuid, build: impl Fn() -> ServerFrame) {
        let mut stale = Vec::new();
        {
            let games = self.games.read().await;
            let Some(subs) = games.get(&game_id) else { return };
            for (conn_id, sub) in subs {
                if sub.tx.try_send(Envelope::new(build())).is_err() {
                    stale.push(*conn_id);
                }
            }
        }
        self.evict(game_id, stale).await;
    }

    /// Build a frame per subscriber from their own [`Viewer`] role,
    /// skipping subscribers `build` returns `None` for entirely (a
    /// directed event like `ALLOCATION_SUBMITTED`, which only its
    /// submitter should see).
    pub async fn broadcast_viewer_aware(&self, game_id: Uuid, build: impl Fn(Viewer) -> Option<ServerFrame>) {
        let mut stale = Vec::new();
        {
            let games = self.games.read().await;
            let Some(subs) = games.get(&game_id) else { return };
            for (conn_id, sub) in subs {
                let Some(frame) = build(sub.viewer) else { continue };
                if sub.tx.try_send(Envelope::new(frame)).is_err() {
                    stale.push(*conn_id);
                }
            }
        }
        self.evict(game_id, stale).await;
    }

    /// Send an envelope to one subscriber only (e.g. a move rejection,
    /// which only the submitter should see).
    pub async fn send_to(&self, game_id: Uuid, conn_id: Uuid, envelope: Envelope) {
        let failed = {
            let games = self.games.read().await;
            let Some(sub) = games.get(&game_id).and_then(|subs| subs.get(&conn_id)) else {
                return;
            };
            sub.tx.try_send(envelope).is_err()
        };
        if failed {
            self.evict(game_id, vec![conn_id]).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn test_game() -> GameState {
        let config = Arc::new(Config::from_toml(include_str!("../../config/standard.toml")).unwrap());
        GameState::new("g1".into(), config)
    }

    #[tokio::test]
    async fn subscriber_gets_a_filtered_state_snapshot() {
        let rooms = Rooms::new();
        let game_id = Uuid::new_v4();
        let mut rx = rooms.join(game_id, Uuid::new_v4(), Viewer::Spectator).await;

        rooms.broadcast_state(game_id, &test_game()).await;

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(envelope.frame, ServerFrame::StateUpdated { .. }));
    }

    #[tokio::test]
    async fn leaving_removes_the_subscriber() {
        let rooms = Rooms::new();
        let game_id = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let _rx = rooms.join(game_id, conn, Viewer::Spectator).await;
        rooms.leave(game_id, conn).await;
        // No subscribers left; this must not panic or block.
        rooms.broadcast_state(game_id, &test_game()).await;
    }
}
