//! Live Store: the in-memory cache of active games, each TTL-bounded at
//! 24h from its last touch. A game is removed here the instant it is
//! migrated to the Archive Store on a terminal transition, or when its
//! TTL lapses and the periodic sweep reclaims it.

use std::collections::HashMap;
use std::future::poll_fn;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio_util::time::delay_queue::Key;
use tokio_util::time::DelayQueue;
use uuid::Uuid;

use crate::engine::GameState;

const LIVE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    game: Arc<Mutex<GameState>>,
    expiry: Key,
}

/// Shared handle to every in-progress game. Cheap to clone (an `Arc`
/// internally); one instance lives for the process lifetime.
pub struct LiveStore {
    games: RwLock<HashMap<Uuid, Entry>>,
    expirations: Mutex<DelayQueue<Uuid>>,
}

impl Default for LiveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveStore {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            expirations: Mutex::new(DelayQueue::new()),
        }
    }

    pub async fn insert(&self, id: Uuid, game: GameState) -> Arc<Mutex<GameState>> {
        let handle = Arc::new(Mutex::new(game));
        let expiry = self.expirations.lock().await.insert(id, LIVE_TTL);
        self.games.write().await.insert(
            id,
            Entry {
                game: handle.clone(),
                expiry,
            },
        );
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<GameState>>> {
        self.games.read().await.get(&id).map(|e| e.game.clone())
    }

    /// Reset a game's TTL to a fresh 24h window. Called by the transport
    /// layer after any accepted input, so an abandoned-but-not-terminal
    /// game still expires on schedule.
    pub async fn touch(&self, id: Uuid) {
        let games = self.games.read().await;
        let Some(entry) = games.get(&id) else { return };
        self.expirations.lock().await.reset(&entry.expiry, LIVE_TTL);
    }

    /// Remove a game from the live cache, e.g. on terminal transition
    /// before migrating it to the Archive Store.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<Mutex<GameState>>> {
        let mut games = self.games.write().await;
        let entry = games.remove(&id)?;
        self.expirations.lock().await.remove(&entry.expiry);
        Some(entry.game)
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    /// Drain every currently-lapsed TTL without blocking for the next
    /// one. Intended to be called periodically by a background task;
    /// does *not* archive the returned handles itself. A terminal game
    /// can still be sitting here if an earlier `archive_and_remove`
    /// failed to persist it (it only evicts on success) — returning the
    /// handle rather than just the id lets the caller give archiving
    /// one more try before the game is gone for good.
    pub async fn sweep_expired(&self) -> Vec<(Uuid, Arc<Mutex<GameState>>)> {
        let mut queue = self.expirations.lock().await;
        let mut expired = Vec::new();
        loop {
            let polled = tokio::time::timeout(Duration::ZERO, poll_fn(|cx| queue.poll_expired(cx))).await;
            match polled {
                Ok(Some(Ok(key))) => expired.push(key.into_inner()),
                _ => break,
            }
        }
        drop(queue);

        let mut games = self.games.write().await;
        let mut result = Vec::with_capacity(expired.len());
        for id in &expired {
            if let Some(entry) = games.remove(id) {
                result.push((*id, entry.game));
            }
        }
        result
    }

    /// Non-terminal games in the Live Store whose last successfully
    /// applied input was more than `max_age` ago. Returns handles rather
    /// than removing them; the caller archives each one under
    /// `EndReason::Abandonment` and then calls [`LiveStore::remove`].
    /// Keyed off `last_activity` rather than `created_at` — an
    /// untimed game that's been actively played for hours is not
    /// abandoned just because it's old.
    pub async fn idle_games_older_than(&self, max_age: Duration) -> Vec<(Uuid, Arc<Mutex<GameState>>)> {
        let games = self.games.read().await;
        let mut idle = Vec::new();
        for (id, entry) in games.iter() {
            let game = entry.game.lock().await;
            if game.status.is_terminal() {
                continue;
            }
            let age = chrono::Utc::now().signed_duration_since(game.last_activity);
            if age > chrono::Duration::from_std(max_age).expect("max_age fits in a chrono::Duration") {
                idle.push((*id, entry.game.clone()));
            }
        }
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    use crate::config::Config;

    fn test_game() -> GameState {
        let config = StdArc::new(Config::from_toml(include_str!("../../config/standard.toml")).unwrap());
        GameState::new("g1".into(), config)
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = LiveStore::new();
        let id = Uuid::new_v4();
        store.insert(id, test_game()).await;
        assert!(store.get(id).await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let store = LiveStore::new();
        let id = Uuid::new_v4();
        store.insert(id, test_game()).await;
        assert!(store.remove(id).await.is_some());
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn sweep_is_empty_before_ttl_elapses() {
        let store = LiveStore::new();
        let id = Uuid::new_v4();
        store.insert(id, test_game()).await;
        assert!(store.sweep_expired().await.is_empty());
        assert!(store.get(id).await.is_some());
    }

    #[tokio::test]
    async fn idle_scan_ignores_fresh_games_and_finds_stale_ones() {
        let store = LiveStore::new();
        let fresh_id = Uuid::new_v4();
        store.insert(fresh_id, test_game()).await;

        let stale_id = Uuid::new_v4();
        let handle = store.insert(stale_id, test_game()).await;
        handle.lock().await.last_activity = chrono::Utc::now() - chrono::Duration::hours(3);

        let idle = store.idle_games_older_than(Duration::from_secs(2 * 60 * 60)).await;
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].0, stale_id);
    }
}
