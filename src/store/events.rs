//! Event Log: an append-only, per-game ring buffer used for reconnect
//! replay. Entries older than one hour are pruned lazily on append,
//! matching the Live Store's entry-TTL approach rather than running a
//! second background sweep.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::Event;

const EVENT_TTL: Duration = Duration::from_secs(60 * 60);
const MAX_ENTRIES_PER_GAME: usize = 4096;

#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: Event,
}

#[derive(Default)]
struct GameLog {
    next_seq: u64,
    entries: VecDeque<LoggedEvent>,
}

pub struct EventLog {
    games: Mutex<HashMap<Uuid, GameLog>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            games: Mutex::new(HashMap::new()),
        }
    }

    /// Append `events`, each getting the next sequence number for this
    /// game. Returns the assigned sequence numbers in order.
    pub async fn append(&self, game_id: Uuid, events: impl IntoIterator<Item = Event>) -> Vec<u64> {
        let now = Utc::now();
        let mut games = self.games.lock().await;
        let log = games.entry(game_id).or_default();

        let mut seqs = Vec::new();
        for event in events {
            let seq = log.next_seq;
            log.next_seq += 1;
            log.entries.push_back(LoggedEvent {
                seq,
                recorded_at: now,
                event,
            });
            seqs.push(seq);
        }

        prune(log, now);
        seqs
    }

    /// Every retained event for `game_id` with `seq > since`, in order —
    /// the reconnect-replay contract.
    pub async fn replay_since(&self, game_id: Uuid, since: u64) -> Vec<LoggedEvent> {
        let games = self.games.lock().await;
        let Some(log) = games.get(&game_id) else {
            return Vec::new();
        };
        log.entries.iter().filter(|e| e.seq > since).cloned().collect()
    }

    pub async fn purge(&self, game_id: Uuid) {
        self.games.lock().await.remove(&game_id);
    }
}

fn prune(log: &mut GameLog, now: DateTime<Utc>) {
    while log.entries.len() > MAX_ENTRIES_PER_GAME {
        log.entries.pop_front();
    }
    while log
        .entries
        .front()
        .is_some_and(|e| now.signed_duration_since(e.recorded_at).to_std().unwrap_or(Duration::ZERO) > EVENT_TTL)
    {
        log.entries.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state_machine::EndReason;

    #[tokio::test]
    async fn replay_returns_only_events_after_the_cursor() {
        let log = EventLog::new();
        let id = Uuid::new_v4();
        log.append(
            id,
            vec![
                Event::GameOver { reason: EndReason::Resignation },
                Event::AllocationSubmitted { player_id: "w".into() },
            ],
        )
        .await;

        let replay = log.replay_since(id, 0).await;
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].seq, 1);
    }

    #[tokio::test]
    async fn purge_drops_the_whole_game() {
        let log = EventLog::new();
        let id = Uuid::new_v4();
        log.append(id, vec![Event::AllocationSubmitted { player_id: "w".into() }]).await;
        log.purge(id).await;
        assert!(log.replay_since(id, 0).await.is_empty());
    }
}
