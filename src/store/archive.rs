//! Archive Store: durable persistence of terminated games, and the
//! abandonment sweep that reclaims games nobody ever finished.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rootcause::ResultExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::state_machine::{EndReason, GameState, Status};
use crate::model::notation::CoordNotation;
use crate::model::{ChessColor, ChessMove};

/// Abandonment cleanup threshold: a game with no Live Store presence
/// that never left WAITING_FOR_PLAYERS/IN_PROGRESS for this long is
/// archived as abandoned.
pub const ABANDONMENT_AGE: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    White,
    Black,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchivedReason {
    Checkmate,
    Stalemate,
    Resignation,
    Agreement,
    FiftyMove,
    ThreefoldRepetition,
    InsufficientMaterial,
    Abandonment,
    TimeForfeit,
}

impl ArchivedReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::Checkmate => "CHECKMATE",
            Self::Stalemate => "STALEMATE",
            Self::Resignation => "RESIGNATION",
            Self::Agreement => "AGREEMENT",
            Self::FiftyMove => "FIFTY_MOVE",
            Self::ThreefoldRepetition => "THREEFOLD_REPETITION",
            Self::InsufficientMaterial => "INSUFFICIENT_MATERIAL",
            Self::Abandonment => "ABANDONMENT",
            Self::TimeForfeit => "TIME_FORFEIT",
        }
    }
}

impl From<EndReason> for ArchivedReason {
    fn from(value: EndReason) -> Self {
        match value {
            EndReason::Checkmate => Self::Checkmate,
            EndReason::Stalemate => Self::Stalemate,
            EndReason::Resignation => Self::Resignation,
            EndReason::Agreement => Self::Agreement,
            EndReason::FiftyMove => Self::FiftyMove,
            EndReason::ThreefoldRepetition => Self::ThreefoldRepetition,
            EndReason::InsufficientMaterial => Self::InsufficientMaterial,
            EndReason::Abandonment => Self::Abandonment,
            EndReason::TimeForfeit => Self::TimeForfeit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedGame {
    pub id: String,
    pub result: GameResult,
    pub reason: ArchivedReason,
    pub final_fingerprint: u64,
    pub moves: Vec<String>,
    pub white_id: Option<String>,
    pub black_id: Option<String>,
    pub ruleset: String,
    pub created_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

fn move_to_wire(mv: &ChessMove) -> String {
    CoordNotation {
        from: mv.from,
        to: mv.to,
        prom: mv.promotion(),
    }
    .to_string()
}

fn decisive_result(game: &GameState) -> GameResult {
    // For an actual checkmate/stalemate, `current_turn` is whoever is on
    // move in the terminal position; for checkmate that's the loser. For
    // a resignation, `decisive_loser` names the loser directly.
    let loser = game.decisive_loser.unwrap_or(game.current_turn);
    match loser {
        ChessColor::WHITE => GameResult::Black,
        ChessColor::BLACK => GameResult::White,
    }
}

impl ArchivedGame {
    pub fn from_terminal(game: &GameState, reason: EndReason, ruleset: &str, ended_at: DateTime<Utc>) -> Self {
        let result = match game.status {
            Status::Stalemate | Status::Draw => GameResult::Draw,
            _ => decisive_result(game),
        };

        Self {
            id: game.id.clone(),
            result,
            reason: reason.into(),
            final_fingerprint: game.board.fingerprint(),
            moves: game.move_history.iter().map(|r| move_to_wire(&r.mv)).collect(),
            white_id: game.white.as_ref().map(|p| p.id.clone()),
            black_id: game.black.as_ref().map(|p| p.id.clone()),
            ruleset: ruleset.to_string(),
            created_at: game.created_at,
            ended_at,
        }
    }
}

/// Durable, file-backed archive: one JSON document per game under
/// `root/<id>.json`. A production deployment would swap this for a
/// real database without touching callers, since the interface is
/// already async.
///
/// I/O failures here are infrastructure glue, not a game rule outcome,
/// so they're reported via [`rootcause`] rather than a bespoke error
/// enum: the caller logs the full `Report` and degrades to
/// `GameError::ServerError` at the transport boundary.
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub async fn store(&self, archived: &ArchivedGame) -> rootcause::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .context("creating archive root directory")?;
        let body = serde_json::to_vec_pretty(archived).context("serializing archived game")?;
        tokio::fs::write(self.path_for(&archived.id), body)
            .await
            .context("writing archived game to disk")?;
        Ok(())
    }

    pub async fn load(&self, id: &str) -> rootcause::Result<ArchivedGame> {
        let body = tokio::fs::read(self.path_for(id)).await.context("reading archived game from disk")?;
        serde_json::from_slice(&body).context("deserializing archived game")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn finished_game() -> GameState {
        let config = Arc::new(Config::from_toml(include_str!("../../config/standard.toml")).unwrap());
        let mut game = GameState::new("archived-1".into(), config);
        game.apply(crate::engine::Input::Join { player_id: "white".into() }).unwrap();
        game.apply(crate::engine::Input::Join { player_id: "black".into() }).unwrap();
        game.decisive_loser = Some(ChessColor::BLACK);
        game.status = Status::Checkmate;
        game
    }

    #[tokio::test]
    async fn archived_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("gambit-archive-test-{}", Uuid::new_v4()));
        let store = ArchiveStore::new(&dir);
        let game = finished_game();
        let archived = ArchivedGame::from_terminal(&game, EndReason::Resignation, "standard", Utc::now());

        store.store(&archived).await.unwrap();
        let loaded = store.load(&archived.id).await.unwrap();
        assert_eq!(loaded.result, GameResult::White);
        assert_eq!(loaded.reason, ArchivedReason::Resignation);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
