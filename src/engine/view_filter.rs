//! View Filter (§4.7): projects the single authoritative `GameState`
//! into the snapshot a particular viewer is allowed to see.

use crate::config::Config;
use crate::engine::state_machine::{DuelResult, GameState, MoveRecord, Player, RetreatRecord, Status};
use crate::gambit::duel::PendingDuel;
use crate::gambit::regen::BpCalculationReport;
use crate::model::{ChessColor, ChessMove, ChessPiece};

/// Sentinel for a value hidden from this viewer, per §4.7.
pub const HIDDEN: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Player(ChessColor),
    Spectator,
}

#[derive(Debug, Clone)]
pub struct PlayerView {
    pub id: String,
    /// `HIDDEN` sentinel when this player's BP is concealed from the
    /// requesting viewer.
    pub battle_points: i64,
}

#[derive(Debug, Clone)]
pub struct PendingDuelView {
    pub attacker_color: ChessColor,
    pub defender_color: ChessColor,
    pub attacking_piece: ChessPiece,
    pub defending_piece: ChessPiece,
    pub attacker_allocation: Option<i64>,
    pub defender_allocation: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MoveRecordView {
    pub mv: ChessMove,
    pub duel_result: Option<DuelResult>,
    pub retreat: Option<RetreatRecord>,
    pub bp_regeneration: Option<BpCalculationReport>,
    pub side_to_move: ChessColor,
}

#[derive(Debug, Clone)]
pub struct GameStateView {
    pub id: String,
    pub white: Option<PlayerView>,
    pub black: Option<PlayerView>,
    pub current_turn: ChessColor,
    pub status: Status,
    pub move_history: Vec<MoveRecordView>,
    pub pending_duel: Option<PendingDuelView>,
    pub last_bp_calculation_report: Option<BpCalculationReport>,
}

fn player_view(player: &Player, hide: bool) -> PlayerView {
    PlayerView {
        id: player.id.clone(),
        battle_points: if hide { HIDDEN } else { player.battle_points as i64 },
    }
}

fn duel_view(duel: &PendingDuel, viewer: Viewer) -> PendingDuelView {
    let reveal = |color: ChessColor, amount: Option<u32>| -> Option<i64> {
        match viewer {
            Viewer::Player(v) if v == color => amount.map(|a| a as i64),
            _ => None,
        }
    };
    PendingDuelView {
        attacker_color: duel.attacker_color,
        defender_color: duel.defender_color,
        attacking_piece: duel.attacking_piece,
        defending_piece: duel.defending_piece,
        attacker_allocation: reveal(duel.attacker_color, duel.attacker_allocation),
        defender_allocation: reveal(duel.defender_color, duel.defender_allocation),
    }
}

fn move_record_view(record: &MoveRecord, viewer: Viewer, config: &Config) -> MoveRecordView {
    let mover = record.side_to_move.opp();
    let strip_bp_report = config.information_hiding.hide_allocation_history
        || !matches!(viewer, Viewer::Player(v) if v == mover);
    MoveRecordView {
        mv: record.mv,
        duel_result: record.duel_result,
        retreat: record.retreat,
        bp_regeneration: if strip_bp_report { None } else { record.bp_regeneration.clone() },
        side_to_move: record.side_to_move,
    }
}

/// Derive `viewer`'s filtered snapshot of `game`, per §4.7's rules:
/// spectators see both BP totals hidden and no allocation fields at
/// all; a player sees their own BP and allocation but not the
/// opponent's until the duel resolves; the turn's `bpCalculationReport`
/// is delivered only to the player who just moved.
pub fn filter(game: &GameState, viewer: Viewer) -> GameStateView {
    let hide_opponent_bp = game.config.information_hiding.hide_battle_points;

    let white_hidden = match viewer {
        Viewer::Player(ChessColor::WHITE) => false,
        Viewer::Player(ChessColor::BLACK) => hide_opponent_bp,
        Viewer::Spectator => true,
    };
    let black_hidden = match viewer {
        Viewer::Player(ChessColor::BLACK) => false,
        Viewer::Player(ChessColor::WHITE) => hide_opponent_bp,
        Viewer::Spectator => true,
    };

    let mover = game.current_turn.opp();
    let last_report_for_viewer = match viewer {
        Viewer::Player(v) if v == mover => game.last_bp_calculation_report.clone(),
        _ => None,
    };

    GameStateView {
        id: game.id.clone(),
        white: game.white.as_ref().map(|p| player_view(p, white_hidden)),
        black: game.black.as_ref().map(|p| player_view(p, black_hidden)),
        current_turn: game.current_turn,
        status: game.status,
        move_history: game
            .move_history
            .iter()
            .map(|r| move_record_view(r, viewer, &game.config))
            .collect(),
        pending_duel: game.pending_duel.as_ref().map(|d| duel_view(d, viewer)),
        last_bp_calculation_report: last_report_for_viewer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Input;
    use std::sync::Arc;

    fn joined_game() -> GameState {
        let config = Arc::new(Config::from_toml(include_str!("../../config/standard.toml")).unwrap());
        let mut game = GameState::new("g1".into(), config);
        game.apply(Input::Join { player_id: "white".into() }).unwrap();
        game.apply(Input::Join { player_id: "black".into() }).unwrap();
        game
    }

    #[test]
    fn spectator_never_sees_battle_points() {
        let game = joined_game();
        let view = filter(&game, Viewer::Spectator);
        assert_eq!(view.white.unwrap().battle_points, HIDDEN);
        assert_eq!(view.black.unwrap().battle_points, HIDDEN);
    }

    #[test]
    fn standard_ruleset_hides_opponent_bp_from_a_player() {
        let game = joined_game();
        let view = filter(&game, Viewer::Player(ChessColor::WHITE));
        assert_ne!(view.white.unwrap().battle_points, HIDDEN);
        assert_eq!(view.black.unwrap().battle_points, HIDDEN);
    }

    #[test]
    fn opponent_allocation_hidden_until_duel_resolves() {
        use crate::model::{ChessCommoner, ChessPiece, Square};

        let mut game = joined_game();
        game.apply(Input::Move {
            player_id: "white".into(),
            mv: ChessMove { ech: ChessPiece::PAWN, from: Square::e2, to: Square::e4, special: None, capture: None },
        })
        .unwrap();
        game.apply(Input::Move {
            player_id: "black".into(),
            mv: ChessMove { ech: ChessPiece::PAWN, from: Square::d7, to: Square::d5, special: None, capture: None },
        })
        .unwrap();
        game.apply(Input::Move {
            player_id: "white".into(),
            mv: ChessMove { ech: ChessPiece::PAWN, from: Square::e4, to: Square::d5, special: None, capture: Some(ChessCommoner::PAWN) },
        })
        .unwrap();
        game.apply(Input::Allocate { player_id: "white".into(), amount: 2 }).unwrap();

        let view = filter(&game, Viewer::Player(ChessColor::BLACK));
        let duel = view.pending_duel.unwrap();
        assert_eq!(duel.attacker_allocation, None);
    }
}
