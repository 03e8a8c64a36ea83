//! Serializable projections of engine types. The engine itself stays
//! free of `serde` coupling (mirroring how the Archive Store only
//! persists a flattened [`ArchivedGame`](crate::store::ArchivedGame));
//! everything that crosses the wire goes through a `*Wire` type built
//! here instead of deriving `Serialize` on the core model.

use serde::Serialize;

use crate::engine::state_machine::{DuelResult, EndReason, GameState, MoveRecord, RetreatRecord};
use crate::engine::view_filter::{GameStateView, PendingDuelView, PlayerView, Viewer, HIDDEN};
use crate::engine::Event;
use crate::gambit::regen::{BpCalculationReport, TacticContribution};
use crate::gambit::retreat::RetreatOption;
use crate::model::notation::Parsable;
use crate::model::ChessMove;
use crate::model::ChessPiece;
use crate::model::{PawnPromotion, Square, SpecialMove};

/// Parse the wire `{ from, to, promotion? }` shape into a [`ChessMove`].
/// The resulting `ech` is a placeholder (rule validation matches legal
/// moves on `from`/`to`/promotion only and returns the canonical move
/// carrying the right piece kind).
pub fn move_from_wire(from: &str, to: &str, promotion: Option<&str>) -> Option<ChessMove> {
    let from = Square::parse_exact(from)?;
    let to = Square::parse_exact(to)?;
    let special = match promotion {
        Some(p) => Some(SpecialMove::from(PawnPromotion::parse_exact(p)?)),
        None => None,
    };
    Some(ChessMove { ech: ChessPiece::PAWN, from, to, special, capture: None })
}

pub fn square_from_wire(s: &str) -> Option<Square> {
    Square::parse_exact(s)
}

fn piece_code(piece: ChessPiece) -> &'static str {
    match piece {
        ChessPiece::PAWN => "P",
        ChessPiece::KNIGHT => "N",
        ChessPiece::BISHOP => "B",
        ChessPiece::ROOK => "R",
        ChessPiece::QUEEN => "Q",
        ChessPiece::KING => "K",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveWire {
    pub piece: &'static str,
    pub from: String,
    pub to: String,
    pub promotion: Option<&'static str>,
    pub capture: Option<&'static str>,
}

impl From<&ChessMove> for MoveWire {
    fn from(mv: &ChessMove) -> Self {
        Self {
            piece: piece_code(mv.ech),
            from: mv.from.to_string(),
            to: mv.to.to_string(),
            promotion: mv.promotion().map(|p| piece_code(p.into())),
            capture: mv.capture.map(|c| piece_code(c.into())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DuelResultWire {
    pub attacker_alloc: u32,
    pub defender_alloc: u32,
    pub attacker_won: bool,
}

impl From<DuelResult> for DuelResultWire {
    fn from(r: DuelResult) -> Self {
        Self { attacker_alloc: r.attacker_alloc, defender_alloc: r.defender_alloc, attacker_won: r.attacker_won }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetreatRecordWire {
    pub to: String,
    pub cost: u32,
}

impl From<RetreatRecord> for RetreatRecordWire {
    fn from(r: RetreatRecord) -> Self {
        Self { to: r.to.to_string(), cost: r.cost }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetreatOptionWire {
    pub square: String,
    pub cost: u32,
}

impl From<&RetreatOption> for RetreatOptionWire {
    fn from(o: &RetreatOption) -> Self {
        Self { square: o.square.to_string(), cost: o.cost }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TacticContributionWire {
    pub pattern: &'static str,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BpCalculationReportWire {
    pub base_turn: f64,
    pub contributions: Vec<TacticContributionWire>,
    pub total: u32,
}

impl From<&BpCalculationReport> for BpCalculationReportWire {
    fn from(r: &BpCalculationReport) -> Self {
        Self {
            base_turn: r.base_turn,
            contributions: r
                .contributions
                .iter()
                .map(|c: &TacticContribution| TacticContributionWire { pattern: c.pattern, amount: c.amount })
                .collect(),
            total: r.total,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveRecordWire {
    #[serde(rename = "move")]
    pub mv: MoveWire,
    pub duel_result: Option<DuelResultWire>,
    pub retreat: Option<RetreatRecordWire>,
    pub bp_regeneration: Option<BpCalculationReportWire>,
    pub side_to_move: &'static str,
}

impl From<&MoveRecord> for MoveRecordWire {
    fn from(r: &MoveRecord) -> Self {
        Self {
            mv: MoveWire::from(&r.mv),
            duel_result: r.duel_result.map(DuelResultWire::from),
            retreat: r.retreat.map(RetreatRecordWire::from),
            bp_regeneration: r.bp_regeneration.as_ref().map(BpCalculationReportWire::from),
            side_to_move: color_code(r.side_to_move),
        }
    }
}

fn color_code(color: crate::model::ChessColor) -> &'static str {
    match color {
        crate::model::ChessColor::WHITE => "white",
        crate::model::ChessColor::BLACK => "black",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerWire {
    pub id: String,
    pub battle_points: i64,
}

impl From<&PlayerView> for PlayerWire {
    fn from(p: &PlayerView) -> Self {
        Self { id: p.id.clone(), battle_points: p.battle_points }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingDuelWire {
    pub attacker_color: &'static str,
    pub defender_color: &'static str,
    pub attacking_piece: &'static str,
    pub defending_piece: &'static str,
    pub attacker_allocation: Option<i64>,
    pub defender_allocation: Option<i64>,
}

impl From<&PendingDuelView> for PendingDuelWire {
    fn from(d: &PendingDuelView) -> Self {
        Self {
            attacker_color: color_code(d.attacker_color),
            defender_color: color_code(d.defender_color),
            attacking_piece: piece_code(d.attacking_piece),
            defending_piece: piece_code(d.defending_piece),
            attacker_allocation: d.attacker_allocation,
            defender_allocation: d.defender_allocation,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GameStateWire {
    pub id: String,
    pub white: Option<PlayerWire>,
    pub black: Option<PlayerWire>,
    pub current_turn: &'static str,
    pub status: &'static str,
    pub move_history: Vec<MoveRecordWire>,
    pub pending_duel: Option<PendingDuelWire>,
    pub bp_calculation_report: Option<BpCalculationReportWire>,
}

fn status_code(status: crate::engine::Status) -> &'static str {
    use crate::engine::Status::*;
    match status {
        WaitingForPlayers => "WAITING_FOR_PLAYERS",
        InProgress => "IN_PROGRESS",
        DuelInProgress => "DUEL_IN_PROGRESS",
        TacticalRetreatDecision => "TACTICAL_RETREAT_DECISION",
        Checkmate => "CHECKMATE",
        Stalemate => "STALEMATE",
        Draw => "DRAW",
        Abandoned => "ABANDONED",
    }
}

impl From<&GameStateView> for GameStateWire {
    fn from(v: &GameStateView) -> Self {
        Self {
            id: v.id.clone(),
            white: v.white.as_ref().map(PlayerWire::from),
            black: v.black.as_ref().map(PlayerWire::from),
            current_turn: color_code(v.current_turn),
            status: status_code(v.status),
            move_history: v.move_history.iter().map(|r| MoveRecordWire {
                mv: MoveWire::from(&r.mv),
                duel_result: r.duel_result.map(DuelResultWire::from),
                retreat: r.retreat.map(RetreatRecordWire::from),
                bp_regeneration: r.bp_regeneration.as_ref().map(BpCalculationReportWire::from),
                side_to_move: color_code(r.side_to_move),
            }).collect(),
            pending_duel: v.pending_duel.as_ref().map(PendingDuelWire::from),
            bp_calculation_report: v.last_bp_calculation_report.as_ref().map(BpCalculationReportWire::from),
        }
    }
}

pub fn end_reason_code(reason: EndReason) -> &'static str {
    crate::store::archive::ArchivedReason::from(reason).code()
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum EventWire {
    MoveMade { record: MoveRecordWire },
    DuelStarted { attacking_piece: &'static str, defending_piece: &'static str },
    AllocationSubmitted { player_id: String },
    DuelResolved { result: DuelResultWire },
    TacticalRetreatOptions { options: Vec<RetreatOptionWire> },
    TacticalRetreatMade { retreat: RetreatRecordWire },
    BpUpdated { player_id: String, battle_points: i64 },
    GameOver { reason: &'static str },
}

fn hide_bp_for(game: &GameState, player_id: &str, viewer: Viewer) -> bool {
    match game.color_of(player_id) {
        Some(color) => match viewer {
            Viewer::Player(v) if v == color => false,
            Viewer::Player(_) => game.config.information_hiding.hide_battle_points,
            Viewer::Spectator => true,
        },
        None => true,
    }
}

/// Project an engine [`Event`] into the wire shape `viewer` is entitled
/// to see, or `None` when the event is directed at someone else
/// entirely. Mirrors the Event Log's per-recipient delivery rules:
/// `ALLOCATION_SUBMITTED` reaches the submitter only,
/// `TACTICAL_RETREAT_OPTIONS` the attacker only, and both `MOVE_MADE`'s
/// `bpCalculationReport` and `BP_UPDATED`'s totals are redacted the same
/// way the full-state View Filter would redact them.
pub fn event_wire_for_viewer(event: &Event, game: &GameState, viewer: Viewer) -> Option<EventWire> {
    match event {
        Event::MoveMade(record) => {
            let mover = record.side_to_move.opp();
            let strip = game.config.information_hiding.hide_allocation_history
                || !matches!(viewer, Viewer::Player(v) if v == mover);
            let mut wire = MoveRecordWire::from(record);
            if strip {
                wire.bp_regeneration = None;
            }
            Some(EventWire::MoveMade { record: wire })
        }
        Event::AllocationSubmitted { player_id } => {
            let submitter = game.color_of(player_id)?;
            matches!(viewer, Viewer::Player(v) if v == submitter)
                .then(|| EventWire::AllocationSubmitted { player_id: player_id.clone() })
        }
        Event::TacticalRetreatOptions(options) => {
            let attacker = game.pending_retreat.as_ref()?.attacker_color;
            matches!(viewer, Viewer::Player(v) if v == attacker).then(|| EventWire::TacticalRetreatOptions {
                options: options.iter().map(RetreatOptionWire::from).collect(),
            })
        }
        Event::BpUpdated { player_id, battle_points } => {
            let battle_points = if hide_bp_for(game, player_id, viewer) { HIDDEN } else { *battle_points as i64 };
            Some(EventWire::BpUpdated { player_id: player_id.clone(), battle_points })
        }
        other => Some(EventWire::from(other)),
    }
}

impl From<&Event> for EventWire {
    fn from(event: &Event) -> Self {
        match event {
            Event::MoveMade(record) => Self::MoveMade { record: record.into() },
            Event::DuelStarted { attacking_piece, defending_piece } => Self::DuelStarted {
                attacking_piece: piece_code(*attacking_piece),
                defending_piece: piece_code(*defending_piece),
            },
            Event::AllocationSubmitted { player_id } => Self::AllocationSubmitted { player_id: player_id.clone() },
            Event::DuelResolved(result) => Self::DuelResolved { result: (*result).into() },
            Event::TacticalRetreatOptions(options) => {
                Self::TacticalRetreatOptions { options: options.iter().map(RetreatOptionWire::from).collect() }
            }
            Event::TacticalRetreatMade(retreat) => Self::TacticalRetreatMade { retreat: (*retreat).into() },
            Event::BpUpdated { player_id, battle_points } => {
                Self::BpUpdated { player_id: player_id.clone(), battle_points: *battle_points as i64 }
            }
            Event::GameOver { reason } => Self::GameOver { reason: end_reason_code(*reason) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Square;

    #[test]
    fn move_wire_renders_coordinates_and_piece_code() {
        let mv = ChessMove { ech: ChessPiece::PAWN, from: Square::e2, to: Square::e4, special: None, capture: None };
        let wire = MoveWire::from(&mv);
        assert_eq!(wire.from, "e2");
        assert_eq!(wire.to, "e4");
        assert_eq!(wire.piece, "P");
    }
}
