//! Single-authority per-game state machine (§4.5). All mutation happens
//! on a cloned draft; the authoritative `GameState` is only overwritten
//! once an input has been fully validated and applied, per §5's
//! copy-on-write contract — a rejected input leaves state untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::engine::errors::GameError;
use crate::gambit::duel::{self, PendingDuel};
use crate::gambit::regen::{self, BpCalculationReport};
use crate::gambit::retreat;
use crate::gambit::tactics;
use crate::model::rules;
use crate::model::{Board, ChessColor, ChessCommoner, ChessMove, ChessPiece, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    WaitingForPlayers,
    InProgress,
    DuelInProgress,
    TacticalRetreatDecision,
    Checkmate,
    Stalemate,
    Draw,
    Abandoned,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Checkmate | Self::Stalemate | Self::Draw | Self::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
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

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub battle_points: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuelResult {
    pub attacker_alloc: u32,
    pub defender_alloc: u32,
    pub attacker_won: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetreatRecord {
    pub to: Square,
    pub cost: u32,
}

#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub mv: ChessMove,
    pub duel_result: Option<DuelResult>,
    pub retreat: Option<RetreatRecord>,
    pub bp_regeneration: Option<BpCalculationReport>,
    pub side_to_move: ChessColor,
}

/// Retreat options awaiting the attacker's choice, plus enough context
/// to finalize whichever square they pick.
#[derive(Debug, Clone)]
pub struct PendingRetreat {
    pub attacker_color: ChessColor,
    pub mv: ChessMove,
    pub piece: ChessPiece,
    pub captured: ChessCommoner,
    pub options: Vec<retreat::RetreatOption>,
}

#[derive(Debug, Clone)]
pub enum Event {
    MoveMade(MoveRecord),
    DuelStarted { attacking_piece: ChessPiece, defending_piece: ChessPiece },
    AllocationSubmitted { player_id: String },
    DuelResolved(DuelResult),
    TacticalRetreatOptions(Vec<retreat::RetreatOption>),
    TacticalRetreatMade(RetreatRecord),
    BpUpdated { player_id: String, battle_points: u32 },
    GameOver { reason: EndReason },
}

#[derive(Debug, Clone)]
pub enum Input {
    Join { player_id: String },
    Move { player_id: String, mv: ChessMove },
    Allocate { player_id: String, amount: u32 },
    Retreat { player_id: String, square: Square },
    Resign { player_id: String },
    OfferDraw { player_id: String },
    RespondDraw { player_id: String, accept: bool },
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub id: String,
    pub board: Board,
    pub config: Arc<Config>,
    pub white: Option<Player>,
    pub black: Option<Player>,
    pub current_turn: ChessColor,
    pub move_history: Vec<MoveRecord>,
    pub pending_duel: Option<PendingDuel>,
    pub pending_retreat: Option<PendingRetreat>,
    pub status: Status,
    pub last_bp_calculation_report: Option<BpCalculationReport>,
    pub draw_offered_by: Option<ChessColor>,
    /// Set when a terminal status was reached for a reason the phase
    /// enum alone can't disambiguate (resignation, time forfeit): the
    /// color that lost. `None` for checkmate/stalemate/draws, where the
    /// board position itself (plus `current_turn`) is authoritative.
    pub decisive_loser: Option<ChessColor>,
    /// Internal invariant violation was detected; no further inputs are
    /// accepted. Logged with full context by the owning actor at the
    /// `error!` level, never surfaced beyond `SERVER_ERROR`.
    pub poisoned: bool,
    /// When this game was created, for the Archive Store's
    /// `createdAt`/abandonment-age bookkeeping.
    pub created_at: DateTime<Utc>,
    /// When the last input was successfully applied, for the Live
    /// Store's abandonment sweep — a long-running but actively-played
    /// game must not be swept just because it's old.
    pub last_activity: DateTime<Utc>,
    /// The reason the game ended, for callers that see a terminal
    /// `GameState` without having witnessed the `GameOver` event itself
    /// (e.g. a retried archive attempt after an earlier one failed).
    pub last_end_reason: Option<EndReason>,
}

impl GameState {
    pub fn new(id: String, config: Arc<Config>) -> Self {
        Self {
            id,
            board: Board::startpos(),
            config,
            white: None,
            black: None,
            current_turn: ChessColor::WHITE,
            move_history: Vec::new(),
            pending_duel: None,
            pending_retreat: None,
            status: Status::WaitingForPlayers,
            last_bp_calculation_report: None,
            draw_offered_by: None,
            decisive_loser: None,
            poisoned: false,
            created_at: Utc::now(),
            last_activity: Utc::now(),
            last_end_reason: None,
        }
    }

    pub fn color_of(&self, player_id: &str) -> Option<ChessColor> {
        if self.white.as_ref().is_some_and(|p| p.id == player_id) {
            Some(ChessColor::WHITE)
        } else if self.black.as_ref().is_some_and(|p| p.id == player_id) {
            Some(ChessColor::BLACK)
        } else {
            None
        }
    }

    fn player_mut(&mut self, color: ChessColor) -> &mut Player {
        match color {
            ChessColor::WHITE => self.white.as_mut().expect("color_of implies seat filled"),
            ChessColor::BLACK => self.black.as_mut().expect("color_of implies seat filled"),
        }
    }

    fn player(&self, color: ChessColor) -> &Player {
        match color {
            ChessColor::WHITE => self.white.as_ref().expect("color_of implies seat filled"),
            ChessColor::BLACK => self.black.as_ref().expect("color_of implies seat filled"),
        }
    }

    /// Apply a single input. On success, `self` becomes the new
    /// authoritative state and the produced events are returned. On
    /// failure, `self` is left exactly as it was.
    pub fn apply(&mut self, input: Input) -> Result<Vec<Event>, GameError> {
        if self.poisoned {
            return Err(GameError::ServerError);
        }

        let mut draft = self.clone();
        let events = draft.apply_mut(input)?;
        draft.last_activity = Utc::now();
        *self = draft;
        Ok(events)
    }

    fn apply_mut(&mut self, input: Input) -> Result<Vec<Event>, GameError> {
        match input {
            Input::Join { player_id } => self.handle_join(player_id),
            Input::Move { player_id, mv } => self.handle_move(player_id, mv),
            Input::Allocate { player_id, amount } => self.handle_allocate(player_id, amount),
            Input::Retreat { player_id, square } => self.handle_retreat(player_id, square),
            Input::Resign { player_id } => self.handle_resign(player_id),
            Input::OfferDraw { player_id } => self.handle_offer_draw(player_id),
            Input::RespondDraw { player_id, accept } => self.handle_respond_draw(player_id, accept),
        }
    }

    fn handle_join(&mut self, player_id: String) -> Result<Vec<Event>, GameError> {
        if self.status != Status::WaitingForPlayers {
            return Err(GameError::InvalidAction);
        }
        let initial_bp = self.config.initial_battle_points;
        let joined_id = player_id.clone();
        if self.white.is_none() {
            self.white = Some(Player { id: player_id, battle_points: initial_bp });
        } else if self.black.is_none() {
            self.black = Some(Player { id: player_id, battle_points: initial_bp });
        } else {
            return Err(GameError::InvalidAction);
        }

        if self.white.is_some() && self.black.is_some() {
            self.status = Status::InProgress;
        }
        Ok(vec![Event::BpUpdated {
            player_id: joined_id,
            battle_points: initial_bp,
        }])
    }

    fn handle_move(&mut self, player_id: String, mv: ChessMove) -> Result<Vec<Event>, GameError> {
        if self.status != Status::InProgress {
            return Err(GameError::InvalidAction);
        }
        let color = self.color_of(&player_id).ok_or(GameError::Unauthorized)?;
        if color != self.current_turn {
            return Err(GameError::WrongTurn);
        }

        let validated = rules::validate_move(&self.board, color, mv).map_err(GameError::from)?;

        if let Some(captured) = validated.capture {
            let attacking_piece = validated.ech;
            self.pending_duel = Some(PendingDuel::new(validated, color, attacking_piece, captured.into()));
            self.status = Status::DuelInProgress;
            return Ok(vec![Event::DuelStarted {
                attacking_piece,
                defending_piece: captured.into(),
            }]);
        }

        self.finish_non_capturing_move(validated)
    }

    /// Run tactics detection against the position before/after a move
    /// and credit the mover's BP regeneration for the turn. Shared by
    /// every code path that finalizes a move onto the board: plain
    /// moves, resolved captures, and both tactical-retreat paths.
    fn award_regeneration(&mut self, prev: &Board, mv: ChessMove, mover: ChessColor) -> BpCalculationReport {
        let tactics = tactics::detect(prev, &self.board, mv, mover);
        let report = regen::regenerate(&self.config, &tactics, self.player(mover).battle_points);
        self.player_mut(mover).battle_points += report.total;
        self.last_bp_calculation_report = Some(report.clone());
        report
    }

    fn finish_non_capturing_move(&mut self, mv: ChessMove) -> Result<Vec<Event>, GameError> {
        let mover = self.board.side_to_move;
        let prev = self.board.clone();
        self.board = rules::apply_move(&self.board, mv);

        let report = self.award_regeneration(&prev, mv, mover);

        self.move_history.push(MoveRecord {
            mv,
            duel_result: None,
            retreat: None,
            bp_regeneration: Some(report.clone()),
            side_to_move: self.board.side_to_move,
        });

        self.current_turn = self.board.side_to_move;

        let mut events = vec![
            Event::MoveMade(self.move_history.last().expect("just pushed").clone()),
            Event::BpUpdated {
                player_id: self.player(mover).id.clone(),
                battle_points: self.player(mover).battle_points,
            },
        ];
        events.extend(self.check_terminal_conditions());
        Ok(events)
    }

    fn handle_allocate(&mut self, player_id: String, amount: u32) -> Result<Vec<Event>, GameError> {
        if self.status != Status::DuelInProgress {
            return Err(GameError::NotInDuel);
        }
        let color = self.color_of(&player_id).ok_or(GameError::Unauthorized)?;
        let duel = self.pending_duel.as_ref().ok_or(GameError::NotInDuel)?;
        if duel.attacker_color != color && duel.defender_color != color {
            return Err(GameError::Unauthorized);
        }
        if duel.has_allocated(color) {
            return Err(GameError::AlreadyAllocated);
        }

        let piece = if color == duel.attacker_color {
            duel.attacking_piece
        } else {
            duel.defending_piece
        };
        let player_bp = self.player(color).battle_points;
        let allocation = duel::allocate(&self.config, piece, amount, player_bp)?;

        self.pending_duel.as_mut().unwrap().allocate(color, allocation.nominal);

        let mut events = vec![Event::AllocationSubmitted { player_id: player_id.clone() }];

        if self.pending_duel.as_ref().unwrap().both_allocated() {
            events.extend(self.resolve_duel()?);
        }

        Ok(events)
    }

    fn resolve_duel(&mut self) -> Result<Vec<Event>, GameError> {
        let duel = self.pending_duel.take().expect("both_allocated implies present");
        let attacker_amount = duel.attacker_allocation.expect("both_allocated");
        let defender_amount = duel.defender_allocation.expect("both_allocated");

        let attacker_alloc = duel::allocate(&self.config, duel.attacking_piece, attacker_amount, u32::MAX)
            .expect("amount already validated at submission time");
        let defender_alloc = duel::allocate(&self.config, duel.defending_piece, defender_amount, u32::MAX)
            .expect("amount already validated at submission time");

        self.player_mut(duel.attacker_color).battle_points -= attacker_amount;
        self.player_mut(duel.defender_color).battle_points -= defender_amount;

        let attacker_won = duel::resolve(&self.config, attacker_alloc, defender_alloc);

        let mut events = vec![
            Event::DuelResolved(DuelResult {
                attacker_alloc: attacker_amount,
                defender_alloc: defender_amount,
                attacker_won,
            }),
            Event::BpUpdated {
                player_id: self.player(duel.attacker_color).id.clone(),
                battle_points: self.player(duel.attacker_color).battle_points,
            },
            Event::BpUpdated {
                player_id: self.player(duel.defender_color).id.clone(),
                battle_points: self.player(duel.defender_color).battle_points,
            },
        ];

        if attacker_won {
            self.status = Status::InProgress;
            let finish_events = self.finish_capturing_move(duel.mv, DuelResult {
                attacker_alloc: attacker_amount,
                defender_alloc: defender_amount,
                attacker_won: true,
            })?;
            events.extend(finish_events);
        } else {
            let options = retreat::retreat_options(&self.board, duel.attacking_piece, duel.mv.from, duel.mv.to, &self.config);
            if options.len() <= 1 {
                self.status = Status::InProgress;
                let cost = options.first().map(|o| o.cost).unwrap_or(0);
                let paid = cost.min(self.player(duel.attacker_color).battle_points);
                let record = RetreatRecord { to: duel.mv.from, cost: paid };
                let prev = self.board.clone();
                self.board.transients.en_passant = None;
                self.board.transients.halfmove_clock += 1;
                self.board.side_to_move = self.board.side_to_move.opp();
                self.board.record_position();

                self.player_mut(duel.attacker_color).battle_points -= paid;
                let defender_gain = retreat::defender_share(&self.config, paid);
                if defender_gain > 0 {
                    self.player_mut(duel.defender_color).battle_points += defender_gain;
                    events.push(Event::BpUpdated {
                        player_id: self.player(duel.defender_color).id.clone(),
                        battle_points: self.player(duel.defender_color).battle_points,
                    });
                }

                let retreat_move = ChessMove { ech: duel.attacking_piece, from: duel.mv.from, to: duel.mv.from, special: None, capture: None };
                let report = self.award_regeneration(&prev, retreat_move, duel.attacker_color);
                events.push(Event::BpUpdated {
                    player_id: self.player(duel.attacker_color).id.clone(),
                    battle_points: self.player(duel.attacker_color).battle_points,
                });

                self.move_history.push(MoveRecord {
                    mv: duel.mv,
                    duel_result: Some(DuelResult {
                        attacker_alloc: attacker_amount,
                        defender_alloc: defender_amount,
                        attacker_won: false,
                    }),
                    retreat: Some(record),
                    bp_regeneration: Some(report),
                    side_to_move: self.board.side_to_move,
                });
                self.current_turn = self.current_turn.opp();
                events.push(Event::TacticalRetreatMade(record));
                events.extend(self.check_terminal_conditions());
            } else {
                self.status = Status::TacticalRetreatDecision;
                events.push(Event::TacticalRetreatOptions(options.clone()));
                self.pending_retreat = Some(PendingRetreat {
                    attacker_color: duel.attacker_color,
                    mv: duel.mv,
                    piece: duel.attacking_piece,
                    captured: ChessCommoner::from_piece(duel.defending_piece)
                        .expect("a defending piece is never a king"),
                    options,
                });
            }
        }

        Ok(events)
    }

    fn finish_capturing_move(&mut self, mv: ChessMove, duel_result: DuelResult) -> Result<Vec<Event>, GameError> {
        let mover = self.board.side_to_move;
        let prev = self.board.clone();
        self.board = rules::apply_move(&self.board, mv);

        let report = self.award_regeneration(&prev, mv, mover);

        self.move_history.push(MoveRecord {
            mv,
            duel_result: Some(duel_result),
            retreat: None,
            bp_regeneration: Some(report.clone()),
            side_to_move: self.board.side_to_move,
        });

        self.current_turn = self.board.side_to_move;

        let mut events = vec![
            Event::MoveMade(self.move_history.last().expect("just pushed").clone()),
            Event::BpUpdated {
                player_id: self.player(mover).id.clone(),
                battle_points: self.player(mover).battle_points,
            },
        ];
        events.extend(self.check_terminal_conditions());
        Ok(events)
    }

    fn handle_retreat(&mut self, player_id: String, square: Square) -> Result<Vec<Event>, GameError> {
        if self.status != Status::TacticalRetreatDecision {
            return Err(GameError::InvalidAction);
        }
        let pending = self.pending_retreat.as_ref().ok_or(GameError::InvalidAction)?;
        let color = self.color_of(&player_id).ok_or(GameError::Unauthorized)?;
        if color != pending.attacker_color {
            return Err(GameError::Unauthorized);
        }

        let option = pending
            .options
            .iter()
            .find(|o| o.square == square)
            .copied()
            .ok_or(GameError::InvalidRetreat)?;

        let pending = self.pending_retreat.take().expect("checked above");
        // Clamp rather than reject: `pieceLossRules.retreatPayment` can
        // put a nonzero cost on every option including the origin
        // square, and an attacker who bid down to 0 BP in the duel still
        // needs a retreat square to land on. Same clamp as the
        // auto-resolved (single-option) retreat path in `resolve_duel`.
        let paid = option.cost.min(self.player(color).battle_points);
        self.player_mut(color).battle_points -= paid;
        let defender_gain = retreat::defender_share(&self.config, paid);
        if defender_gain > 0 {
            self.player_mut(color.opp()).battle_points += defender_gain;
        }

        let retreat_move = ChessMove {
            ech: pending.piece,
            from: pending.mv.from,
            to: option.square,
            special: None,
            capture: None,
        };

        let prev = self.board.clone();
        if option.square != pending.mv.from {
            self.board.squares.set(pending.mv.from, None);
            let man = crate::model::ChessMan::new(color, pending.piece);
            self.board.squares.set(option.square, Some(man));
            self.board.revoke_rights_touching(pending.mv.from);
        }
        self.board.transients.en_passant = None;
        self.board.transients.halfmove_clock += 1;
        self.board.side_to_move = self.board.side_to_move.opp();
        self.board.record_position();

        let report = self.award_regeneration(&prev, retreat_move, color);

        let record = RetreatRecord { to: option.square, cost: paid };
        self.move_history.push(MoveRecord {
            mv: retreat_move,
            duel_result: None,
            retreat: Some(record),
            bp_regeneration: Some(report),
            side_to_move: self.board.side_to_move,
        });

        self.status = Status::InProgress;
        self.current_turn = self.current_turn.opp();

        let mut events = vec![
            Event::TacticalRetreatMade(record),
            Event::BpUpdated {
                player_id: self.player(color).id.clone(),
                battle_points: self.player(color).battle_points,
            },
        ];
        if defender_gain > 0 {
            events.push(Event::BpUpdated {
                player_id: self.player(color.opp()).id.clone(),
                battle_points: self.player(color.opp()).battle_points,
            });
        }
        events.extend(self.check_terminal_conditions());
        Ok(events)
    }

    fn handle_resign(&mut self, player_id: String) -> Result<Vec<Event>, GameError> {
        if self.status.is_terminal() {
            return Err(GameError::InvalidAction);
        }
        let color = self.color_of(&player_id).ok_or(GameError::Unauthorized)?;
        // The phase enum has no dedicated decisive-non-checkmate status;
        // `Checkmate` stands in for "decisive result", the actual cause
        // travels separately in `EndReason` for the archive record.
        self.status = Status::Checkmate;
        self.decisive_loser = Some(color);
        self.last_end_reason = Some(EndReason::Resignation);
        self.pending_duel = None;
        self.pending_retreat = None;
        Ok(vec![Event::GameOver { reason: EndReason::Resignation }])
    }

    fn handle_offer_draw(&mut self, player_id: String) -> Result<Vec<Event>, GameError> {
        let color = self.color_of(&player_id).ok_or(GameError::Unauthorized)?;
        if self.status != Status::InProgress {
            return Err(GameError::InvalidAction);
        }
        self.draw_offered_by = Some(color);
        Ok(vec![])
    }

    fn handle_respond_draw(&mut self, player_id: String, accept: bool) -> Result<Vec<Event>, GameError> {
        let color = self.color_of(&player_id).ok_or(GameError::Unauthorized)?;
        let Some(offerer) = self.draw_offered_by else {
            return Err(GameError::InvalidAction);
        };
        if offerer == color {
            return Err(GameError::InvalidAction);
        }
        self.draw_offered_by = None;
        if accept {
            self.status = Status::Draw;
            self.last_end_reason = Some(EndReason::Agreement);
            Ok(vec![Event::GameOver { reason: EndReason::Agreement }])
        } else {
            Ok(vec![])
        }
    }

    fn check_terminal_conditions(&mut self) -> Vec<Event> {
        if self.status.is_terminal() {
            return vec![];
        }
        let color = self.current_turn;

        let reason = if rules::is_checkmate(&self.board, color) {
            self.status = Status::Checkmate;
            Some(EndReason::Checkmate)
        } else if rules::is_stalemate(&self.board, color) {
            self.status = Status::Stalemate;
            Some(EndReason::Stalemate)
        } else if rules::fifty_move_rule(&self.board) {
            self.status = Status::Draw;
            Some(EndReason::FiftyMove)
        } else if rules::threefold_repetition(&self.board) {
            self.status = Status::Draw;
            Some(EndReason::ThreefoldRepetition)
        } else if rules::material_is_insufficient(&self.board) {
            self.status = Status::Draw;
            Some(EndReason::InsufficientMaterial)
        } else {
            None
        };

        if let Some(reason) = reason {
            self.last_end_reason = Some(reason);
            vec![Event::GameOver { reason }]
        } else {
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChessPiece;

    fn new_game() -> GameState {
        let config = Arc::new(Config::from_toml(include_str!("../../config/standard.toml")).unwrap());
        GameState::new("g1".into(), config)
    }

    fn joined_game() -> GameState {
        let mut game = new_game();
        game.apply(Input::Join { player_id: "white".into() }).unwrap();
        game.apply(Input::Join { player_id: "black".into() }).unwrap();
        game
    }

    #[test]
    fn second_join_starts_the_game() {
        let mut game = new_game();
        assert_eq!(game.status, Status::WaitingForPlayers);
        game.apply(Input::Join { player_id: "white".into() }).unwrap();
        assert_eq!(game.status, Status::WaitingForPlayers);
        game.apply(Input::Join { player_id: "black".into() }).unwrap();
        assert_eq!(game.status, Status::InProgress);
        assert_eq!(game.white.as_ref().unwrap().battle_points, game.config.initial_battle_points);
    }

    #[test]
    fn third_join_is_rejected() {
        let mut game = joined_game();
        assert_eq!(
            game.apply(Input::Join { player_id: "carol".into() }).unwrap_err(),
            GameError::InvalidAction
        );
    }

    #[test]
    fn non_capturing_move_advances_turn_and_awards_base_turn_bp() {
        let mut game = joined_game();
        let before = game.white.as_ref().unwrap().battle_points;
        game.apply(Input::Move {
            player_id: "white".into(),
            mv: ChessMove {
                ech: ChessPiece::PAWN,
                from: Square::e2,
                to: Square::e4,
                special: None,
                capture: None,
            },
        })
        .unwrap();
        assert_eq!(game.current_turn, ChessColor::BLACK);
        assert_eq!(game.move_history.len(), 1);
        assert_eq!(game.white.as_ref().unwrap().battle_points, before + 1);
    }

    #[test]
    fn wrong_turn_move_is_rejected() {
        let mut game = joined_game();
        let result = game.apply(Input::Move {
            player_id: "black".into(),
            mv: ChessMove {
                ech: ChessPiece::PAWN,
                from: Square::e7,
                to: Square::e5,
                special: None,
                capture: None,
            },
        });
        assert_eq!(result.unwrap_err(), GameError::WrongTurn);
        assert_eq!(game.status, Status::InProgress);
    }

    #[test]
    fn capture_enters_duel_and_attacker_win_executes_it() {
        let mut game = joined_game();
        // Open a capturable exchange: 1. e4 d5
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
        assert_eq!(game.status, Status::DuelInProgress);
        assert!(game.pending_duel.is_some());

        game.apply(Input::Allocate { player_id: "white".into(), amount: 3 }).unwrap();
        game.apply(Input::Allocate { player_id: "black".into(), amount: 1 }).unwrap();

        assert_eq!(game.status, Status::InProgress);
        assert_eq!(game.board.at(Square::d5), Some(crate::model::ChessMan::WHITE_PAWN));
        assert_eq!(game.move_history.last().unwrap().duel_result.unwrap().attacker_won, true);
    }

    #[test]
    fn duel_loss_with_no_retreat_leaves_attacker_at_origin() {
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

        game.apply(Input::Allocate { player_id: "white".into(), amount: 0 }).unwrap();
        game.apply(Input::Allocate { player_id: "black".into(), amount: 1 }).unwrap();

        // A pawn has no tactical retreat geometry: it returns to origin.
        assert_eq!(game.status, Status::InProgress);
        assert_eq!(game.board.at(Square::e4), Some(crate::model::ChessMan::WHITE_PAWN));
        assert_eq!(game.board.at(Square::d5), Some(crate::model::ChessMan::BLACK_PAWN));
        assert_eq!(game.current_turn, ChessColor::BLACK);
    }

    #[test]
    fn resignation_ends_the_game() {
        let mut game = joined_game();
        let events = game.apply(Input::Resign { player_id: "white".into() }).unwrap();
        assert!(matches!(events[0], Event::GameOver { reason: EndReason::Resignation }));
        assert_eq!(game.status, Status::Checkmate);
        assert!(game.apply(Input::Resign { player_id: "black".into() }).is_err());
    }

    #[test]
    fn draw_offer_requires_opponent_response() {
        let mut game = joined_game();
        game.apply(Input::OfferDraw { player_id: "white".into() }).unwrap();
        assert_eq!(
            game.apply(Input::RespondDraw { player_id: "white".into(), accept: true }).unwrap_err(),
            GameError::InvalidAction
        );
        game.apply(Input::RespondDraw { player_id: "black".into(), accept: true }).unwrap();
        assert_eq!(game.status, Status::Draw);
    }

    #[test]
    fn rejected_input_leaves_state_untouched() {
        let mut game = joined_game();
        let before = game.clone();
        let _ = game.apply(Input::Move {
            player_id: "black".into(),
            mv: ChessMove { ech: ChessPiece::PAWN, from: Square::e7, to: Square::e5, special: None, capture: None },
        });
        assert_eq!(game.move_history.len(), before.move_history.len());
        assert_eq!(game.current_turn, before.current_turn);
    }
}
