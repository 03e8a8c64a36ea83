//! The sealed-bid duel sub-machine: pending-duel lifecycle and the
//! effective-allocation formula (§4.2).

use crate::config::Config;
use crate::model::{ChessColor, ChessMove, ChessPiece};

/// A capture attempt awaiting resolution. Present only while the game's
/// status is `DUEL_IN_PROGRESS`. Allocations are set-once: once an
/// `Some`, a side's field may not be overwritten.
#[derive(Debug, Clone)]
pub struct PendingDuel {
    pub mv: ChessMove,
    pub attacker_color: ChessColor,
    pub defender_color: ChessColor,
    pub attacking_piece: ChessPiece,
    pub defending_piece: ChessPiece,
    pub attacker_allocation: Option<u32>,
    pub defender_allocation: Option<u32>,
}

impl PendingDuel {
    pub fn new(mv: ChessMove, attacker_color: ChessColor, attacking_piece: ChessPiece, defending_piece: ChessPiece) -> Self {
        Self {
            mv,
            attacker_color,
            defender_color: attacker_color.opp(),
            attacking_piece,
            defending_piece,
            attacker_allocation: None,
            defender_allocation: None,
        }
    }

    pub fn both_allocated(&self) -> bool {
        self.attacker_allocation.is_some() && self.defender_allocation.is_some()
    }

    pub fn has_allocated(&self, color: ChessColor) -> bool {
        if color == self.attacker_color {
            self.attacker_allocation.is_some()
        } else {
            self.defender_allocation.is_some()
        }
    }

    /// Record `color`'s allocation. Panics if already set — callers must
    /// check [`Self::has_allocated`] first (the state machine rejects a
    /// duplicate allocation as `ALREADY_ALLOCATED` before reaching here).
    pub fn allocate(&mut self, color: ChessColor, amount: u32) {
        if color == self.attacker_color {
            assert!(self.attacker_allocation.is_none(), "attacker already allocated");
            self.attacker_allocation = Some(amount);
        } else {
            assert!(self.defender_allocation.is_none(), "defender already allocated");
            self.defender_allocation = Some(amount);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelError {
    AllocationExceedsBp,
}

fn capacity_for(config: &Config, piece: ChessPiece) -> u32 {
    match piece {
        ChessPiece::PAWN => config.piece_bp_capacities.pawn,
        ChessPiece::KNIGHT => config.piece_bp_capacities.knight,
        ChessPiece::BISHOP => config.piece_bp_capacities.bishop,
        ChessPiece::ROOK => config.piece_bp_capacities.rook,
        ChessPiece::QUEEN => config.piece_bp_capacities.queen,
        ChessPiece::KING => config.piece_bp_capacities.king,
    }
}

/// D-1: the spend vs. effectiveness question. Both interpretations are
/// exposed; `debit_amount` always returns the nominal amount (matching
/// the source project's `calculateEffectiveAllocation`, which scales
/// *effectiveness* above capacity while debiting the nominal spend).
/// Effective bid and nominal spend coincide at or below capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// What the player actually spends from their BP pool.
    pub nominal: u32,
    /// What is compared between attacker and defender.
    pub effective: u32,
}

/// Validate `amount` against `player_bp` and compute its effective bid
/// per the "double cost above capacity" rule, clamped at
/// `maxPieceBattlePoints`.
pub fn allocate(config: &Config, piece: ChessPiece, amount: u32, player_bp: u32) -> Result<Allocation, DuelError> {
    if amount > player_bp {
        return Err(DuelError::AllocationExceedsBp);
    }

    let capacity = capacity_for(config, piece);
    let clamped = amount.min(config.max_piece_battle_points);

    let effective = if clamped <= capacity {
        clamped
    } else {
        capacity + 2 * (clamped - capacity)
    };

    Ok(Allocation {
        nominal: amount,
        effective,
    })
}

/// Resolve a completed duel: `true` means the attacker wins (capture
/// executes).
pub fn resolve(config: &Config, attacker: Allocation, defender: Allocation) -> bool {
    use std::cmp::Ordering::*;
    match attacker.effective.cmp(&defender.effective) {
        Greater => true,
        Less => false,
        Equal => !config.duel_resolution.defender_wins_ties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::from_toml(include_str!("../../config/standard.toml")).unwrap()
    }

    #[test]
    fn allocation_at_capacity_is_unscaled() {
        let config = test_config();
        let alloc = allocate(&config, ChessPiece::KNIGHT, 3, 10).unwrap();
        assert_eq!(alloc.effective, 3);
        assert_eq!(alloc.nominal, 3);
    }

    #[test]
    fn allocation_above_capacity_doubles_effective_cost() {
        let config = test_config();
        // knight capacity = 3; amount = capacity + 1 = 4
        let alloc = allocate(&config, ChessPiece::KNIGHT, 4, 10).unwrap();
        assert_eq!(alloc.effective, 3 + 2 * 1);
        assert_eq!(alloc.nominal, 4);
    }

    #[test]
    fn allocation_above_player_bp_is_rejected() {
        let config = test_config();
        assert_eq!(
            allocate(&config, ChessPiece::KNIGHT, 10, 5),
            Err(DuelError::AllocationExceedsBp)
        );
    }

    #[test]
    fn simple_capture_wins_worked_example() {
        let config = test_config();
        let attacker = allocate(&config, ChessPiece::KNIGHT, 3, 39).unwrap();
        let defender = allocate(&config, ChessPiece::PAWN, 2, 39).unwrap();
        assert!(resolve(&config, attacker, defender));
    }

    #[test]
    fn tie_goes_to_defender_by_default() {
        let config = test_config();
        let attacker = allocate(&config, ChessPiece::KNIGHT, 3, 39).unwrap();
        let defender = allocate(&config, ChessPiece::PAWN, 3, 39).unwrap();
        assert!(!resolve(&config, attacker, defender));
    }
}
