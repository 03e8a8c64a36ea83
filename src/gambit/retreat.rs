//! Tactical retreat generation: enumerates, for a failed attacker, the
//! set of `(square, bpCost)` options.

use crate::config::Config;
use crate::gambit::oracle;
use crate::model::{Board, ChessPiece, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetreatOption {
    pub square: Square,
    pub cost: u32,
}

/// Round `baseReturn + distanceMultiplier * distance` half-up to an
/// integer BP cost, per D-4.
fn round_cost(base_return: f64, distance_multiplier: f64, distance: u8) -> u32 {
    let raw = base_return + distance_multiplier * distance as f64;
    raw.floor() as u32 + if raw.fract() >= 0.5 { 1 } else { 0 }
}

/// Sliding-piece (bishop/rook/queen) retreat squares: collinear with the
/// origin-to-attack-target vector, extending from the attack-target back
/// through the origin and on to the first blocking piece exclusive, on
/// an otherwise-empty board (the attacker itself has already left
/// `origin` conceptually — the board passed in is the pre-duel position,
/// where `origin` is still occupied by the attacker).
pub fn sliding_retreat_options(board: &Board, origin: Square, attack_target: Square, config: &Config) -> Vec<RetreatOption> {
    let cost = &config.tactical_retreat.cost;
    // Direction from origin towards the attack-target (the path the
    // piece already slid along), and its reverse (the far side of
    // origin).
    let toward = (
        (attack_target.file() as i8 - origin.file() as i8).signum(),
        (attack_target.rank() as i8 - origin.rank() as i8).signum(),
    );
    let away = (-toward.0, -toward.1);

    let mut options = vec![RetreatOption {
        square: origin,
        cost: 0,
    }];

    let push = |sq: Square, options: &mut Vec<RetreatOption>| {
        let distance = origin.chebyshev(sq);
        options.push(RetreatOption {
            square: sq,
            cost: round_cost(cost.base_return, cost.distance_multiplier, distance),
        });
    };

    // Between origin and the attack-target, exclusive of both endpoints
    // already covered (origin at cost 0, attack-target never a retreat).
    let mut sq = origin;
    while let Some(next) = sq.offset(toward.0, toward.1) {
        if next == attack_target {
            break;
        }
        push(next, &mut options);
        sq = next;
    }

    // Beyond origin, opposite side from the attack-target, up to the
    // first blocking piece exclusive.
    let mut sq = origin;
    loop {
        let Some(next) = sq.offset(away.0, away.1) else { break };
        if board.at(next).is_some() {
            break;
        }
        push(next, &mut options);
        sq = next;
    }

    options
}

/// Knight retreat options, BP-costed from the oracle's move-count.
pub fn knight_retreat_options(origin: Square, attack_target: Square) -> Vec<RetreatOption> {
    oracle::lookup(origin, attack_target)
        .into_iter()
        .map(|o| RetreatOption {
            square: o.square,
            cost: o.cost as u32,
        })
        .collect()
}

/// Full retreat option set for a failed attacker, dispatching on piece
/// kind and the ruleset's enable flags. The origin-square option's cost
/// is 0 unless `pieceLossRules.retreatPayment` is enabled, in which case
/// it's `originalSquareCost` — some rule profiles (e.g. `risky`) charge
/// even for retreating to the square the piece started from.
pub fn retreat_options(board: &Board, piece: ChessPiece, origin: Square, attack_target: Square, config: &Config) -> Vec<RetreatOption> {
    let mut options = if !config.tactical_retreat.enabled {
        vec![RetreatOption { square: origin, cost: 0 }]
    } else {
        match piece {
            ChessPiece::KNIGHT if config.tactical_retreat.knights_enabled => knight_retreat_options(origin, attack_target),
            ChessPiece::BISHOP | ChessPiece::ROOK | ChessPiece::QUEEN if config.tactical_retreat.long_range_enabled => {
                sliding_retreat_options(board, origin, attack_target, config)
            }
            _ => vec![RetreatOption { square: origin, cost: 0 }],
        }
    };

    let payment = &config.piece_loss_rules.retreat_payment;
    if payment.enabled {
        if let Some(origin_option) = options.iter_mut().find(|o| o.square == origin) {
            origin_option.cost = payment.original_square_cost;
        }
    }

    options
}

/// The defender's share of a paid retreat cost, per
/// `pieceLossRules.retreatPayment.costToDefenderEnabled`. Rounds the
/// same half-up way as [`round_cost`].
pub fn defender_share(config: &Config, cost: u32) -> u32 {
    let payment = &config.piece_loss_rules.retreat_payment;
    if !payment.enabled || !payment.cost_to_defender_enabled {
        return 0;
    }
    let raw = cost as f64 * payment.cost_to_defender_percentage;
    raw.floor() as u32 + if raw.fract() >= 0.5 { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::from_toml(include_str!("../../config/standard.toml")).unwrap()
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_cost(0.0, 1.5, 2), 3);
        assert_eq!(round_cost(0.0, 0.5, 1), 1);
        assert_eq!(round_cost(0.0, 1.0, 2), 2);
    }

    #[test]
    fn bishop_retreat_includes_origin_at_zero() {
        let mut board = Board::empty();
        board.squares.set(Square::c1, Some(crate::model::ChessMan::WHITE_BISHOP));
        let config = test_config();
        let options = sliding_retreat_options(&board, Square::c1, Square::h6, &config);
        assert!(options.iter().any(|o| o.square == Square::c1 && o.cost == 0));
    }
}
