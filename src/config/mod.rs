//! Ruleset configuration: the BP economy parameters, regeneration
//! formulas, and named profiles (`standard`, `beginner`, `advanced`,
//! `risky`, `attacker_ties`).
//!
//! Profiles are shipped as `config/<name>.toml`, loaded once at startup
//! into a [`RulesetRegistry`]. Regeneration formulas are TOML strings;
//! they are parsed exactly once here, into a [`crate::formula::Formula`]
//! AST, never re-parsed per move.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::formula::{Formula, FormulaParseError};

#[derive(Debug, Clone, Deserialize)]
pub struct PieceValues {
    pub pawn: u32,
    pub knight: u32,
    pub bishop: u32,
    pub rook: u32,
    pub queen: u32,
    pub king: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerTacticRaw {
    pub enabled: bool,
    pub formula: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct PerTactic {
    pub enabled: bool,
    pub formula: Formula,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegenerationRaw {
    pub base_turn: f64,
    pub per_tactic: HashMap<String, PerTacticRaw>,
}

#[derive(Debug, Clone)]
pub struct Regeneration {
    pub base_turn: f64,
    pub per_tactic: HashMap<String, PerTactic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetreatCost {
    pub base_return: f64,
    pub distance_multiplier: f64,
    pub knight_custom_enabled: bool,
    pub use_knight_lookup: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TacticalRetreat {
    pub enabled: bool,
    pub long_range_enabled: bool,
    pub knights_enabled: bool,
    pub cost: RetreatCost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuelResolution {
    pub defender_wins_ties: bool,
    pub ruleset_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetreatPayment {
    pub enabled: bool,
    pub original_square_cost: u32,
    pub cost_to_defender_enabled: bool,
    pub cost_to_defender_percentage: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PieceLossRules {
    pub attacker_can_lose_piece: bool,
    pub retreat_payment: RetreatPayment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InformationHiding {
    pub hide_battle_points: bool,
    pub hide_allocation_history: bool,
}

/// TOML-shaped config, before formulas are parsed.
#[derive(Debug, Clone, Deserialize)]
struct ConfigRaw {
    initial_battle_points: u32,
    max_piece_battle_points: u32,
    piece_values: PieceValues,
    piece_bp_capacities: PieceValues,
    regeneration: RegenerationRaw,
    tactical_retreat: TacticalRetreat,
    duel_resolution: DuelResolution,
    piece_loss_rules: PieceLossRules,
    information_hiding: InformationHiding,
    /// D-2: optional cap on player BP. `None` means unbounded, matching
    /// the source project's apparent behavior.
    #[serde(default)]
    bp_ceiling: Option<u32>,
}

/// Fully resolved ruleset configuration for a single game.
#[derive(Debug, Clone)]
pub struct Config {
    pub initial_battle_points: u32,
    pub max_piece_battle_points: u32,
    pub piece_values: PieceValues,
    pub piece_bp_capacities: PieceValues,
    pub regeneration: Regeneration,
    pub tactical_retreat: TacticalRetreat,
    pub duel_resolution: DuelResolution,
    pub piece_loss_rules: PieceLossRules,
    pub information_hiding: InformationHiding,
    pub bp_ceiling: Option<u32>,
}

#[derive(Debug)]
pub enum ConfigError {
    Toml(toml::de::Error),
    Formula(FormulaParseError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Toml(e) => write!(f, "malformed ruleset toml: {e}"),
            Self::Formula(e) => write!(f, "malformed ruleset toml: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Toml(value)
    }
}

impl From<FormulaParseError> for ConfigError {
    fn from(value: FormulaParseError) -> Self {
        Self::Formula(value)
    }
}

impl Config {
    pub fn from_toml(src: &str) -> Result<Self, ConfigError> {
        let raw: ConfigRaw = toml::from_str(src)?;

        let mut per_tactic = HashMap::with_capacity(raw.regeneration.per_tactic.len());
        for (name, tactic) in raw.regeneration.per_tactic {
            per_tactic.insert(
                name,
                PerTactic {
                    enabled: tactic.enabled,
                    formula: Formula::parse(&tactic.formula)?,
                    description: tactic.description,
                },
            );
        }

        Ok(Self {
            initial_battle_points: raw.initial_battle_points,
            max_piece_battle_points: raw.max_piece_battle_points,
            piece_values: raw.piece_values,
            piece_bp_capacities: raw.piece_bp_capacities,
            regeneration: Regeneration {
                base_turn: raw.regeneration.base_turn,
                per_tactic,
            },
            tactical_retreat: raw.tactical_retreat,
            duel_resolution: raw.duel_resolution,
            piece_loss_rules: raw.piece_loss_rules,
            information_hiding: raw.information_hiding,
            bp_ceiling: raw.bp_ceiling,
        })
    }
}

/// Named ruleset profiles, loaded once at startup, order-preserving so
/// an admin listing reflects declaration order.
#[derive(Debug, Clone, Default)]
pub struct RulesetRegistry(IndexMap<String, Config>);

impl RulesetRegistry {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, config: Config) {
        self.0.insert(name.into(), config);
    }

    pub fn get(&self, name: &str) -> Option<&Config> {
        self.0.get(name)
    }

    /// Read-only view for the admin ruleset-listing accessor.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn load_standard_set(dir: &std::path::Path) -> std::io::Result<Self> {
        let mut registry = Self::new();
        for name in ["standard", "beginner", "advanced", "risky", "attacker_ties"] {
            let path = dir.join(format!("{name}.toml"));
            let src = std::fs::read_to_string(&path)?;
            let config = Config::from_toml(&src)
                .unwrap_or_else(|e| panic!("invalid ruleset {}: {e}", path.display()));
            registry.insert(name, config);
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD_TOML: &str = include_str!("../../config/standard.toml");

    #[test]
    fn standard_profile_parses() {
        let config = Config::from_toml(STANDARD_TOML).expect("standard.toml parses");
        assert_eq!(config.duel_resolution.ruleset_type, "standard");
        assert!(config.duel_resolution.defender_wins_ties);
        assert!(config.regeneration.per_tactic.contains_key("pin"));
    }
}
