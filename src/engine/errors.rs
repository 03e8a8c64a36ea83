//! Stable, user-facing error codes (§6/§7). Never panics; always
//! returned by value.

use std::fmt;

/// Stable identifiers returned to the client, not human-readable
/// messages — the message text lives client-side, keyed by code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    InvalidAction,
    GameNotFound,
    Unauthorized,
    WrongTurn,
    IllegalMove,
    NotInDuel,
    AlreadyAllocated,
    InsufficientBp,
    InvalidRetreat,
    ServerError,
}

impl GameError {
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidAction => "INVALID_ACTION",
            Self::GameNotFound => "GAME_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::WrongTurn => "WRONG_TURN",
            Self::IllegalMove => "ILLEGAL_MOVE",
            Self::NotInDuel => "NOT_IN_DUEL",
            Self::AlreadyAllocated => "ALREADY_ALLOCATED",
            Self::InsufficientBp => "INSUFFICIENT_BP",
            Self::InvalidRetreat => "INVALID_RETREAT",
            Self::ServerError => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::error::Error for GameError {}

impl From<crate::model::rules::RuleError> for GameError {
    fn from(value: crate::model::rules::RuleError) -> Self {
        use crate::model::rules::RuleError::*;
        match value {
            IllegalMove | NoPieceOnOrigin => Self::IllegalMove,
            WrongTurn => Self::WrongTurn,
            OwnKingInCheck => Self::IllegalMove,
            MalformedPromotion => Self::InvalidAction,
            CastleThroughAttack => Self::IllegalMove,
        }
    }
}

impl From<crate::gambit::duel::DuelError> for GameError {
    fn from(_: crate::gambit::duel::DuelError) -> Self {
        Self::InsufficientBp
    }
}
