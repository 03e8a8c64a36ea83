//! Wire frame shapes for the bi-directional game channel (§6). Every
//! frame is a tagged `{ type, payload, id?, timestamp, sequence? }`
//! envelope; `type` drives `serde`'s internally-tagged dispatch so the
//! payload shape never needs a second discriminant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transport::wire::{EventWire, GameStateWire, MoveRecordWire};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveInput {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientFrame {
    #[serde(rename = "game:join")]
    Join { game_id: Uuid },
    #[serde(rename = "game:move")]
    Move {
        game_id: Uuid,
        #[serde(rename = "move")]
        mv: MoveInput,
    },
    #[serde(rename = "game:duel_allocation")]
    DuelAllocation { game_id: Uuid, allocation: u32 },
    #[serde(rename = "game:tactical_retreat")]
    TacticalRetreat { game_id: Uuid, retreat_square: String },
    #[serde(rename = "game:get_state")]
    GetState { game_id: Uuid },
    #[serde(rename = "game:resign")]
    Resign { game_id: Uuid },
    #[serde(rename = "game:offer_draw")]
    OfferDraw { game_id: Uuid },
    #[serde(rename = "game:respond_draw")]
    RespondDraw { game_id: Uuid, accept: bool },
    #[serde(rename = "game:chat")]
    Chat { game_id: Uuid, text: String },
    #[serde(rename = "connection:ping")]
    Ping,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub request_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerFrame {
    #[serde(rename = "game:state")]
    State { game_id: Uuid, state: GameStateWire },
    #[serde(rename = "game:state_updated")]
    StateUpdated { game_id: Uuid, state: GameStateWire },
    #[serde(rename = "game:event")]
    Event { game_id: Uuid, seq: u64, event: EventWire },
    #[serde(rename = "game:move")]
    Move { game_id: Uuid, record: MoveRecordWire },
    #[serde(rename = "game:move_invalid")]
    MoveInvalid { game_id: Uuid, code: &'static str },
    #[serde(rename = "game:duel_initiated")]
    DuelInitiated { game_id: Uuid },
    #[serde(rename = "game:duel_allocation_confirmed")]
    DuelAllocationConfirmed { game_id: Uuid, player_id: String },
    #[serde(rename = "game:duel_resolved")]
    DuelResolved { game_id: Uuid, attacker_won: bool },
    #[serde(rename = "game:tactical_retreat")]
    TacticalRetreat { game_id: Uuid, to: String, cost: u32 },
    #[serde(rename = "game:battle_points_updated")]
    BattlePointsUpdated { game_id: Uuid, player_id: String, battle_points: i64 },
    #[serde(rename = "game:player_connected")]
    PlayerConnected { game_id: Uuid, player_id: String },
    #[serde(rename = "game:player_disconnected")]
    PlayerDisconnected { game_id: Uuid, player_id: String },
    #[serde(rename = "game:ended")]
    Ended { game_id: Uuid, reason: &'static str },
    #[serde(rename = "game:chat")]
    Chat { game_id: Uuid, player_id: String, text: String },
    #[serde(rename = "game:error")]
    Error { game_id: Option<Uuid>, error: ErrorPayload },
}

/// The envelope every outbound frame is wrapped in before hitting the
/// wire. `sequence` is only populated for frames sourced from the
/// Event Log, where it is the replay cursor.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub frame: ServerFrame,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub sequence: Option<u64>,
}

impl Envelope {
    pub fn new(frame: ServerFrame) -> Self {
        Self { frame, id: Uuid::new_v4(), timestamp: Utc::now(), sequence: None }
    }

    pub fn with_sequence(frame: ServerFrame, sequence: u64) -> Self {
        Self { frame, id: Uuid::new_v4(), timestamp: Utc::now(), sequence: Some(sequence) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeAuth {
    pub token: Option<String>,
    pub anonymous_session_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_frame_round_trips_through_json() {
        let game_id = Uuid::new_v4();
        let frame = ClientFrame::Join { game_id };
        let json = serde_json::to_string(&frame).unwrap();
        let back: ClientFrame = serde_json::from_str(&json).unwrap();
        match back {
            ClientFrame::Join { game_id: id } => assert_eq!(id, game_id),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn move_frame_tag_matches_the_wire_contract() {
        let frame = ClientFrame::Move {
            game_id: Uuid::new_v4(),
            mv: MoveInput { from: "e2".into(), to: "e4".into(), promotion: None },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "game:move");
        assert_eq!(json["payload"]["move"]["from"], "e2");
    }
}
