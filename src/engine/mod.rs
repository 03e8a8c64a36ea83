//! Per-game state machine: the single authority that serializes all
//! mutation of one game (§4.5).

pub mod errors;
pub mod state_machine;
pub mod view_filter;

pub use errors::GameError;
pub use state_machine::{Event, GameState, Input, Status};
pub use view_filter::{GameStateView, Viewer};
