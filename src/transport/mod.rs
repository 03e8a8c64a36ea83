//! WebSocket transport: frame shapes (§6), the View Filter dispatcher,
//! and per-game room fan-out.

pub mod messages;
pub mod rooms;
pub mod wire;
pub mod ws;

pub use messages::{ClientFrame, Envelope, ServerFrame};
pub use rooms::Rooms;
