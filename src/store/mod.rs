//! Live (in-memory + TTL) and Archive (durable) game storage (§4.6).

pub mod archive;
pub mod events;
pub mod live;

pub use archive::{ArchivedGame, ArchiveStore};
pub use events::EventLog;
pub use live::LiveStore;
