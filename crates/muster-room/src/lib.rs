//! Room session authority for Muster.
//!
//! Each room runs as an isolated tokio task (actor model) owning the
//! connected-client set, host authority, and the lobby → started →
//! ended → destroyed lifecycle. The outside world talks to it through
//! a [`RoomHandle`], and the room talks back through each client's
//! [`Link`].
//!
//! # Key types
//!
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`spawn_room`] — the factory entry point, called once a code is
//!   reserved
//! - [`Link`] — the per-connection handle contract (owned by the
//!   transport layer)
//! - [`Roster`] / [`Directory`] — the player-simulation and
//!   registry/storage collaborators
//! - [`GameState`] — lifecycle state machine
//! - [`RoomConfig`] — room settings (server-as-host flag, lobby
//!   settings)

mod config;
mod error;
mod externals;
mod link;
mod room;

pub use config::{GameState, RoomConfig, SPAWN_SETTLE};
pub use error::RoomError;
pub use externals::{Directory, PlayerEvent, PlayerEventSender, PlayerInfo, Roster};
pub use link::{Link, Members};
pub use room::{spawn_room, GameDataBatch, RoomHandle, RoomInfo};
