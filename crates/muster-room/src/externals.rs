//! Contracts for the room's external collaborators.
//!
//! The session authority does not simulate players, keep the
//! code → room registry, or persist anything. It drives those
//! concerns through the traits here and observes the player layer
//! through a typed event feed.

use std::future::Future;

use muster_protocol::{ClientId, GameCode, PlayerColor};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Roster — the player/game-object layer
// ---------------------------------------------------------------------------

/// What the room knows about one simulated player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub client: ClientId,
    /// Display name, once the player has set one.
    pub name: Option<String>,
}

/// The externally-owned player roster.
///
/// The room mutates the simulation at exactly two points (join and
/// leave) and otherwise only reads it.
pub trait Roster: Send + Sync + 'static {
    /// Adds the client's player to the simulation. Registering an
    /// already-registered client returns the existing entry.
    fn register_join(&mut self, client: ClientId) -> PlayerInfo;

    /// Removes the client's player from the simulation.
    fn register_leave(&mut self, client: ClientId);

    /// The roster in join order. Host transfer picks the first entry.
    fn players(&self) -> Vec<PlayerInfo>;
}

// ---------------------------------------------------------------------------
// PlayerEvent — the typed observer feed
// ---------------------------------------------------------------------------

/// Events the player layer emits toward the room.
///
/// A fixed, enumerated set with typed payloads; the room never
/// dispatches on event-name strings. Name and color changes are
/// audit-logged only, while the spawn signal gates join completion.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    NameChanged { client: ClientId, name: String },
    ColorChanged { client: ClientId, color: PlayerColor },
    /// The joining client's player object reported itself spawned.
    SpawnComplete { client: ClientId },
}

/// Sender half the factory wires into the player layer; the room actor
/// owns the receiver.
pub type PlayerEventSender = mpsc::UnboundedSender<PlayerEvent>;

// ---------------------------------------------------------------------------
// Directory — registry and durable storage
// ---------------------------------------------------------------------------

/// The code registry and durable store the room releases on destroy.
pub trait Directory: Send + Sync + 'static {
    /// The error type for durable-store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Drops the room's entry from the code registry.
    fn unregister(&self, code: GameCode);

    /// Removes the room's durable record (keyed `room.<display-code>`).
    /// Best effort: the room finishes tearing down even if this fails.
    fn remove_record(&self, key: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
