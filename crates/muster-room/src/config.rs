//! Room configuration and the lifecycle state machine.

use std::time::Duration;

use muster_protocol::GameSettings;
use serde::{Deserialize, Serialize};

/// How long a join pauses after the joining player's spawn signal, so
/// client-side spawn handshakes settle before the room moves on.
pub const SPAWN_SETTLE: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for a room instance, fixed at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Server-as-host: the authority itself holds host identity and
    /// never relinquishes it to a client.
    pub saah: bool,

    /// Lobby settings. Opaque to the session authority.
    pub settings: GameSettings,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// NotStarted ──(start)──→ Started ──(end)──→ Ended
///     ↑                                        │
///     └──────────────(host rejoin)─────────────┘
///
/// any state ──(destroy)──→ Destroyed (terminal)
/// ```
///
/// The one backwards edge is `Ended → NotStarted`: when the host
/// reconnects after a finished game, the lobby reopens for the clients
/// held in the waiting room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    NotStarted,
    Started,
    Ended,
    Destroyed,
}

impl GameState {
    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::NotStarted, Self::Started) => true,
            (Self::Started, Self::Ended) => true,
            (Self::Ended, Self::NotStarted) => true,
            (Self::Destroyed, _) => false,
            (_, Self::Destroyed) => true,
            _ => false,
        }
    }

    /// Returns `true` once the room has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::Started => write!(f, "Started"),
            Self::Ended => write!(f, "Ended"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}
