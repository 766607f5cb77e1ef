//! Wire protocol payloads and identities for Muster.
//!
//! This crate defines the content of everything a room sends to its
//! clients. Encoding those payloads to bytes is the transport layer's
//! job; here they are plain serde-derived types.
//!
//! # Key types
//!
//! - [`ClientId`] — identity of one connected client
//! - [`HostId`] — who currently holds host authority (tagged union)
//! - [`GameCode`] — room code with its reversible display-string codec
//! - [`RootMessage`] — the catalogue of protocol payloads a room emits
//! - [`Packet`] — the reliable/unreliable envelope around payloads

mod code;
mod error;
mod types;

pub use code::GameCode;
pub use error::CodeError;
pub use types::{
    ClientId, DisconnectReason, GameMap, GameOverReason, GamePayload, GameSettings, HostId, Packet,
    PlayerColor, RootMessage,
};
