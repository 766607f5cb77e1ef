//! Error types for the room layer.

/// Errors that can occur during room operations.
///
/// Not-found conditions (removing an absent member, targeting an
/// absent recipient) are deliberately *not* here: they are silent
/// no-ops. These variants mark caller bugs or surfaced collaborator
/// failures.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room was already destroyed; no further operations are valid.
    #[error("room is destroyed")]
    Destroyed,

    /// The room is in a state that doesn't allow this operation.
    /// For example, starting a game that is already running.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The server-as-host sentinel was asserted in a room created
    /// without server-as-host mode.
    #[error("server-as-host is not enabled for this room")]
    ServerHostDisabled,

    /// The room's command channel is gone; the actor has stopped.
    #[error("room is unavailable")]
    Unavailable,

    /// The durable room record could not be removed during destroy.
    /// Every in-memory destruction effect still happened.
    #[error("durable record removal failed: {0}")]
    Storage(String),
}
