//! Error types for the protocol layer.

/// Errors from parsing a game-code display string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    /// Display codes are exactly 4 or 6 letters.
    #[error("game codes are 4 or 6 letters, got {0} characters")]
    InvalidLength(usize),

    /// The string contained something outside `A-Z`.
    #[error("invalid character {0:?} in game code")]
    InvalidChar(char),
}
