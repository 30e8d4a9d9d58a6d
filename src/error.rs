use std::time::Duration;

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

/// Errors that can occur while driving a game.
///
/// Recoverable variants are handled inside the phase that raised them and
/// produce a channel message; only `InternalConsistency` is allowed to
/// propagate to the top-level reporting sink.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("no cards available in expansions: {0}")]
    CardSupplyExhausted(String),

    #[error("menu resolved ambiguously: {0}")]
    MenuResolutionAmbiguous(String),

    #[error("not enough players to continue: {0}")]
    InsufficientPlayers(String),

    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),

    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("player not found: {0}")]
    PlayerNotFound(String),

    #[error("deck not found: {0}")]
    DeckNotFound(String),

    #[error("invalid deck metadata: {0}")]
    InvalidDeck(String),

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("can't join this game: {0}")]
    JoinRefused(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures raised by the chat transport.
///
/// These are best-effort degraded except for critical sends (hand-setup
/// DMs), which are retried a bounded number of times before giving up.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("message or channel not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("transport request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Other(String),
}
