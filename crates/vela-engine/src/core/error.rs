use thiserror::Error;

/// Error kinds a command can fail with (§7). Commands fail synchronously and
/// leave engine state unchanged; runtime anomalies inside the audio block
/// never surface this type, they degrade to silence instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("routing change would create a cycle")]
    InvalidRouting,
    #[error("unknown id: {0}")]
    UnknownId(String),
    #[error("value out of range for {0}")]
    OutOfRange(&'static str),
    #[error("clip references an unresolved buffer: {0}")]
    MissingSource(String),
    #[error("failed to decode audio data: {0}")]
    DecodeFailure(String),
    #[error("render was cancelled")]
    RenderCancelled,
    #[error("invalid command: {0}")]
    InvalidCommand(&'static str),
}

impl EngineError {
    pub fn unknown_id(id: impl std::fmt::Display) -> Self {
        EngineError::UnknownId(id.to_string())
    }

    pub fn missing_source(reference: impl Into<String>) -> Self {
        EngineError::MissingSource(reference.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
