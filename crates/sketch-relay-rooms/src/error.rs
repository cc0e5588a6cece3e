use thiserror::Error;

/// Why an inbound frame could not be decoded.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Frame has no string `type` field")]
    MissingType,

    #[error("Invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ProtocolError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
            Self::InvalidField { .. } => "invalid_field",
        }
    }
}

/// The relay task has stopped and no longer accepts commands.
#[derive(Debug, Clone, Copy, Error)]
#[error("Relay is not running")]
pub struct RelayClosed;

/// The client connection behind a sink is gone.
#[derive(Debug, Clone, Copy, Error)]
#[error("Client connection closed")]
pub struct SinkClosed;
