//! Drawing relay wire protocol.
//!
//! Every frame is a JSON object tagged by a `type` field. Inbound frames are
//! `joinRoom`, `draw` and `clear`; anything else decodes to
//! [`InboundEvent::Unknown`] and is ignored by the relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ProtocolError;

/// Gateway-assigned identity of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A `joinRoom` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_id: String,
    /// Set by clients that think they are creating the room. Informational only.
    #[serde(default)]
    pub is_creating: bool,
}

/// One drawing action, stored and relayed exactly as the client sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawPayload(Value);

impl DrawPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Client -> relay events.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Join(JoinRoom),
    Draw(DrawPayload),
    Clear,
    /// A well-formed frame with a `type` the relay does not handle.
    Unknown(String),
}

impl InboundEvent {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = match &value {
            Value::Object(map) => map
                .get("type")
                .and_then(Value::as_str)
                .ok_or(ProtocolError::MissingType)?
                .to_owned(),
            _ => return Err(ProtocolError::NotAnObject),
        };

        match kind.as_str() {
            "joinRoom" => {
                let join: JoinRoom =
                    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidField {
                        field: "roomId",
                        reason: e.to_string(),
                    })?;
                if join.room_id.is_empty() {
                    return Err(ProtocolError::InvalidField {
                        field: "roomId",
                        reason: "must not be empty".into(),
                    });
                }
                Ok(Self::Join(join))
            }
            "draw" => Ok(Self::Draw(DrawPayload(value))),
            "clear" => Ok(Self::Clear),
            _ => Ok(Self::Unknown(kind)),
        }
    }

    /// The frame's `type`, for logs.
    pub fn kind(&self) -> &str {
        match self {
            Self::Unknown(kind) => kind,
            _ => self.label(),
        }
    }

    /// Metric label: one of a fixed set, so client-chosen types collapse to
    /// `"unknown"`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Join(_) => "joinRoom",
            Self::Draw(_) => "draw",
            Self::Clear => "clear",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Relay -> client events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundEvent<'a> {
    /// Catch-up snapshot sent to a joining connection only.
    DrawHistory { history: &'a [DrawPayload] },
    /// Current member count of the room.
    UserCount { count: usize },
    /// A draw from another member, relayed verbatim.
    #[serde(skip_serializing)]
    Draw(&'a DrawPayload),
    Clear,
}

impl OutboundEvent<'_> {
    /// Encode as a JSON text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Draw(payload) => serde_json::to_string(payload),
            other => serde_json::to_string(other),
        }
    }
}
