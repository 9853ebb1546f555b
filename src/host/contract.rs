//! Versioned host command/event envelopes for the player shell.

use serde::{Deserialize, Serialize};

/// Contract version for host command/event envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Command set accepted by the playback host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "session.start")]
    SessionStart,
    #[serde(rename = "session.status")]
    SessionStatus,
    #[serde(rename = "realtime.event")]
    RealtimeEvent,
    #[serde(rename = "broadcast.event")]
    BroadcastEvent,
    #[serde(rename = "player.position")]
    PlayerPosition,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl CommandName {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::SessionStart => "session.start",
            Self::SessionStatus => "session.status",
            Self::RealtimeEvent => "realtime.event",
            Self::BroadcastEvent => "broadcast.event",
            Self::PlayerPosition => "player.position",
            Self::RuntimeStop => "runtime.stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "host.ping" => Some(Self::HostPing),
            "host.version" => Some(Self::HostVersion),
            "session.start" => Some(Self::SessionStart),
            "session.status" => Some(Self::SessionStatus),
            "realtime.event" => Some(Self::RealtimeEvent),
            "broadcast.event" => Some(Self::BroadcastEvent),
            "player.position" => Some(Self::PlayerPosition),
            "runtime.stop" => Some(Self::RuntimeStop),
            _ => None,
        }
    }
}

/// A versioned response envelope from host -> player shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A versioned command envelope from player shell -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    /// Build a v1 command envelope.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::UnsupportedVersion { found: self.v });
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::MissingRequestId);
        }
        Ok(())
    }
}

/// A versioned event envelope from host -> player shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build a v1 event envelope.
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }
}

/// Envelope validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("unsupported contract version {found}; expected {}", EVENT_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("request_id cannot be empty")]
    MissingRequestId,
}
