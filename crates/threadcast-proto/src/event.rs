//! Named events crossing the real-time connection.
//!
//! The wire frames every event as `{"event": <name>, "data": <payload>}`.
//! Requests that expect an acknowledgment additionally carry a numeric `id`
//! the server echoes back on an `ack` event; that correlation field is the
//! transport's concern and is injected at send time.

use serde::{Deserialize, Serialize};

use crate::{EventId, Message, OutgoingMessage, Reply};

/// Inbound named events, dispatched by the `event` tag.
///
/// Exhaustive by construction: adding a server event kind forces every
/// handler through a compile error rather than a silently ignored string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full message set for a channel, sent in response to a join.
    ChannelHistory(Vec<Message>),
    /// A single newly broadcast message.
    ReceiveMessage(Message),
    /// A single newly broadcast reply.
    ReceiveReply(Reply),
    /// A join request was rejected. The payload shape is not pinned down by
    /// the server, so it is kept loose and only ever logged.
    JoinError(serde_json::Value),
    /// Server-initiated session invalidation carrying a user-facing message.
    ForceLogout(String),
}

impl ServerEvent {
    /// Decode a wire frame already parsed as JSON.
    ///
    /// Dispatches on the `event` field first so callers can tell an event
    /// this client does not know (skippable, forward compatible) apart from
    /// a known event with a malformed payload.
    pub fn decode(raw: &serde_json::Value) -> Result<Self, crate::ProtocolError> {
        let name = raw
            .get("event")
            .and_then(serde_json::Value::as_str)
            .ok_or(crate::ProtocolError::MissingEventName)?;
        match name {
            "channel_history" | "receive_message" | "receive_reply" | "join_error"
            | "force_logout" => Ok(serde_json::from_value(raw.clone())?),
            other => Err(crate::ProtocolError::UnknownEvent { name: other.to_owned() }),
        }
    }
}

/// Outbound named requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Subscribe to a channel and request its history snapshot.
    JoinChannel(String),
    /// Post a new top-level message.
    SendMessage(OutgoingMessage),
    /// Post a reply threaded onto an existing message.
    SendReply {
        /// Parent message identifier.
        #[serde(rename = "messageId")]
        message_id: EventId,
        /// Channel the reply targets.
        channel: String,
        /// Reply body.
        message: String,
        /// Client timestamp.
        timestamp: String,
    },
}

impl ClientRequest {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinChannel(_) => "join_channel",
            Self::SendMessage(_) => "send_message",
            Self::SendReply { .. } => "send_reply",
        }
    }
}

/// Acknowledgment payload for a request that carried a callback.
///
/// The server reports failure via `error`, success via `success`, and may
/// send an empty object for a successful join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Set when the request succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Set when the request failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    /// Whether the acknowledgment reports failure.
    pub fn is_err(&self) -> bool {
        self.error.is_some() || self.success == Some(false)
    }

    /// Whether the acknowledgment reports success.
    pub fn is_success(&self) -> bool {
        !self.is_err()
    }
}
