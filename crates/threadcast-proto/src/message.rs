//! Chat entities and directory records.

use serde::{Deserialize, Serialize};

use crate::EventId;

/// A top-level post within a channel.
///
/// Created when the server broadcasts it, either inside a channel history
/// snapshot or as a discrete `receive_message` event. Never deleted by the
/// client; the buffer lives only for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned identifier. Absent on a locally-originated send before
    /// the broadcast echo comes back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,
    /// Channel this message belongs to.
    pub channel: String,
    /// Author name.
    pub user: String,
    /// Message body.
    pub message: String,
    /// Attachment URL, if any.
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Attachment display name, if any.
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Server timestamp, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Threaded replies in arrival order (not timestamp order).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
}

/// A threaded response attached to exactly one [`Message`] by parent id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Server-assigned identifier.
    pub id: EventId,
    /// Identifier of the parent message. May arrive in a different JSON type
    /// than the parent's own id; match via [`EventId`] normalized equality.
    pub message_id: EventId,
    /// Channel the reply was posted in.
    pub channel: String,
    /// Author name.
    pub user: String,
    /// Reply body.
    pub message: String,
    /// Attachment URL, if any.
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Attachment display name, if any.
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Server timestamp.
    pub timestamp: String,
}

/// Payload for an outbound `send_message` request.
///
/// The broadcast echo, not this payload, is what lands in the buffer: there
/// is no optimistic local insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Target channel.
    pub channel: String,
    /// Author name. Some call paths omit it and let the server fill it in
    /// from the authenticated session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Message body.
    pub message: String,
    /// Attachment URL, if any.
    #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Attachment display name, if any.
    #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Client timestamp, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A record from the static topic directory.
///
/// Served by a plain request/response endpoint; not part of the real-time
/// event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Display icon (emoji).
    pub icon: String,
    /// Display color (hex).
    pub color: String,
    /// Number of posts across the topic's channels.
    pub post_count: u64,
    /// Number of channels under the topic.
    pub channel_count: u64,
}

/// A channel listing record under a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier.
    pub id: String,
    /// Identifier of the owning topic.
    pub topic_id: String,
    /// Channel name, as used in join requests.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Member count.
    pub member_count: u64,
}
