//! Wire decoding errors.

use thiserror::Error;

/// Errors from decoding inbound wire frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or did not match the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame named an event this client does not know.
    #[error("unknown event {name:?}")]
    UnknownEvent {
        /// Event name as it appeared on the wire.
        name: String,
    },

    /// The frame had no `event` field to dispatch on.
    #[error("frame has no event name")]
    MissingEventName,
}
