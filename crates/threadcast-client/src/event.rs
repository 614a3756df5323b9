//! Engine events and actions.

use threadcast_proto::{ClientRequest, Message, Reply};

/// Events the caller feeds into the engine.
///
/// The caller is responsible for receiving events from the transport and
/// forwarding them here in arrival order. The engine never reorders or
/// batches: within one connection the buffer reflects exactly the order the
/// network layer delivered.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The connection came up (initial connect or reconnect).
    Connected,

    /// The connection went down.
    Disconnected {
        /// Transport-reported reason.
        reason: String,
    },

    /// The connection attempt failed.
    ConnectError {
        /// Transport-reported error.
        error: String,
    },

    /// Full history snapshot for a channel, sent in response to a join.
    History(Vec<Message>),

    /// A single newly broadcast message.
    MessageReceived(Message),

    /// A single newly broadcast reply.
    ReplyReceived(Reply),

    /// A join request was rejected.
    JoinError {
        /// Server-reported error.
        error: String,
    },

    /// Server-initiated session invalidation. Must never be suppressed.
    ForcedLogout {
        /// User-facing message from the server.
        message: String,
    },
}

/// Actions the engine produces for the caller to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// Emit a join request for a channel.
    Join {
        /// Channel to join.
        channel: String,
        /// Whether to request an acknowledgment callback.
        ack: bool,
    },

    /// Emit an outbound request.
    Emit {
        /// Request to send.
        request: ClientRequest,
        /// Whether to request an acknowledgment callback.
        ack: bool,
    },

    /// Tear down the local credential entirely: close the connection and
    /// surface the server's message. Equivalent to a local logout.
    ForceLogout {
        /// User-facing message from the server.
        message: String,
    },
}
