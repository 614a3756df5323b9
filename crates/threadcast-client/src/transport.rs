//! Transport seam between the engine and the network.
//!
//! The [`Connector`]/[`Transport`] traits decouple the session from a
//! concrete connection so the same lifecycle code runs against the
//! production WebSocket transport and against in-memory test doubles.
//! Protocol logic never lives here; it stays in the Sans-IO
//! [`SyncEngine`](crate::SyncEngine).

use std::future::Future;

use thiserror::Error;
use threadcast_proto::{Ack, ClientRequest, ServerEvent};
use tokio::sync::{mpsc, oneshot};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport was already closed.
    #[error("transport closed")]
    Closed,
}

/// Lifecycle and protocol events a transport delivers to the session.
///
/// Within a single connection the transport preserves arrival order as
/// received from the network layer. Across a reconnect no ordering holds;
/// a fresh join re-requests a history snapshot to resynchronize.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is established and authenticated.
    Up,
    /// The connection closed.
    Down {
        /// Close reason.
        reason: String,
    },
    /// The connection attempt failed after the transport was created.
    ConnectError {
        /// Failure description.
        error: String,
    },
    /// A named server event arrived.
    Event(ServerEvent),
}

/// Receiver for a single acknowledgment.
///
/// No timeout is attached: if the server never answers, awaiting this wedges
/// exactly as the callback-based source does. Dropping the receiver is the
/// fire-and-forget mode. When the connection is torn down with the
/// acknowledgment still pending, the sender side drops and the receiver
/// resolves with a channel-closed error.
pub type AckReceiver = oneshot::Receiver<Ack>;

/// A live connection to the server.
///
/// Requests are queued and return immediately; outcomes arrive either as
/// later [`TransportEvent`]s or through an [`AckReceiver`].
pub trait Transport: Send + Sync + 'static {
    /// Send a request without an acknowledgment.
    fn emit(&self, request: ClientRequest) -> Result<(), TransportError>;

    /// Send a request that expects an acknowledgment callback.
    fn emit_with_ack(&self, request: ClientRequest) -> Result<AckReceiver, TransportError>;

    /// Close the connection and stop its I/O tasks.
    fn close(&self);
}

/// Factory for [`Transport`] instances.
///
/// The session calls this once per credential transition; each call must
/// produce a fresh connection authenticated with the given credential,
/// together with the event channel its handlers feed.
pub trait Connector: Send + Sync + 'static {
    /// Transport type produced by this connector.
    type Transport: Transport;

    /// Open a connection to `url` authenticated with `credential`.
    fn connect(
        &self,
        url: &str,
        credential: &str,
    ) -> impl Future<Output = Result<(Self::Transport, mpsc::Receiver<TransportEvent>), TransportError>>
    + Send;
}
