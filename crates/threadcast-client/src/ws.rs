//! WebSocket transport.
//!
//! Provides [`WsTransport`], which handles the socket I/O for JSON named
//! events. This is a thin layer that just ships frames; protocol logic stays
//! in the Sans-IO [`SyncEngine`](crate::SyncEngine).
//!
//! Every frame is `{"event": <name>, "data": <payload>}`. Outbound requests
//! that expect an acknowledgment carry an additional numeric `id`; the
//! server answers with an `ack` event bearing the same `id`, which resolves
//! the pending oneshot. Unknown or malformed inbound frames are logged and
//! skipped, never fatal.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use threadcast_proto::{Ack, ClientRequest, ProtocolError, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::transport::{AckReceiver, Connector, Transport, TransportError, TransportEvent};

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

type PendingAcks = Arc<Mutex<HashMap<u64, oneshot::Sender<Ack>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Connector producing [`WsTransport`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(
        &self,
        url: &str,
        credential: &str,
    ) -> Result<(WsTransport, mpsc::Receiver<TransportEvent>), TransportError> {
        WsTransport::connect(url, credential).await
    }
}

/// Handle to a live WebSocket connection.
///
/// Emits are queued to a writer task and return immediately; inbound frames
/// are decoded by a reader task and forwarded on the event channel.
pub struct WsTransport {
    /// Outgoing frames to the writer task.
    out_tx: mpsc::UnboundedSender<WsMessage>,
    /// Acknowledgments awaiting their `ack` event, by correlation id.
    pending: PendingAcks,
    /// Next correlation id.
    next_id: AtomicU64,
    /// Abort handles for the reader and writer tasks.
    reader: tokio::task::AbortHandle,
    writer: tokio::task::AbortHandle,
}

impl WsTransport {
    /// Connect to the server, authenticating with the credential.
    ///
    /// The credential rides the connection request itself (query string), so
    /// the server can reject the socket before any event flows.
    pub async fn connect(
        url: &str,
        credential: &str,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>), TransportError> {
        let url = ws_url(url, credential);
        let (stream, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let (sink, source) = stream.split();

        let (out_tx, out_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(EVENT_CHANNEL_CAPACITY);
        let pending: PendingAcks = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(run_writer(sink, out_rx));
        let reader = tokio::spawn(run_reader(source, event_tx, Arc::clone(&pending)));

        let transport = Self {
            out_tx,
            pending,
            next_id: AtomicU64::new(1),
            reader: reader.abort_handle(),
            writer: writer.abort_handle(),
        };
        Ok((transport, event_rx))
    }

    fn send_frame(&self, frame: serde_json::Value) -> Result<(), TransportError> {
        self.out_tx
            .send(WsMessage::text(frame.to_string()))
            .map_err(|_| TransportError::Closed)
    }
}

impl Transport for WsTransport {
    fn emit(&self, request: ClientRequest) -> Result<(), TransportError> {
        let frame = serde_json::to_value(&request)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.send_frame(frame)
    }

    fn emit_with_ack(&self, request: ClientRequest) -> Result<AckReceiver, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut frame = serde_json::to_value(&request)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        if let serde_json::Value::Object(map) = &mut frame {
            map.insert("id".to_owned(), serde_json::Value::from(id));
        }

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        if let Err(error) = self.send_frame(frame) {
            lock(&self.pending).remove(&id);
            return Err(error);
        }
        Ok(rx)
    }

    fn close(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Run the writer side: drain the outgoing queue into the socket.
async fn run_writer<S>(mut sink: S, mut out_rx: mpsc::UnboundedReceiver<WsMessage>)
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(frame) = out_rx.recv().await {
        if let Err(error) = sink.send(frame).await {
            tracing::warn!(%error, "websocket send failed");
            break;
        }
    }
}

/// Run the reader side: decode frames, resolve acks, forward events.
async fn run_reader<S>(mut source: S, event_tx: mpsc::Sender<TransportEvent>, pending: PendingAcks)
where
    S: Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    // The socket is established by the time the tasks exist.
    if event_tx.send(TransportEvent::Up).await.is_err() {
        return;
    }

    let reason = loop {
        match source.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if let Some(event) = decode_frame(text.as_str(), &pending) {
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
            },
            Some(Ok(WsMessage::Close(frame))) => {
                break frame.map_or_else(|| "closed".to_owned(), |f| f.reason.to_string());
            },
            // Ping/pong are handled by tungstenite; binary frames are not
            // part of this protocol.
            Some(Ok(_)) => {},
            Some(Err(error)) => break error.to_string(),
            None => break "stream ended".to_owned(),
        }
    };

    let _ = event_tx.send(TransportEvent::Down { reason }).await;
}

/// Decode one text frame. Returns `None` for frames that do not produce a
/// transport event (acks, unknown events, malformed payloads).
fn decode_frame(text: &str, pending: &PendingAcks) -> Option<TransportEvent> {
    let raw: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%error, "skipping non-JSON frame");
            return None;
        },
    };

    if raw.get("event").and_then(serde_json::Value::as_str) == Some("ack") {
        resolve_ack(&raw, pending);
        return None;
    }

    match ServerEvent::decode(&raw) {
        Ok(event) => Some(TransportEvent::Event(event)),
        Err(ProtocolError::UnknownEvent { name }) => {
            // Forward compatibility: servers may grow event kinds first.
            tracing::debug!(event = %name, "skipping unknown event");
            None
        },
        Err(error) => {
            tracing::warn!(%error, "skipping malformed frame");
            None
        },
    }
}

/// Resolve a pending acknowledgment from an `ack` frame.
fn resolve_ack(raw: &serde_json::Value, pending: &PendingAcks) {
    let Some(id) = raw.get("id").and_then(serde_json::Value::as_u64) else {
        tracing::warn!("ack frame without correlation id");
        return;
    };
    let ack: Ack = raw
        .get("data")
        .cloned()
        .and_then(|data| serde_json::from_value(data).ok())
        .unwrap_or_default();

    // Observation logging lives here so callers that drop the receiver
    // still leave a trace of the outcome.
    if ack.is_err() {
        tracing::warn!(id, error = ack.error.as_deref().unwrap_or("unspecified"), "request failed");
    } else {
        tracing::debug!(id, "request acknowledged");
    }

    match lock(pending).remove(&id) {
        Some(tx) => {
            let _ = tx.send(ack);
        },
        None => tracing::debug!(id, "ack for unknown or dropped request"),
    }
}

/// Derive the websocket endpoint from the configured server URL.
///
/// The credential is percent-encoded: tokens are opaque strings and may
/// contain query-breaking characters.
fn ws_url(base: &str, credential: &str) -> String {
    let base = base.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_owned()
    };
    format!("{ws}/ws?token={}", urlencoding::encode(credential))
}
