//! Connection lifecycle and the public sync surface.
//!
//! The [`Session`] owns at most one live transport connection, keyed by the
//! current credential: setting a credential tears the previous connection
//! down fully (reader task aborted before the transport closes, so no stale
//! handler ever fires against a superseded connection) and opens a new one.
//! Clearing the credential tears down without reconnecting.
//!
//! Consumers interact through [`SyncHandle`], which holds a weak reference
//! to the session state: using a handle after its session is gone fails
//! fast with [`ClientError::OutsideSession`] instead of silently returning
//! an empty surface.

use std::{
    ops::ControlFlow,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use threadcast_proto::{ClientRequest, EventId, Message, OutgoingMessage, ServerEvent};
use tokio::sync::{mpsc, watch};

use crate::{
    ClientError, EngineAction, EngineEvent, SyncEngine,
    transport::{AckReceiver, Connector, Transport, TransportEvent},
};

/// Default server endpoint, matching the deployed chat backend.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3001";

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server endpoint for both the event connection and the directory.
    pub server_url: String,
}

impl SessionConfig {
    /// Configuration pointing at the default server endpoint.
    pub fn new() -> Self {
        Self { server_url: DEFAULT_SERVER_URL.to_owned() }
    }

    /// Set the server endpoint.
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the session, its reader task, and sync handles.
struct Shared<T: Transport> {
    engine: Mutex<SyncEngine>,
    transport: Mutex<Option<Arc<T>>>,
    credential: Mutex<Option<String>>,
    /// Carries the latest forced-logout message from the server, if any.
    logout: watch::Sender<Option<String>>,
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// One live connection: the transport plus its reader task.
struct Connection<T: Transport> {
    transport: Arc<T>,
    reader: tokio::task::JoinHandle<()>,
}

/// Owner of the sync engine and the credential-driven connection lifecycle.
pub struct Session<C: Connector> {
    config: SessionConfig,
    connector: C,
    shared: Arc<Shared<C::Transport>>,
    conn: Option<Connection<C::Transport>>,
}

impl<C: Connector> Session<C> {
    /// Create a session with no credential and no connection.
    pub fn new(config: SessionConfig, connector: C) -> Self {
        let (logout, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            engine: Mutex::new(SyncEngine::new()),
            transport: Mutex::new(None),
            credential: Mutex::new(None),
            logout,
        });
        Self { config, connector, shared, conn: None }
    }

    /// Drive the connection lifecycle from a credential transition.
    ///
    /// Any existing connection is torn down fully first. With `Some`, a new
    /// connection authenticated with the credential is opened; a connect
    /// failure is logged and left alone (no retry; the session simply stays
    /// disconnected). With `None`, no new connection is opened.
    pub async fn set_credential(&mut self, credential: Option<String>) {
        self.teardown();
        *lock(&self.shared.credential) = credential.clone();

        let Some(token) = credential else {
            tracing::debug!("credential cleared, staying disconnected");
            return;
        };

        match self.connector.connect(&self.config.server_url, &token).await {
            Ok((transport, events)) => {
                let transport = Arc::new(transport);
                *lock(&self.shared.transport) = Some(Arc::clone(&transport));
                let reader = tokio::spawn(run_reader(Arc::clone(&self.shared), events));
                self.conn = Some(Connection { transport, reader });
            },
            Err(error) => {
                tracing::error!(%error, "connection failed");
            },
        }
    }

    /// Tear down the session, equivalent to `set_credential(None)`.
    pub fn shutdown(&mut self) {
        self.teardown();
        *lock(&self.shared.credential) = None;
    }

    /// Obtain the sync surface consumers read and write through.
    pub fn handle(&self) -> SyncHandle<C::Transport> {
        SyncHandle { shared: Arc::downgrade(&self.shared) }
    }

    /// Credential currently in effect, if any.
    ///
    /// A server-forced logout clears this without a caller-side
    /// `set_credential(None)`.
    pub fn credential(&self) -> Option<String> {
        lock(&self.shared.credential).clone()
    }

    /// Watch for server-forced logout messages.
    ///
    /// The value transitions to `Some(message)` when the server invalidates
    /// the session; the local teardown has already happened by then.
    pub fn forced_logout(&self) -> watch::Receiver<Option<String>> {
        self.shared.logout.subscribe()
    }

    /// Close the current connection, if any.
    ///
    /// The reader is aborted before the transport closes so handlers from
    /// this connection cannot fire once a successor exists.
    fn teardown(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.reader.abort();
            conn.transport.close();
        }
        *lock(&self.shared.transport) = None;
        let _ = lock(&self.shared.engine)
            .handle(EngineEvent::Disconnected { reason: "connection torn down".to_owned() });
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Forward transport events into the engine and execute resulting actions.
async fn run_reader<T: Transport>(
    shared: Arc<Shared<T>>,
    mut events: mpsc::Receiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let engine_event = match event {
            TransportEvent::Up => EngineEvent::Connected,
            TransportEvent::Down { reason } => EngineEvent::Disconnected { reason },
            TransportEvent::ConnectError { error } => EngineEvent::ConnectError { error },
            TransportEvent::Event(server_event) => match server_event {
                ServerEvent::ChannelHistory(messages) => EngineEvent::History(messages),
                ServerEvent::ReceiveMessage(message) => EngineEvent::MessageReceived(message),
                ServerEvent::ReceiveReply(reply) => EngineEvent::ReplyReceived(reply),
                ServerEvent::JoinError(error) => EngineEvent::JoinError { error: error.to_string() },
                ServerEvent::ForceLogout(message) => EngineEvent::ForcedLogout { message },
            },
        };

        let actions = lock(&shared.engine).handle(engine_event);
        let (flow, _ack) = execute_actions(&shared, actions);
        if flow.is_break() {
            break;
        }
    }
}

/// Execute engine actions against the live transport.
///
/// Returns the acknowledgment receiver of the last ack-carrying emit, and
/// `Break` when a forced logout tore the session down.
fn execute_actions<T: Transport>(
    shared: &Shared<T>,
    actions: Vec<EngineAction>,
) -> (ControlFlow<()>, Option<AckReceiver>) {
    let mut ack_rx = None;

    for action in actions {
        match action {
            EngineAction::Join { channel, ack } => {
                let request = ClientRequest::JoinChannel(channel);
                ack_rx = emit(shared, request, ack).or(ack_rx);
            },
            EngineAction::Emit { request, ack } => {
                ack_rx = emit(shared, request, ack).or(ack_rx);
            },
            EngineAction::ForceLogout { message } => {
                force_logout(shared, message);
                return (ControlFlow::Break(()), ack_rx);
            },
        }
    }

    (ControlFlow::Continue(()), ack_rx)
}

/// Emit a request on the live transport, if one exists.
fn emit<T: Transport>(
    shared: &Shared<T>,
    request: ClientRequest,
    ack: bool,
) -> Option<AckReceiver> {
    let transport = lock(&shared.transport).clone()?;
    let name = request.name();
    if ack {
        match transport.emit_with_ack(request) {
            Ok(rx) => return Some(rx),
            Err(error) => tracing::warn!(event = name, %error, "emit failed"),
        }
    } else if let Err(error) = transport.emit(request) {
        tracing::warn!(event = name, %error, "emit failed");
    }
    None
}

/// Server-initiated session invalidation: full local credential teardown.
fn force_logout<T: Transport>(shared: &Shared<T>, message: String) {
    tracing::warn!(%message, "server forced logout");
    *lock(&shared.credential) = None;
    if let Some(transport) = lock(&shared.transport).take() {
        transport.close();
    }
    let _ = lock(&shared.engine)
        .handle(EngineEvent::Disconnected { reason: "forced logout".to_owned() });
    let _ = shared.logout.send(Some(message));
}

/// The read/write surface exposed to the rest of the application.
///
/// Cheap to clone and hand to every consumer (message list, composer,
/// sidebar). All methods fail with [`ClientError::OutsideSession`] once the
/// owning [`Session`] is dropped.
pub struct SyncHandle<T: Transport> {
    shared: Weak<Shared<T>>,
}

impl<T: Transport> Clone for SyncHandle<T> {
    fn clone(&self) -> Self {
        Self { shared: Weak::clone(&self.shared) }
    }
}

impl<T: Transport> SyncHandle<T> {
    fn shared(&self) -> Result<Arc<Shared<T>>, ClientError> {
        self.shared.upgrade().ok_or(ClientError::OutsideSession)
    }

    /// Currently observed channel. Empty string means none selected.
    pub fn channel(&self) -> Result<String, ClientError> {
        Ok(lock(&self.shared()?.engine).channel().to_owned())
    }

    /// Change the current channel.
    ///
    /// Clears the buffer immediately; emits a join when connected.
    pub fn set_channel(&self, channel: &str) -> Result<(), ClientError> {
        let shared = self.shared()?;
        let actions = lock(&shared.engine).set_channel(channel);
        let _ = execute_actions(&shared, actions);
        Ok(())
    }

    /// Snapshot of the ordered message buffer.
    pub fn messages(&self) -> Result<Vec<Message>, ClientError> {
        Ok(lock(&self.shared()?.engine).messages().to_vec())
    }

    /// Replace the buffer directly, outside the event path.
    ///
    /// Intentional escape hatch; see [`SyncEngine::set_messages`].
    pub fn set_messages(&self, messages: Vec<Message>) -> Result<(), ClientError> {
        lock(&self.shared()?.engine).set_messages(messages);
        Ok(())
    }

    /// Re-request the current channel's history.
    ///
    /// Returns `Ok(None)` when this was a silent no-op (no live connection
    /// or no channel selected). The acknowledgment has no timeout and
    /// triggers no retry; dropping it is fire-and-forget.
    pub fn refresh(&self) -> Result<Option<AckReceiver>, ClientError> {
        let shared = self.shared()?;
        let actions = lock(&shared.engine).refresh();
        let (_, ack) = execute_actions(&shared, actions);
        Ok(ack)
    }

    /// Post a new top-level message.
    ///
    /// The buffer is untouched until the server broadcasts the message
    /// back; callers wanting an immediate fresh pull should await the
    /// acknowledgment and then [`refresh`](Self::refresh).
    pub fn send_message(
        &self,
        outgoing: OutgoingMessage,
    ) -> Result<Option<AckReceiver>, ClientError> {
        let shared = self.shared()?;
        let actions = lock(&shared.engine).send_message(outgoing);
        let (_, ack) = execute_actions(&shared, actions);
        Ok(ack)
    }

    /// Post a reply threaded onto an existing message in the current
    /// channel.
    pub fn send_reply(
        &self,
        message_id: EventId,
        message: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Result<Option<AckReceiver>, ClientError> {
        let shared = self.shared()?;
        let actions =
            lock(&shared.engine).send_reply(message_id, message.into(), timestamp.into());
        let (_, ack) = execute_actions(&shared, actions);
        Ok(ack)
    }

    /// Whether the transport currently reports an established connection.
    pub fn is_connected(&self) -> Result<bool, ClientError> {
        Ok(lock(&self.shared()?.engine).is_connected())
    }
}
