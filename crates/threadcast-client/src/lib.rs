//! Client
//!
//! Client-side real-time synchronization engine for the threadcast chat
//! protocol. Owns the event connection to the server, tracks the single
//! channel the client observes, reconciles inbound events into an ordered
//! message buffer, and threads replies onto messages by normalized
//! identifier — across reconnects, channel switches, and out-of-order
//! delivery.
//!
//! # Architecture
//!
//! The crate follows the Sans-IO and action-based patterns: the
//! [`SyncEngine`] is a pure state machine that consumes [`EngineEvent`]s and
//! returns [`EngineAction`]s, while the [`Session`] executes those actions
//! against a [`Transport`](transport::Transport) and drives the
//! credential-keyed connection lifecycle.
//!
//! # Components
//!
//! - [`SyncEngine`]: channel tracking and event reconciliation
//! - [`Session`]: connection lifecycle, one connection per credential
//! - [`SyncHandle`]: the read/write surface handed to consumers
//! - [`transport`]: the seam between the session and the network
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`ws::WsTransport`]: WebSocket transport for JSON named events
//! - [`directory`]: the static topic/channel directory endpoint

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod engine;
mod error;
mod event;
mod session;
pub mod transport;

#[cfg(feature = "transport")]
pub mod directory;
#[cfg(feature = "transport")]
pub mod ws;

pub use engine::SyncEngine;
pub use error::ClientError;
pub use event::{EngineAction, EngineEvent};
pub use session::{DEFAULT_SERVER_URL, Session, SessionConfig, SyncHandle};
pub use threadcast_proto::{
    Ack, Channel, ClientRequest, EventId, Message, OutgoingMessage, Reply, ServerEvent, Topic,
};
