//! Wire model for the threadcast chat protocol.
//!
//! The server speaks JSON named events over a persistent bidirectional
//! connection. This crate defines the typed forms of everything that crosses
//! that boundary:
//!
//! - [`EventId`]: server-assigned identifiers that may arrive as JSON numbers
//!   or strings, compared in normalized form
//! - [`Message`] / [`Reply`]: the chat entities
//! - [`ServerEvent`] / [`ClientRequest`]: exhaustive tagged unions over the
//!   inbound and outbound named events
//! - [`Ack`]: the acknowledgment payload for requests that carry a callback
//! - [`Topic`] / [`Channel`]: records from the static directory endpoint
//!
//! Inbound events are dispatched by string name on the wire; modeling them as
//! one enum means a newly added event kind is a compile-time-checked addition
//! everywhere it must be handled.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod event;
mod id;
mod message;

pub use error::ProtocolError;
pub use event::{Ack, ClientRequest, ServerEvent};
pub use id::EventId;
pub use message::{Channel, Message, OutgoingMessage, Reply, Topic};
