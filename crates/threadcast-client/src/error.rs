//! Client errors.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A sync surface was used after its owning session was torn down. The
    /// surface never degrades to a silent empty default; that would mask
    /// integration bugs.
    #[error("sync surface used outside an active session")]
    OutsideSession,

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The topic directory endpoint failed.
    #[error("directory request failed: {reason}")]
    Directory {
        /// Underlying failure description.
        reason: String,
    },
}
