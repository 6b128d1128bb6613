//! Unified error type for the server.

use gridlock_room::ConnectionError;
use gridlock_store::StoreError;

/// Top-level error wrapping the layer-specific errors.
///
/// The `#[from]` conversions let `?` lift sub-crate errors anywhere in
/// the server and binary code.
#[derive(Debug, thiserror::Error)]
pub enum GridlockError {
    /// A shared-store failure (Redis unreachable, corrupt record, ...).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A connection-level failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Binding or accepting on the listen socket failed.
    #[error("listener error: {0}")]
    Listener(#[source] std::io::Error),

    /// The WebSocket handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
}
