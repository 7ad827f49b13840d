//! Crate-level error type.

/// Failures that prevent the realtime layer from starting or connecting.
///
/// None of these surface from send or broadcast calls; those report
/// acceptance as `bool` and log the reason.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// No room id from any configured source; the layer stays disabled.
    #[error("room id could not be resolved")]
    RoomUnresolved,
    /// The base URL is not an `http`, `https`, `ws` or `wss` URL with a host.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// The WebSocket connection or handshake failed.
    #[error("websocket connect failed: {0}")]
    WsConnect(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}
