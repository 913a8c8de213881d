//! Transport-level errors.

/// Errors that can arise while framing, sending, or receiving over a
/// request/reply socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out waiting for a reply")]
    Timeout,

    #[error("peer closed the connection before replying")]
    ConnectionClosed,
}
