//! Errors a cluster client call can surface to application code.

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no seed node answered within the startup deadline")]
    NoNodeReachable,

    #[error(transparent)]
    Transport(#[from] beach_transport::TransportError),

    #[error("node replied with error: {0}")]
    NodeError(beach_proto::ErrorKind),

    #[error("node reply was malformed: {0}")]
    MalformedReply(String),

    #[error("no nodes known to place an actor on")]
    NoNodesKnown,
}
