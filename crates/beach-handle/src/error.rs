//! Errors a virtual handle can surface to a caller.

/// Errors raised while resolving, acquiring, or using a virtual handle.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("no known actors published under this category")]
    CategoryEmpty,

    #[error("failed to refresh directory entries: {0}")]
    DirectoryLookup(String),

    #[error(transparent)]
    Transport(#[from] beach_transport::TransportError),

    #[error("gave up after {0} acquire attempts, all endpoints unreachable")]
    ExhaustedRetries(u32),

    #[error("handle has been closed")]
    Closed,
}
