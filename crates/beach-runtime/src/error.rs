//! Errors raised while initializing, dispatching to, or tearing down an
//! actor, and the supervisor's response to them.

use beach_proto::ErrorKind;

/// Errors an actor's lifecycle or handler dispatch can produce.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("actor init failed: {0}")]
    Init(String),

    #[error("no handler registered for request type '{0}'")]
    UnknownRequestType(String),

    #[error("actor does not support request type '{0}'")]
    UnsupportedRequestType(String),

    #[error("handler panicked or returned an exception: {0}")]
    Exception(String),

    #[error("no category available to resolve a peer handle for '{0}'")]
    CategoryUnavailable(String),

    #[error(transparent)]
    Transport(#[from] beach_transport::TransportError),

    #[error("virtual handle error: {0}")]
    Handle(String),
}

impl RuntimeError {
    /// Map an internal error to the closed wire vocabulary (§7).
    pub fn wire_kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Init(_) | RuntimeError::Exception(_) => ErrorKind::Exception,
            RuntimeError::UnknownRequestType(_) => ErrorKind::UnknownRequest,
            RuntimeError::UnsupportedRequestType(_) => ErrorKind::RequestTypeNotSupportedByActor,
            RuntimeError::CategoryUnavailable(_) => ErrorKind::NoCategorySpecified,
            RuntimeError::Transport(_) => ErrorKind::Timeout,
            RuntimeError::Handle(_) => ErrorKind::Timeout,
        }
    }
}

/// What a supervisor should do after a handler or lifecycle hook errors,
/// mirroring `airssys-rt`'s `ErrorAction` (stop/resume/restart/escalate)
/// applied here to a single actor instance rather than a supervision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Log and continue serving further requests.
    Resume,
    /// Stop this actor; do not restart it.
    Stop,
    /// Stop and re-`init` this actor in place.
    Restart,
    /// Propagate to the worker-instance host, which reports it up to the
    /// owning node controller.
    Escalate,
}
