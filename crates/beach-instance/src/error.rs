//! Errors specific to hosting actors inside a worker-instance process.

use beach_proto::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("missing '{0}' in start_actor request")]
    MissingStartField(&'static str),

    #[error("missing '{0}' in kill_actor request")]
    MissingStopField(&'static str),

    #[error("no actor type registered under '{0}'")]
    UnknownActorName(String),

    #[error("no running actor with uid '{0}'")]
    ActorNotFound(String),

    #[error("failed to bind actor reply socket: {0}")]
    Bind(#[from] beach_transport::TransportError),
}

impl HostError {
    pub fn wire_kind(&self) -> ErrorKind {
        match self {
            HostError::MissingStartField(_) => ErrorKind::MissingInformationToStartActor,
            HostError::MissingStopField(_) => ErrorKind::MissingInformationToStopActor,
            HostError::UnknownActorName(_) | HostError::Bind(_) => ErrorKind::Exception,
            HostError::ActorNotFound(_) => ErrorKind::ActorNotFound,
        }
    }
}
