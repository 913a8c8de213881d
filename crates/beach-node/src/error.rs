//! Errors a node controller's ops dispatcher or background loops can
//! produce, mapped to the closed wire vocabulary at the boundary.

use beach_proto::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("missing '{0}' in start_actor request")]
    MissingStartField(&'static str),

    #[error("missing '{0}' in kill_actor request")]
    MissingStopField(&'static str),

    #[error("missing '{0}' in remove_actor request")]
    MissingRemoveField(&'static str),

    #[error("no category specified")]
    NoCategorySpecified,

    #[error("no running actor with uid '{0}'")]
    ActorNotFound(String),

    #[error("error removing actor '{0}' from directory after stop")]
    ErrorRemovingActorFromDirectoryAfterStop(String),

    #[error("{failed}/{attempted} actors failed to stop")]
    SomeActorsFailedToStop { failed: usize, attempted: usize },

    #[error("no free worker-instance slot available")]
    NoInstanceAvailable,

    #[error("missing '{0}' needed to update the directory")]
    MissingDirectoryUpdateField(&'static str),

    #[error(transparent)]
    Transport(#[from] beach_transport::TransportError),

    #[error("instance process error: {0}")]
    Instance(String),
}

impl NodeError {
    pub fn wire_kind(&self) -> ErrorKind {
        match self {
            NodeError::MissingStartField(_) => ErrorKind::MissingInformationToStartActor,
            NodeError::MissingStopField(_) => ErrorKind::MissingInformationToStopActor,
            NodeError::MissingRemoveField(_) => ErrorKind::MissingInformationToRemoveActor,
            NodeError::NoCategorySpecified => ErrorKind::NoCategorySpecified,
            NodeError::ActorNotFound(_) => ErrorKind::ActorNotFound,
            NodeError::ErrorRemovingActorFromDirectoryAfterStop(_) => {
                ErrorKind::ErrorRemovingActorFromDirectoryAfterStop
            }
            NodeError::SomeActorsFailedToStop { .. } => ErrorKind::SomeActorsFailedToStop,
            NodeError::NoInstanceAvailable | NodeError::Instance(_) => ErrorKind::Exception,
            NodeError::MissingDirectoryUpdateField(_) => ErrorKind::MissingInformationToUpdateDirectory,
            NodeError::Transport(_) => ErrorKind::Timeout,
        }
    }
}
