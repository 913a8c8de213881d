//! Wire-level error vocabulary.
//!
//! `ErrorKind` is the closed set of error strings that can appear in an
//! error reply's `error` field (§7). It is deliberately separate from any
//! crate's internal `thiserror` error types: internal errors carry Rust-side
//! context (spans, source chains) and get mapped down to one of these wire
//! strings at the boundary.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The closed set of error identifiers a node or instance may put on the
/// wire in an error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A request socket timed out waiting for a reply.
    Timeout,
    /// The request body could not be parsed as a valid operation.
    InvalidRequest,
    /// The `req` field named an operation the receiver does not implement.
    UnknownRequest,
    /// `start_actor` was missing a required field (category, uid, ...).
    MissingInformationToStartActor,
    /// `kill_actor` was missing a required field.
    MissingInformationToStopActor,
    /// `remove_actor` was missing a required field.
    MissingInformationToRemoveActor,
    /// A directory lookup was attempted with no category specified.
    NoCategorySpecified,
    /// The requested actor uid is not present in the directory.
    ActorNotFound,
    /// The actor stopped but the directory entry could not be removed.
    ErrorRemovingActorFromDirectoryAfterStop,
    /// One or more actors failed to stop during a bulk kill.
    SomeActorsFailedToStop,
    /// A handler raised an exception while processing the request.
    Exception,
    /// The addressed actor does not support this request type.
    RequestTypeNotSupportedByActor,
    /// Directory update push/pull was missing required information.
    MissingInformationToUpdateDirectory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn renders_snake_case_on_the_wire() {
        assert_eq!(ErrorKind::ActorNotFound.to_string(), "actor_not_found");
        assert_eq!(
            ErrorKind::MissingInformationToStartActor.to_string(),
            "missing_information_to_start_actor"
        );
    }

    #[test]
    fn parses_back_from_wire_string() {
        assert_eq!(
            ErrorKind::from_str("some_actors_failed_to_stop").unwrap(),
            ErrorKind::SomeActorsFailedToStop
        );
    }

    #[test]
    fn serializes_as_json_string() {
        let json = serde_json::to_string(&ErrorKind::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
    }
}
