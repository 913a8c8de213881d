//! The abstraction a virtual handle uses to learn where a category's
//! actors currently live, without depending on `beach-node` or
//! `beach-client` (both depend on this crate, not the reverse).

use async_trait::async_trait;
use beach_proto::{ActorEntry, Category, Realm, Uid};

use crate::error::HandleError;

/// Supplies the current set of published `(uid, entry)` pairs for a
/// realm/category.
///
/// `beach-node` implements this against its local `Directory`; `beach-client`
/// implements it against the node it's attached to over the ops socket.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn lookup(&self, realm: &Realm, category: &Category) -> Result<Vec<(Uid, ActorEntry)>, HandleError>;
}
