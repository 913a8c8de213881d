//! Virtual handles: self-refreshing, pooled client connections to one
//! realm/category of actors.
//!
//! [`VirtualHandle`] is the concrete client; [`DirectorySource`] is how it
//! learns where a category currently lives without this crate depending on
//! `beach-node` or `beach-client`; [`HandleFactory`] wires handles into
//! `beach-runtime`'s [`beach_runtime::ActorHandleProvider`] so actor code
//! can call `ctx.get_actor_handle(category, mode)` without knowing any of
//! this exists.

pub mod directory_source;
pub mod error;
pub mod factory;
pub mod handle;
pub mod mode;

pub use directory_source::DirectorySource;
pub use error::HandleError;
pub use factory::HandleFactory;
pub use handle::{VirtualHandle, EMPTY_REFRESH_INTERVAL, KNOWN_REFRESH_INTERVAL, MAX_ACQUIRE_ATTEMPTS, REQUEST_TIMEOUT};
pub use mode::Mode;
