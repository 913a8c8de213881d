//! Length-delimited, JSON-framed request/reply sockets over TCP and Unix
//! domain sockets.
//!
//! Every exchange in the cluster — ops calls, directory sync, actor
//! messages — rides one of these connections. `ReplySocket` binds and
//! answers; `RequestSocket` connects and asks. Both speak the same framing
//! ([`connection::JsonConnection`]) so the choice between TCP and Unix is
//! just which [`Address`] variant you bind or connect to.

pub mod address;
pub mod connection;
pub mod error;
pub mod reply;
pub mod request;

pub use address::{instance_socket_path, Address};
pub use error::TransportError;
pub use reply::{Handler, ReplySocket};
pub use request::RequestSocket;
