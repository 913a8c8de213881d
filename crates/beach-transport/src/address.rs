//! Socket addresses this crate knows how to bind and connect to.
//!
//! Worker-instance hosts expose their ops socket over a Unix domain socket
//! (`ipc:///tmp/beach_instance_<uuid>`, one process per machine, no need to
//! cross the network); node controllers and actor reply sockets use TCP
//! (`tcp://<ip>:<port>`), since they're reached from other machines. Both
//! forms appear in `actor.py`'s endpoint strings.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Either a TCP socket address or a filesystem path to a Unix domain socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

/// Error returned when an address string doesn't match `tcp://` or `ipc://`.
#[derive(Debug, thiserror::Error)]
#[error("invalid transport address: {0}")]
pub struct AddressParseError(String);

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("tcp://") {
            let addr: SocketAddr = rest
                .parse()
                .map_err(|_| AddressParseError(s.to_string()))?;
            Ok(Self::Tcp(addr))
        } else if let Some(rest) = s.strip_prefix("ipc://") {
            Ok(Self::Unix(PathBuf::from(rest)))
        } else {
            Err(AddressParseError(s.to_string()))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

/// A fresh, process-unique Unix socket path under the system temp directory,
/// matching `hostmanager.py`'s `/tmp/beach_instance_<uuid>` naming.
pub fn instance_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("beach_instance_{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_address() {
        let addr: Address = "tcp://127.0.0.1:5001".parse().unwrap();
        assert_eq!(addr, Address::Tcp("127.0.0.1:5001".parse().unwrap()));
    }

    #[test]
    fn parses_ipc_address() {
        let addr: Address = "ipc:///tmp/beach_instance_abc".parse().unwrap();
        assert_eq!(addr, Address::Unix(PathBuf::from("/tmp/beach_instance_abc")));
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!("http://127.0.0.1:80".parse::<Address>().is_err());
    }

    #[test]
    fn display_roundtrips() {
        let addr: Address = "tcp://10.0.0.1:6000".parse().unwrap();
        assert_eq!(addr.to_string(), "tcp://10.0.0.1:6000");
    }
}
