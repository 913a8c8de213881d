//! The reply side of a request/reply socket: binds, accepts connections,
//! and answers every request a peer sends over them.
//!
//! A connection stays open across many request/reply exchanges — the
//! virtual handle on the other end pools and reuses sockets (§4 C4) rather
//! than reconnecting per call, so the accept loop here keeps reading frames
//! from a connection until the peer closes it, instead of closing after one
//! exchange the way a literal ZeroMQ REQ/REP translation would.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::{TcpListener, UnixListener};
use tracing::{debug, warn};

use crate::address::Address;
use crate::connection::JsonConnection;
use crate::error::TransportError;

/// Answers a single decoded request value with a reply value.
///
/// Implementations never see framing or connection lifecycle — just the
/// JSON payload, mirroring `actor.py`'s `_opsHandler` callback shape.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Value) -> Value;
}

enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// A bound request/reply server.
pub struct ReplySocket {
    listener: Listener,
    local_addr: Address,
}

impl ReplySocket {
    /// Bind a reply socket at `address`. For `Address::Unix`, removes any
    /// stale socket file left behind by a previous, uncleanly-stopped
    /// process before binding.
    pub async fn bind(address: Address) -> Result<Self, TransportError> {
        let listener = match &address {
            Address::Tcp(addr) => Listener::Tcp(TcpListener::bind(addr).await?),
            Address::Unix(path) => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                Listener::Unix(UnixListener::bind(path)?)
            }
        };
        Ok(Self {
            listener,
            local_addr: address,
        })
    }

    /// The address this socket is bound to. For TCP sockets bound to port
    /// 0, reflects the kernel-assigned ephemeral port.
    pub fn local_addr(&self) -> Result<Address, TransportError> {
        match &self.listener {
            Listener::Tcp(listener) => {
                let addr: SocketAddr = listener.local_addr()?;
                Ok(Address::Tcp(addr))
            }
            Listener::Unix(_) => Ok(self.local_addr.clone()),
        }
    }

    /// Accept connections forever, dispatching every request on every
    /// connection to `handler`. Each connection is served on its own task
    /// so a slow or stuck peer never blocks the others.
    pub async fn serve(self, handler: Arc<dyn Handler>) -> Result<(), TransportError> {
        loop {
            match &self.listener {
                Listener::Tcp(listener) => {
                    let (stream, peer) = listener.accept().await?;
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        debug!(%peer, "accepted tcp connection");
                        serve_connection(JsonConnection::new(stream), handler).await;
                    });
                }
                Listener::Unix(listener) => {
                    let (stream, _addr) = listener.accept().await?;
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        debug!("accepted unix connection");
                        serve_connection(JsonConnection::new(stream), handler).await;
                    });
                }
            }
        }
    }
}

async fn serve_connection<S>(mut conn: JsonConnection<S>, handler: Arc<dyn Handler>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        let request = match conn.recv().await {
            Ok(Some(value)) => value,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "error reading request frame, closing connection");
                return;
            }
        };
        let reply = handler.handle(request).await;
        if let Err(err) = conn.send(&reply).await {
            warn!(error = %err, "error writing reply frame, closing connection");
            return;
        }
    }
}

impl Drop for ReplySocket {
    fn drop(&mut self) {
        if let Address::Unix(path) = &self.local_addr {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestSocket;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, request: Value) -> Value {
            serde_json::json!({"status": "ok", "data": request})
        }
    }

    #[tokio::test]
    async fn tcp_roundtrip_echoes_request() {
        let socket = ReplySocket::bind(Address::Tcp("127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(socket.serve(Arc::new(Echo)));

        let mut client = RequestSocket::connect(addr).await.unwrap();
        let reply = client
            .request(serde_json::json!({"req": "keepalive"}), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply["data"]["req"], "keepalive");
    }

    #[tokio::test]
    async fn unix_socket_serves_multiple_requests_on_one_connection() {
        let path = crate::address::instance_socket_path();
        let socket = ReplySocket::bind(Address::Unix(path.clone())).await.unwrap();
        tokio::spawn(socket.serve(Arc::new(Echo)));

        let mut client = RequestSocket::connect(Address::Unix(path)).await.unwrap();
        for i in 0..3 {
            let reply = client
                .request(serde_json::json!({"req": "ping", "n": i}), Duration::from_secs(1))
                .await
                .unwrap();
            assert_eq!(reply["data"]["n"], i);
        }
    }
}
