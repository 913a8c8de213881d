//! The request side of a request/reply socket.
//!
//! One `RequestSocket` wraps a single persistent connection and can be
//! reused for many request/reply exchanges — `beach-handle`'s virtual
//! handle pools these the way `actor.py`'s `ActorHandle` pools idle ZeroMQ
//! REQ sockets rather than reconnecting per call.

use std::time::Duration;

use serde_json::Value;
use tokio::net::{TcpStream, UnixStream};

use crate::address::Address;
use crate::connection::JsonConnection;
use crate::error::TransportError;

enum Stream {
    Tcp(JsonConnection<TcpStream>),
    Unix(JsonConnection<UnixStream>),
}

/// A connected request socket.
pub struct RequestSocket {
    stream: Stream,
    poisoned: bool,
}

impl RequestSocket {
    pub async fn connect(address: Address) -> Result<Self, TransportError> {
        let stream = match address {
            Address::Tcp(addr) => Stream::Tcp(JsonConnection::new(TcpStream::connect(addr).await?)),
            Address::Unix(path) => {
                Stream::Unix(JsonConnection::new(UnixStream::connect(path).await?))
            }
        };
        Ok(Self { stream, poisoned: false })
    }

    /// Send `request` and wait up to `timeout` for a reply.
    ///
    /// A socket that times out, finds its peer gone, or otherwise fails is
    /// marked poisoned: the peer may still write a stale reply into it
    /// later, so it must be dropped rather than reused. `request` can't
    /// consume `self` on the error path the way a non-pooled caller would
    /// want, since pooled callers (`beach-handle`'s `VirtualHandle`) hold
    /// the socket by `&mut` across retries — `is_poisoned` is the check a
    /// pool owner makes instead, before deciding whether to return the
    /// socket to its pool.
    pub async fn request(&mut self, request: Value, timeout: Duration) -> Result<Value, TransportError> {
        if let Err(err) = self.send(&request).await {
            self.poisoned = true;
            return Err(err);
        }
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(Ok(Some(value))) => Ok(value),
            Ok(Ok(None)) => {
                self.poisoned = true;
                Err(TransportError::ConnectionClosed)
            }
            Ok(Err(err)) => {
                self.poisoned = true;
                Err(err)
            }
            Err(_) => {
                self.poisoned = true;
                Err(TransportError::Timeout)
            }
        }
    }

    /// True once a prior `request` call has failed on this socket. Pool
    /// owners must check this before returning the socket to a pool.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    async fn send(&mut self, value: &Value) -> Result<(), TransportError> {
        match &mut self.stream {
            Stream::Tcp(conn) => conn.send(value).await,
            Stream::Unix(conn) => conn.send(value).await,
        }
    }

    async fn recv(&mut self) -> Result<Option<Value>, TransportError> {
        match &mut self.stream {
            Stream::Tcp(conn) => conn.recv().await,
            Stream::Unix(conn) => conn.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{Handler, ReplySocket};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Slow;

    #[async_trait]
    impl Handler for Slow {
        async fn handle(&self, _request: Value) -> Value {
            tokio::time::sleep(Duration::from_millis(200)).await;
            serde_json::json!({"status": "ok"})
        }
    }

    #[tokio::test]
    async fn request_times_out_against_a_slow_peer() {
        let socket = ReplySocket::bind(Address::Tcp("127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(socket.serve(Arc::new(Slow)));

        let mut client = RequestSocket::connect(addr).await.unwrap();
        let result = client
            .request(serde_json::json!({"req": "slow"}), Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(TransportError::Timeout)));
    }
}
