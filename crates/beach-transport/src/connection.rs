//! A single length-delimited, JSON-framed duplex connection.
//!
//! Wraps any `AsyncRead + AsyncWrite` stream (a TCP or Unix socket) in
//! `tokio_util`'s `LengthDelimitedCodec` and layers `serde_json::Value`
//! encode/decode on top, so callers exchange values rather than bytes.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::TransportError;

/// A framed connection carrying JSON values in both directions.
pub struct JsonConnection<S> {
    framed: Framed<S, LengthDelimitedCodec>,
}

impl<S> JsonConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Send one JSON value as a length-prefixed frame.
    pub async fn send(&mut self, value: &Value) -> Result<(), TransportError> {
        let bytes = serde_json::to_vec(value)?;
        self.framed.send(bytes.into()).await?;
        Ok(())
    }

    /// Receive one JSON value, or `Ok(None)` if the peer closed cleanly.
    pub async fn recv(&mut self) -> Result<Option<Value>, TransportError> {
        match self.framed.next().await {
            Some(frame) => {
                let bytes = frame?;
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn sends_and_receives_a_value() {
        let (client, server) = duplex(4096);
        let mut client = JsonConnection::new(client);
        let mut server = JsonConnection::new(server);

        client
            .send(&serde_json::json!({"req": "keepalive"}))
            .await
            .unwrap();
        let received = server.recv().await.unwrap().unwrap();
        assert_eq!(received["req"], "keepalive");
    }

    #[tokio::test]
    async fn recv_returns_none_on_clean_close() {
        let (client, server) = duplex(4096);
        drop(client);
        let mut server = JsonConnection::new(server);
        assert!(server.recv().await.unwrap().is_none());
    }
}
