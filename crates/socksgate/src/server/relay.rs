//! Bidirectional relay between the client and the upstream.
//!
//! After handoff the relay is the exclusive owner of both sockets; the
//! protocol machinery never sees them again. The relay has no protocol
//! awareness: it replays whatever the client sent before the upstream
//! existed, then splices bytes until either side closes.

use bytes::Bytes;
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Why a relay ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client closed its side.
    ClientClosed,
    /// The upstream closed its side.
    UpstreamClosed,
    /// Read or write on the client side failed.
    ClientError(String),
    /// Read or write on the upstream side failed.
    UpstreamError(String),
}

/// Two glued sockets plus the bytes the client sent before gluing began.
///
/// Returning from [`RelayPair::run`] drops all four stream halves, so both
/// sockets close together no matter which side ended the pair.
pub struct RelayPair<C, U> {
    client: C,
    upstream: U,
    pending: Vec<Bytes>,
}

impl<C, U> RelayPair<C, U>
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    U: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(client: C, upstream: U, pending: Vec<Bytes>) -> Self {
        Self {
            client,
            upstream,
            pending,
        }
    }

    /// Replay the pending bytes to the upstream in receipt order, then relay
    /// both directions until either side closes or errors.
    pub async fn run(self) -> DisconnectReason {
        let RelayPair {
            client,
            upstream,
            pending,
        } = self;
        let (client_read, client_write) = split(client);
        let (upstream_read, mut upstream_write) = split(upstream);

        for chunk in &pending {
            trace!("replaying {} buffered bytes to upstream", chunk.len());
            if let Err(e) = upstream_write.write_all(chunk).await {
                warn!("Error replaying buffered bytes to upstream: {}", e);
                return DisconnectReason::UpstreamError(e.to_string());
            }
        }
        if let Err(e) = upstream_write.flush().await {
            warn!("Error flushing buffered bytes to upstream: {}", e);
            return DisconnectReason::UpstreamError(e.to_string());
        }

        relay_loop(client_read, client_write, upstream_read, upstream_write).await
    }
}

/// Copy both directions until either side ends the pair.
async fn relay_loop<CR, CW, UR, UW>(
    mut client_read: CR,
    mut client_write: CW,
    mut upstream_read: UR,
    mut upstream_write: UW,
) -> DisconnectReason
where
    CR: AsyncRead + Unpin,
    CW: AsyncWrite + Unpin,
    UR: AsyncRead + Unpin,
    UW: AsyncWrite + Unpin,
{
    let mut client_buf = vec![0u8; 8192];
    let mut upstream_buf = vec![0u8; 8192];

    loop {
        tokio::select! {
            result = client_read.read(&mut client_buf) => {
                match result {
                    Ok(0) => {
                        debug!("Client EOF");
                        let _ = upstream_write.shutdown().await;
                        return DisconnectReason::ClientClosed;
                    }
                    Ok(n) => {
                        trace!("client->upstream: {} bytes", n);
                        if let Err(e) = upstream_write.write_all(&client_buf[..n]).await {
                            warn!("Error writing to upstream: {}", e);
                            return DisconnectReason::UpstreamError(e.to_string());
                        }
                        if let Err(e) = upstream_write.flush().await {
                            warn!("Error flushing to upstream: {}", e);
                            return DisconnectReason::UpstreamError(e.to_string());
                        }
                    }
                    Err(e) => {
                        warn!("Error reading from client: {}", e);
                        return DisconnectReason::ClientError(e.to_string());
                    }
                }
            }

            result = upstream_read.read(&mut upstream_buf) => {
                match result {
                    Ok(0) => {
                        debug!("Upstream EOF");
                        let _ = client_write.shutdown().await;
                        return DisconnectReason::UpstreamClosed;
                    }
                    Ok(n) => {
                        trace!("upstream->client: {} bytes", n);
                        if let Err(e) = client_write.write_all(&upstream_buf[..n]).await {
                            warn!("Error writing to client: {}", e);
                            return DisconnectReason::ClientError(e.to_string());
                        }
                        if let Err(e) = client_write.flush().await {
                            warn!("Error flushing to client: {}", e);
                            return DisconnectReason::ClientError(e.to_string());
                        }
                    }
                    Err(e) => {
                        warn!("Error reading from upstream: {}", e);
                        return DisconnectReason::UpstreamError(e.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_pending_bytes_reach_upstream_first() {
        let (client, mut client_peer) = duplex(256);
        let (upstream, mut upstream_peer) = duplex(256);

        let pending = vec![Bytes::from_static(b"GE"), Bytes::from_static(b"T")];
        let relay = tokio::spawn(RelayPair::new(client, upstream, pending).run());

        // More client bytes once the relay is already running.
        client_peer.write_all(b" /index").await.unwrap();

        let mut buf = vec![0u8; 10];
        upstream_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"GET /index");

        drop(client_peer);
        assert_eq!(relay.await.unwrap(), DisconnectReason::ClientClosed);
    }

    #[tokio::test]
    async fn test_client_close_tears_down_upstream() {
        let (client, client_peer) = duplex(256);
        let (upstream, mut upstream_peer) = duplex(256);

        let relay = tokio::spawn(RelayPair::new(client, upstream, Vec::new()).run());

        drop(client_peer);
        assert_eq!(relay.await.unwrap(), DisconnectReason::ClientClosed);

        // The upstream's peer sees EOF once the relay drops its half.
        let mut buf = [0u8; 1];
        assert_eq!(upstream_peer.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upstream_close_tears_down_client() {
        let (client, mut client_peer) = duplex(256);
        let (upstream, upstream_peer) = duplex(256);

        let relay = tokio::spawn(RelayPair::new(client, upstream, Vec::new()).run());

        drop(upstream_peer);
        assert_eq!(relay.await.unwrap(), DisconnectReason::UpstreamClosed);

        let mut buf = [0u8; 1];
        assert_eq!(client_peer.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_relay_both_directions() {
        let (client, mut client_peer) = duplex(256);
        let (upstream, mut upstream_peer) = duplex(256);

        let relay = tokio::spawn(RelayPair::new(client, upstream, Vec::new()).run());

        client_peer.write_all(b"ping").await.unwrap();
        let mut buf = vec![0u8; 4];
        upstream_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        upstream_peer.write_all(b"pong").await.unwrap();
        client_peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(upstream_peer);
        assert_eq!(relay.await.unwrap(), DisconnectReason::UpstreamClosed);
    }

    #[tokio::test]
    async fn test_data_before_close_is_delivered() {
        let (client, mut client_peer) = duplex(256);
        let (upstream, mut upstream_peer) = duplex(256);

        let relay = tokio::spawn(RelayPair::new(client, upstream, Vec::new()).run());

        // Write then immediately close; the bytes must still arrive.
        client_peer.write_all(b"last words").await.unwrap();
        client_peer.shutdown().await.unwrap();

        let mut buf = Vec::new();
        upstream_peer.read_to_end(&mut buf).await.unwrap();
        assert_eq!(&buf, b"last words");

        assert_eq!(relay.await.unwrap(), DisconnectReason::ClientClosed);
    }
}
