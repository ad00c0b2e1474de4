//! Per-connection protocol driver.
//!
//! Owns the inbound socket and the protocol state machine until relay
//! handoff. The driver reads chunks and dial results, feeds them to the
//! machine, and performs the actions it emits; once the machine asks for
//! handoff, both sockets move into a [`RelayPair`] and the driver is done.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{span, Instrument, Level};

use socksgate_proto::{Action, ConnectionStateMachine, Input, Negotiator};

use super::relay::RelayPair;
use crate::dialer::{DialError, Dialer};
use crate::error::{ProxyError, Result};

type DialFuture = Pin<Box<dyn Future<Output = std::result::Result<TcpStream, DialError>> + Send>>;

/// A proxied client connection.
pub struct Connection {
    stream: TcpStream,
    client_addr: SocketAddr,
    machine: ConnectionStateMachine,
    dialer: Dialer,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        client_addr: SocketAddr,
        negotiator: Negotiator,
        dialer: Dialer,
    ) -> Self {
        Self {
            stream,
            client_addr,
            machine: ConnectionStateMachine::new(negotiator),
            dialer,
        }
    }

    /// Drive the connection to completion.
    pub async fn handle(self) -> Result<()> {
        let span = span!(target: "socksgate", Level::INFO, "connection", client = %self.client_addr);
        self.drive().instrument(span).await
    }

    async fn drive(mut self) -> Result<()> {
        debug!("New connection");

        // The dial is the only suspension point in the handshake path; it
        // runs concurrently with inbound reads so bytes arriving while it is
        // in flight still reach the machine.
        let mut dial_fut: Option<DialFuture> = None;
        let mut upstream: Option<TcpStream> = None;
        let mut read_buf = BytesMut::with_capacity(8192);

        loop {
            let input = tokio::select! {
                result = self.stream.read_buf(&mut read_buf) => {
                    match result {
                        Ok(0) => Input::Eof,
                        Ok(_) => Input::Bytes(read_buf.split().freeze()),
                        Err(e) => {
                            debug!("Client read error: {}", e);
                            Input::Eof
                        }
                    }
                }

                dialed = async {
                    match &mut dial_fut {
                        Some(fut) => fut.await,
                        None => std::future::pending().await,
                    }
                } => {
                    dial_fut = None;
                    match dialed {
                        Ok(stream) => {
                            upstream = Some(stream);
                            Input::DialSucceeded
                        }
                        Err(e) => {
                            warn!("Dial failed: {}", e);
                            Input::DialFailed(e.reply_code())
                        }
                    }
                }
            };

            for action in self.machine.handle(input) {
                match action {
                    Action::Reply(bytes) => {
                        self.stream.write_all(&bytes).await?;
                    }
                    Action::Dial { host, port } => {
                        info!("Connecting to {}:{}", host, port);
                        let dialer = self.dialer;
                        dial_fut = Some(Box::pin(async move {
                            dialer.dial(&host, port).await
                        }));
                    }
                    Action::Handoff => {
                        let upstream = upstream.take().ok_or_else(|| {
                            ProxyError::Connection("handoff without an upstream socket".into())
                        })?;
                        let pending = self.machine.retire();
                        debug!("Handing off to relay");
                        let reason = RelayPair::new(self.stream, upstream, pending).run().await;
                        debug!("Relay ended: {:?}", reason);
                        return Ok(());
                    }
                    Action::Close => {
                        debug!("Closing connection");
                        return Ok(());
                    }
                }
            }
        }
    }
}
