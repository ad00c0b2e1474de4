//! Per-connection protocol state machine.
//!
//! Sequences method negotiation, request parsing and the upstream dial into
//! one linear protocol, buffering any bytes that arrive while the dial is in
//! flight. The machine performs no I/O: it consumes [`Input`]s and emits
//! [`Action`]s for the caller to perform, so every transition can be tested
//! without a socket.
//!
//! Each connection moves through the states strictly once. Once the CONNECT
//! request has been accepted, inbound bytes are never parsed again: from that
//! point the stream may carry arbitrary bytes of the tunneled protocol, which
//! are queued verbatim until the relay takes over.

use bytes::{Buf, Bytes, BytesMut};
use log::{debug, error};

use crate::error::ProtocolError;
use crate::negotiation::{self, AuthMethod, Negotiator};
use crate::reply::{self, ReplyCode};
use crate::request::{Command, ConnectRequest};

/// Protocol phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Awaiting the method-selection message.
    Idle,
    /// A method other than NoAuth was selected. Its sub-negotiation is not
    /// implemented; any client bytes here close the connection.
    AwaitingAuthentication(AuthMethod),
    /// Awaiting the connection request.
    AwaitingRequest,
    /// Upstream dial in flight; inbound bytes are queued, not parsed.
    Connecting,
    /// Dial succeeded and the success reply was emitted; the machine only
    /// queues bytes until the caller retires it into the relay.
    Relaying,
    /// Terminal failure; the connection is closed.
    Failed,
}

/// One connection-scoped occurrence fed to the machine.
#[derive(Debug)]
pub enum Input {
    /// Raw bytes read from the inbound socket.
    Bytes(Bytes),
    /// The inbound socket closed or failed.
    Eof,
    /// The upstream dial resolved successfully.
    DialSucceeded,
    /// The upstream dial failed, classified for the reply.
    DialFailed(ReplyCode),
}

/// A side effect the caller must perform, in order.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Write these bytes to the inbound socket.
    Reply(Bytes),
    /// Open an outbound TCP connection to the destination.
    Dial { host: String, port: u16 },
    /// Move both sockets into the relay; call
    /// [`ConnectionStateMachine::retire`] for the queued bytes.
    Handoff,
    /// Close the inbound socket, dropping the outbound one and any dial
    /// still in flight.
    Close,
}

/// The per-connection protocol state machine.
pub struct ConnectionStateMachine {
    state: State,
    negotiator: Negotiator,
    /// Unparsed handshake bytes; fragments accumulate here until a full
    /// message is available.
    buf: BytesMut,
    /// Chunks received after the request was accepted, in receipt order,
    /// awaiting delivery to the upstream socket.
    pending: Vec<Bytes>,
    /// Destination port of the accepted request, echoed in the reply.
    dest_port: u16,
}

impl ConnectionStateMachine {
    pub fn new(negotiator: Negotiator) -> Self {
        ConnectionStateMachine {
            state: State::Idle,
            negotiator,
            buf: BytesMut::new(),
            pending: Vec::new(),
            dest_port: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Advance the machine with one input, returning the actions the caller
    /// must perform, in order.
    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        match (self.state, input) {
            // Terminal: the connection is already closed, ignore stragglers.
            (State::Failed, _) => Vec::new(),

            (State::Idle, Input::Bytes(chunk)) => self.on_negotiation_bytes(chunk),

            (State::AwaitingAuthentication(method), Input::Bytes(_)) => {
                error!(
                    "received bytes for unimplemented {:?} sub-negotiation, closing",
                    method
                );
                self.fail()
            }

            (State::AwaitingRequest, Input::Bytes(chunk)) => self.on_request_bytes(chunk),

            // The stream now carries tunneled bytes; queue them untouched.
            (State::Connecting, Input::Bytes(chunk)) | (State::Relaying, Input::Bytes(chunk)) => {
                self.pending.push(chunk);
                Vec::new()
            }

            (State::Connecting, Input::DialSucceeded) => {
                self.state = State::Relaying;
                let reply = reply::success_reply(self.dest_port);
                vec![
                    Action::Reply(Bytes::copy_from_slice(&reply)),
                    Action::Handoff,
                ]
            }

            (State::Connecting, Input::DialFailed(code)) => {
                self.pending.clear();
                self.state = State::Failed;
                let reply = reply::failure_reply(code);
                vec![Action::Reply(Bytes::copy_from_slice(&reply)), Action::Close]
            }

            // A dial result in any other state is a logic error; be careful
            // and just shut the connection.
            (_, Input::DialSucceeded) | (_, Input::DialFailed(_)) => self.fail(),

            (_, Input::Eof) => {
                if !self.buf.is_empty() {
                    error!("connection closed mid-message");
                }
                self.fail()
            }
        }
    }

    /// Retire the machine at handoff, yielding the queued chunks in receipt
    /// order for delivery to the upstream socket. Valid once, after
    /// [`Action::Handoff`].
    pub fn retire(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.pending)
    }

    fn on_negotiation_bytes(&mut self, chunk: Bytes) -> Vec<Action> {
        self.buf.extend_from_slice(&chunk);
        let (offered, consumed) = match negotiation::decode_methods(&self.buf) {
            Ok(decoded) => decoded,
            Err(e) if e.is_truncated() => return Vec::new(),
            Err(e) => {
                error!("method negotiation rejected: {}", e);
                return self.fail();
            }
        };
        self.buf.advance(consumed);

        let method = self.negotiator.select(&offered);
        debug!("selected authentication method {:?}", method);
        let mut actions = vec![Action::Reply(Bytes::copy_from_slice(
            &negotiation::selection_reply(method),
        ))];
        match method {
            AuthMethod::NoAuth => {
                self.state = State::AwaitingRequest;
                // The request may have arrived coalesced with negotiation.
                if !self.buf.is_empty() {
                    let rest = self.buf.split().freeze();
                    actions.extend(self.on_request_bytes(rest));
                }
            }
            AuthMethod::NoAcceptable => {
                self.state = State::Failed;
                self.buf.clear();
                actions.push(Action::Close);
            }
            other => {
                self.state = State::AwaitingAuthentication(other);
                if !self.buf.is_empty() {
                    error!(
                        "received bytes for unimplemented {:?} sub-negotiation, closing",
                        other
                    );
                    self.state = State::Failed;
                    self.buf.clear();
                    actions.push(Action::Close);
                }
            }
        }
        actions
    }

    fn on_request_bytes(&mut self, chunk: Bytes) -> Vec<Action> {
        self.buf.extend_from_slice(&chunk);
        let (request, consumed) = match ConnectRequest::decode(&self.buf) {
            Ok(decoded) => decoded,
            Err(e) if e.is_truncated() => return Vec::new(),
            Err(e) => {
                error!("connect request rejected: {}", e);
                return self.fail();
            }
        };
        self.buf.advance(consumed);

        if request.command != Command::Connect {
            error!(
                "connect request rejected: {}",
                ProtocolError::UnsupportedCommand(request.command)
            );
            return self.fail();
        }

        // Anything past the request already belongs to the tunneled stream.
        if !self.buf.is_empty() {
            self.pending.push(self.buf.split().freeze());
        }
        self.dest_port = request.port;
        self.state = State::Connecting;
        vec![Action::Dial {
            host: request.addr.host(),
            port: request.port,
        }]
    }

    fn fail(&mut self) -> Vec<Action> {
        self.state = State::Failed;
        self.buf.clear();
        self.pending.clear();
        vec![Action::Close]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> ConnectionStateMachine {
        ConnectionStateMachine::new(Negotiator::new(vec![AuthMethod::NoAuth]))
    }

    fn bytes(data: &[u8]) -> Input {
        Input::Bytes(Bytes::copy_from_slice(data))
    }

    /// A CONNECT request for domain "localhost", port 443.
    fn localhost_request() -> Vec<u8> {
        let mut req = vec![0x05, 0x01, 0x00, 0x03, 0x09];
        req.extend_from_slice(b"localhost");
        req.extend_from_slice(&[0x01, 0xBB]);
        req
    }

    fn negotiate(m: &mut ConnectionStateMachine) {
        let actions = m.handle(bytes(&[0x05, 0x01, 0x00]));
        assert_eq!(
            actions,
            vec![Action::Reply(Bytes::from_static(&[0x05, 0x00]))]
        );
        assert_eq!(m.state(), State::AwaitingRequest);
    }

    #[test]
    fn test_negotiation_selects_no_auth() {
        let mut m = machine();
        negotiate(&mut m);
    }

    #[test]
    fn test_negotiation_byte_at_a_time() {
        let mut m = machine();
        assert!(m.handle(bytes(&[0x05])).is_empty());
        assert!(m.handle(bytes(&[0x01])).is_empty());
        let actions = m.handle(bytes(&[0x00]));
        assert_eq!(
            actions,
            vec![Action::Reply(Bytes::from_static(&[0x05, 0x00]))]
        );
        assert_eq!(m.state(), State::AwaitingRequest);
    }

    #[test]
    fn test_negotiation_no_acceptable_method() {
        let mut m = machine();
        let actions = m.handle(bytes(&[0x05, 0x02, 0x01, 0x02]));
        assert_eq!(
            actions,
            vec![
                Action::Reply(Bytes::from_static(&[0x05, 0xFF])),
                Action::Close,
            ]
        );
        assert_eq!(m.state(), State::Failed);
    }

    #[test]
    fn test_negotiation_zero_methods_closes_without_reply() {
        let mut m = machine();
        assert_eq!(m.handle(bytes(&[0x05, 0x00])), vec![Action::Close]);
        assert_eq!(m.state(), State::Failed);
    }

    #[test]
    fn test_negotiation_bad_version_closes_without_reply() {
        let mut m = machine();
        assert_eq!(m.handle(bytes(&[0x04, 0x01, 0x00])), vec![Action::Close]);
        assert_eq!(m.state(), State::Failed);
    }

    #[test]
    fn test_request_triggers_dial() {
        let mut m = machine();
        negotiate(&mut m);
        let actions = m.handle(bytes(&localhost_request()));
        assert_eq!(
            actions,
            vec![Action::Dial {
                host: "localhost".to_string(),
                port: 443,
            }]
        );
        assert_eq!(m.state(), State::Connecting);
    }

    #[test]
    fn test_pending_bytes_ordered_across_dial() {
        // Negotiation, then the request, then "GET" before the dial
        // resolves: those bytes must come out of retire() first, intact.
        let mut m = machine();
        negotiate(&mut m);
        m.handle(bytes(&localhost_request()));
        assert!(m.handle(bytes(b"GE")).is_empty());
        assert!(m.handle(bytes(b"T")).is_empty());

        let actions = m.handle(Input::DialSucceeded);
        assert_eq!(actions.len(), 2);
        match &actions[0] {
            Action::Reply(reply) => {
                assert_eq!(reply[0], 0x05);
                assert_eq!(reply[1], 0x00);
                assert_eq!(&reply[4..8], &[127, 0, 0, 1]);
                assert_eq!(u16::from_be_bytes([reply[8], reply[9]]), 443);
            }
            other => panic!("expected success reply, got {:?}", other),
        }
        assert_eq!(actions[1], Action::Handoff);
        assert_eq!(m.state(), State::Relaying);

        let pending = m.retire();
        assert_eq!(pending, vec![Bytes::from_static(b"GE"), Bytes::from_static(b"T")]);
    }

    #[test]
    fn test_coalesced_negotiation_request_and_early_bytes() {
        // Everything in a single read: negotiation, request, then 3 bytes of
        // the tunneled protocol.
        let mut m = machine();
        let mut input = vec![0x05, 0x01, 0x00];
        input.extend_from_slice(&localhost_request());
        input.extend_from_slice(b"GET");
        let actions = m.handle(bytes(&input));
        assert_eq!(
            actions,
            vec![
                Action::Reply(Bytes::from_static(&[0x05, 0x00])),
                Action::Dial {
                    host: "localhost".to_string(),
                    port: 443,
                },
            ]
        );
        assert_eq!(m.state(), State::Connecting);

        m.handle(Input::DialSucceeded);
        assert_eq!(m.retire(), vec![Bytes::from_static(b"GET")]);
    }

    #[test]
    fn test_bytes_while_relaying_are_queued() {
        let mut m = machine();
        negotiate(&mut m);
        m.handle(bytes(&localhost_request()));
        m.handle(Input::DialSucceeded);
        assert_eq!(m.state(), State::Relaying);
        assert!(m.handle(bytes(b"more")).is_empty());
        assert_eq!(m.retire(), vec![Bytes::from_static(b"more")]);
    }

    #[test]
    fn test_dial_failure_replies_and_closes() {
        let mut m = machine();
        negotiate(&mut m);
        m.handle(bytes(&localhost_request()));
        m.handle(bytes(b"GET"));
        let actions = m.handle(Input::DialFailed(ReplyCode::ConnectionRefused));
        assert_eq!(
            actions,
            vec![
                Action::Reply(Bytes::copy_from_slice(&reply::failure_reply(
                    ReplyCode::ConnectionRefused,
                ))),
                Action::Close,
            ]
        );
        assert_eq!(m.state(), State::Failed);
        // Queued bytes are released, not delivered anywhere.
        assert!(m.retire().is_empty());
    }

    #[test]
    fn test_bind_closes_without_reply() {
        let mut m = machine();
        negotiate(&mut m);
        let buf = [0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50];
        assert_eq!(m.handle(bytes(&buf)), vec![Action::Close]);
        assert_eq!(m.state(), State::Failed);
    }

    #[test]
    fn test_associate_closes_without_reply() {
        let mut m = machine();
        negotiate(&mut m);
        let buf = [0x05, 0x03, 0x00, 0x01, 127, 0, 0, 1, 0x00, 0x50];
        assert_eq!(m.handle(bytes(&buf)), vec![Action::Close]);
    }

    #[test]
    fn test_ipv6_request_closes_without_reply() {
        let mut m = machine();
        negotiate(&mut m);
        let mut buf = vec![0x05, 0x01, 0x00, 0x04];
        buf.extend_from_slice(&[0u8; 18]);
        assert_eq!(m.handle(bytes(&buf)), vec![Action::Close]);
        assert_eq!(m.state(), State::Failed);
    }

    #[test]
    fn test_unknown_atyp_closes_without_reply() {
        let mut m = machine();
        negotiate(&mut m);
        let buf = [0x05, 0x01, 0x00, 0x07, 1, 2, 3, 4, 0x00, 0x50];
        assert_eq!(m.handle(bytes(&buf)), vec![Action::Close]);
    }

    #[test]
    fn test_fragmented_request() {
        let mut m = machine();
        negotiate(&mut m);
        let req = localhost_request();
        assert!(m.handle(bytes(&req[..6])).is_empty());
        assert_eq!(m.state(), State::AwaitingRequest);
        let actions = m.handle(bytes(&req[6..]));
        assert_eq!(
            actions,
            vec![Action::Dial {
                host: "localhost".to_string(),
                port: 443,
            }]
        );
    }

    #[test]
    fn test_eof_mid_message_closes() {
        let mut m = machine();
        assert!(m.handle(bytes(&[0x05])).is_empty());
        assert_eq!(m.handle(Input::Eof), vec![Action::Close]);
        assert_eq!(m.state(), State::Failed);
    }

    #[test]
    fn test_eof_while_connecting_abandons_dial() {
        let mut m = machine();
        negotiate(&mut m);
        m.handle(bytes(&localhost_request()));
        m.handle(bytes(b"GET"));
        assert_eq!(m.handle(Input::Eof), vec![Action::Close]);
        assert_eq!(m.state(), State::Failed);
        assert!(m.retire().is_empty());
        // A dial result arriving after the failure is discarded.
        assert!(m.handle(Input::DialSucceeded).is_empty());
    }

    #[test]
    fn test_configured_method_without_subnegotiation_fails_loudly() {
        let negotiator =
            Negotiator::new(vec![AuthMethod::UsernamePassword, AuthMethod::NoAuth]);
        let mut m = ConnectionStateMachine::new(negotiator);
        let actions = m.handle(bytes(&[0x05, 0x01, 0x02]));
        assert_eq!(
            actions,
            vec![Action::Reply(Bytes::from_static(&[0x05, 0x02]))]
        );
        assert_eq!(
            m.state(),
            State::AwaitingAuthentication(AuthMethod::UsernamePassword)
        );
        // The sub-negotiation is not implemented: the next bytes close the
        // connection instead of leaving it hanging.
        assert_eq!(m.handle(bytes(&[0x01, 0x00])), vec![Action::Close]);
        assert_eq!(m.state(), State::Failed);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut m = machine();
        m.handle(bytes(&[0x04, 0x01, 0x00]));
        assert_eq!(m.state(), State::Failed);
        assert!(m.handle(bytes(b"anything")).is_empty());
        assert!(m.handle(Input::Eof).is_empty());
        assert!(m.handle(Input::DialFailed(ReplyCode::GeneralFailure)).is_empty());
    }
}
