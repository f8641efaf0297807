//! The byte-stream collaborator the client talks through.
//!
//! A [`Transport`] opens the underlying connection, accepts outgoing
//! payloads and reports what happened on the wire as [`TransportEvent`]s.
//! The client never blocks on it: `send` only enqueues and `poll` only
//! returns events that are already available.

use rand::Rng;

pub mod tcp;

pub use tcp::TcpTransport;

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The underlying connection is up.
    Connected,
    /// The underlying connection is gone. No reason is reported.
    Disconnected,
    /// One received text message (a whole STOMP frame for stream
    /// transports, or one WebSocket text message).
    Text(String),
}

/// Bidirectional, event-reporting byte transport.
pub trait Transport {
    /// Start connecting to `host:port`. `path` is the resource to request on
    /// transports that have one (WebSocket); `secure` asks for TLS.
    fn open(&mut self, host: &str, port: u16, path: &str, secure: bool);

    /// Queue `payload` for transmission. Fire-and-forget.
    fn send(&mut self, payload: &[u8]);

    /// Take the next pending event, if any.
    fn poll(&mut self) -> Option<TransportEvent>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, host: &str, port: u16, path: &str, secure: bool) {
        (**self).open(host, port, path, secure)
    }

    fn send(&mut self, payload: &[u8]) {
        (**self).send(payload)
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        (**self).poll()
    }
}

/// Build a SockJS WebSocket endpoint path from a base path.
///
/// SockJS expects `{base}{server-id}/{session-id}/websocket`; both ids are
/// random (`0..999` and `0..999999`).
pub fn sockjs_url<R: Rng + ?Sized>(base: &str, rng: &mut R) -> String {
    let server_id: u32 = rng.gen_range(0..999);
    let session_id: u32 = rng.gen_range(0..999_999);
    format!("{}{}/{}/websocket", base, server_id, session_id)
}
