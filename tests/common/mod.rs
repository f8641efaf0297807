//! Shared test doubles: a transport that records what the client sends and
//! replays queued events.

#![allow(dead_code)]

use std::collections::VecDeque;

use cobalt_stomp::{Transport, TransportEvent};

/// Parameters of one `Transport::open` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCall {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub secure: bool,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    pub opened: Vec<OpenCall>,
    pub sent: Vec<Vec<u8>>,
    pub events: VecDeque<TransportEvent>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the next `poll`.
    pub fn push(&mut self, event: TransportEvent) {
        self.events.push_back(event);
    }

    /// Queue a text event.
    pub fn push_text(&mut self, text: &str) {
        self.events.push_back(TransportEvent::Text(text.to_string()));
    }

    /// Everything sent so far, as text with the trailing NUL removed.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|p| {
                let bytes = p.strip_suffix(&[0u8]).unwrap_or(p);
                String::from_utf8(bytes.to_vec()).expect("client sent invalid utf8")
            })
            .collect()
    }

    /// Text of the most recent payload.
    pub fn last_text(&self) -> String {
        self.sent_texts().pop().expect("nothing sent")
    }

    /// Commands of every payload sent, in order. Heartbeats show up as "".
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent_texts()
            .iter()
            .map(|t| t.split('\n').next().unwrap_or("").to_string())
            .collect()
    }
}

impl Transport for MockTransport {
    fn open(&mut self, host: &str, port: u16, path: &str, secure: bool) {
        self.opened.push(OpenCall {
            host: host.to_string(),
            port,
            path: path.to_string(),
            secure,
        });
    }

    fn send(&mut self, payload: &[u8]) {
        self.sent.push(payload.to_vec());
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }
}
