use tracing::{debug, trace};

use crate::codec::{self, HEARTBEAT};
use crate::error::ClientError;
use crate::frame::{Frame, ServerCommand};
use crate::headers::Headers;
use crate::heartbeat::{Clock, DEFAULT_HEARTBEAT_MS, HeartbeatManager, SystemClock};
use crate::subscription::{
    AckDirective, AckMode, DEFAULT_MAX_SUBSCRIPTIONS, MessageHandler, SubscriptionRegistry,
    wire_id,
};
use crate::transport::{Transport, TransportEvent, sockjs_url};

/// Callback invoked for connect, disconnect, receipt and error events.
pub type StateHandler = Box<dyn FnMut(&Frame)>;

/// Lifecycle of a STOMP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// CONNECT sent, waiting for CONNECTED.
    Opening,
    Connected,
    /// DISCONNECT sent, waiting for its RECEIPT.
    Disconnecting,
}

/// Where and how to connect.
///
/// Built with `ConnectOptions::new` (or `Default`) and the `with_*` helpers:
///
/// ```ignore
/// let options = ConnectOptions::new("broker.local", 15674, "/stomp/")
///     .with_sockjs(true)
///     .with_login("sensor-17")
///     .with_max_subscriptions(4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    /// Resource path passed to the transport; the SockJS base path in SockJS
    /// mode.
    pub path: String,
    /// Treat incoming text as SockJS framed (`o`, `h`, `a[...]`).
    pub sockjs: bool,
    /// Sent as the `login` header of CONNECT when set.
    pub login: Option<String>,
    /// Shortest interval the client is willing to heartbeat at, in ms.
    pub heartbeat_ms: u64,
    /// Size of the fixed subscription table.
    pub max_subscriptions: usize,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_sockjs(mut self, sockjs: bool) -> Self {
        self.sockjs = sockjs;
        self
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn with_heartbeat_ms(mut self, heartbeat_ms: u64) -> Self {
        self.heartbeat_ms = heartbeat_ms;
        self
    }

    pub fn with_max_subscriptions(mut self, max_subscriptions: usize) -> Self {
        self.max_subscriptions = max_subscriptions;
        self
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 61613,
            path: "/".to_string(),
            sockjs: false,
            login: None,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
        }
    }
}

/// Cooperative STOMP client.
///
/// The client has two entry points, both taking `&mut self`:
/// - [`StompClient::tick`], called repeatedly by the host loop. It drains
///   events from the transport and sends a heartbeat when one is due.
/// - [`StompClient::handle_event`], for hosts whose transport pushes events
///   instead of queueing them for `poll`.
///
/// Nothing blocks and nothing runs on another thread: handlers run inline,
/// inside whichever of the two calls delivered the frame.
pub struct StompClient<T, C = SystemClock> {
    transport: T,
    clock: C,
    options: ConnectOptions,
    state: ConnectionState,
    subscriptions: SubscriptionRegistry,
    heartbeat: HeartbeatManager,
    command_count: u32,
    sockjs_heartbeats: u32,
    connect_handler: Option<StateHandler>,
    disconnect_handler: Option<StateHandler>,
    receipt_handler: Option<StateHandler>,
    error_handler: Option<StateHandler>,
}

impl<T: Transport> StompClient<T, SystemClock> {
    pub fn new(transport: T, options: ConnectOptions) -> Self {
        Self::with_clock(transport, SystemClock::new(), options)
    }
}

impl<T: Transport, C: Clock> StompClient<T, C> {
    pub fn with_clock(transport: T, clock: C, options: ConnectOptions) -> Self {
        let heartbeat = HeartbeatManager::new(options.heartbeat_ms, clock.now_ms());
        let subscriptions = SubscriptionRegistry::new(options.max_subscriptions);
        Self {
            transport,
            clock,
            options,
            state: ConnectionState::Disconnected,
            subscriptions,
            heartbeat,
            command_count: 0,
            sockjs_heartbeats: 0,
            connect_handler: None,
            disconnect_handler: None,
            receipt_handler: None,
            error_handler: None,
        }
    }

    /// Ask the transport to open a plain connection. The STOMP handshake
    /// starts once the transport reports `Connected`.
    pub fn begin(&mut self) {
        self.open(false);
    }

    /// Like [`StompClient::begin`], over TLS.
    pub fn begin_secure(&mut self) {
        self.open(true);
    }

    fn open(&mut self, secure: bool) {
        let path = if self.options.sockjs {
            sockjs_url(&self.options.path, &mut rand::thread_rng())
        } else {
            self.options.path.clone()
        };
        debug!(host = %self.options.host, port = self.options.port, %path, secure, "opening transport");
        self.transport
            .open(&self.options.host, self.options.port, &path, secure);
    }

    /// One cooperative step: process every event the transport has ready,
    /// then send a heartbeat if the negotiated interval has elapsed.
    pub fn tick(&mut self) {
        while let Some(event) = self.transport.poll() {
            self.handle_event(event);
        }

        let now = self.clock.now_ms();
        if self.heartbeat.is_due(now) {
            trace!("sending heartbeat");
            self.transport.send(HEARTBEAT);
            self.record_sent(now);
        }
    }

    /// Feed one transport event into the state machine.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.connect_stomp(),
            TransportEvent::Disconnected => {
                debug!(state = ?self.state, "transport disconnected");
                self.enter_disconnected();
            }
            TransportEvent::Text(text) => {
                if self.options.sockjs {
                    self.handle_sockjs(&text);
                } else {
                    self.handle_frame(codec::decode(&text));
                }
            }
        }
    }

    fn handle_sockjs(&mut self, text: &str) {
        match text.chars().next() {
            Some('h') => self.sockjs_heartbeats = self.sockjs_heartbeats.wrapping_add(1),
            Some('o') => self.connect_stomp(),
            Some('a') => {
                for frame in codec::unwrap_sockjs(&text[1..]) {
                    self.handle_frame(codec::decode(&frame));
                }
            }
            _ => trace!(text, "ignoring SockJS frame"),
        }
    }

    fn connect_stomp(&mut self) {
        if self.state == ConnectionState::Opening {
            trace!("CONNECT already sent");
            return;
        }
        self.state = ConnectionState::Opening;

        let mut lines = vec![
            "accept-version:1.1,1.0".to_string(),
            format!("heart-beat:{},0", self.heartbeat.preferred_ms()),
        ];
        if let Some(login) = &self.options.login {
            lines.push(format!("login:{}", login));
        }
        debug!("sending CONNECT");
        self.transmit(&codec::encode_lines("CONNECT", &lines[..], None));
    }

    fn handle_frame(&mut self, frame: Frame) {
        let Some(command) = ServerCommand::parse(&frame.command) else {
            trace!(command = %frame.command, "discarding unsupported frame");
            return;
        };
        trace!(command = command.as_str(), state = ?self.state, "received frame");
        match command {
            ServerCommand::Connected => self.handle_connected(&frame),
            ServerCommand::Message => self.handle_message(&frame),
            ServerCommand::Receipt => self.handle_receipt(&frame),
            ServerCommand::Error => self.handle_error(&frame),
        }
    }

    fn handle_connected(&mut self, frame: &Frame) {
        if self.state == ConnectionState::Connected {
            trace!("ignoring CONNECTED while already connected");
            return;
        }
        self.state = ConnectionState::Connected;
        self.heartbeat.negotiate(frame.headers.find("heart-beat"));
        debug!(interval_ms = self.heartbeat.interval_ms(), "STOMP session connected");
        if let Some(handler) = self.connect_handler.as_mut() {
            handler(frame);
        }
    }

    fn handle_message(&mut self, frame: &Frame) {
        match self.subscriptions.dispatch(frame) {
            Some(AckDirective::Ack) => self.ack(frame),
            Some(AckDirective::Nack) => self.nack(frame),
            Some(AckDirective::Continue) | None => {}
        }
    }

    fn handle_receipt(&mut self, frame: &Frame) {
        if let Some(handler) = self.receipt_handler.as_mut() {
            handler(frame);
        }
        if self.state == ConnectionState::Disconnecting {
            debug!(receipt = frame.get_header("receipt-id"), "disconnect confirmed");
            self.enter_disconnected();
            if let Some(handler) = self.disconnect_handler.as_mut() {
                handler(frame);
            }
        }
    }

    fn handle_error(&mut self, frame: &Frame) {
        debug!(message = frame.get_header("message"), "server sent ERROR");
        self.enter_disconnected();
        if let Some(handler) = self.error_handler.as_mut() {
            handler(frame);
        }
        if let Some(handler) = self.disconnect_handler.as_mut() {
            handler(frame);
        }
    }

    fn enter_disconnected(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.heartbeat.reset();
    }

    /// Subscribe to `destination`.
    ///
    /// `handler` runs for every MESSAGE delivered to the subscription and
    /// decides whether the client ACKs, NACKs or does nothing.
    ///
    /// Returns the subscription id (its slot index, sent on the wire as
    /// `sub-{id}`), or `ClientError::SubscriptionsFull` when every slot is
    /// taken. Nothing is sent in that case.
    pub fn subscribe<F>(
        &mut self,
        destination: &str,
        ack_mode: AckMode,
        handler: F,
    ) -> Result<usize, ClientError>
    where
        F: FnMut(&Frame) -> AckDirective + 'static,
    {
        let handler: MessageHandler = Box::new(handler);
        let id = self.subscriptions.allocate(destination, ack_mode, handler)?;
        let lines = [
            format!("id:{}", wire_id(id)),
            format!("destination:{}", destination),
            format!("ack:{}", ack_mode.as_str()),
        ];
        debug!(id, destination, ack = ack_mode.as_str(), "subscribing");
        self.transmit(&codec::encode_lines("SUBSCRIBE", &lines[..], None));
        Ok(id)
    }

    /// Cancel subscription `id` and free its slot for reuse.
    pub fn unsubscribe(&mut self, id: usize) -> Result<(), ClientError> {
        if self.subscriptions.lookup(id).is_none() {
            return Err(ClientError::UnknownSubscription(id));
        }
        let lines = [format!("id:{}", wire_id(id))];
        debug!(id, "unsubscribing");
        self.transmit(&codec::encode_lines("UNSUBSCRIBE", &lines[..], None));
        self.subscriptions.release(id);
        Ok(())
    }

    /// Acknowledge `message`, using its `ack` header as the id.
    pub fn ack(&mut self, message: &Frame) {
        let lines = [format!("id:{}", message.get_header("ack"))];
        self.transmit(&codec::encode_lines("ACK", &lines[..], None));
    }

    /// Reject `message`, using its `ack` header as the id.
    pub fn nack(&mut self, message: &Frame) {
        let lines = [format!("id:{}", message.get_header("ack"))];
        self.transmit(&codec::encode_lines("NACK", &lines[..], None));
    }

    /// Publish `body` to `destination`.
    pub fn send(&mut self, destination: &str, body: &str) {
        let lines = [format!("destination:{}", destination)];
        self.transmit(&codec::encode_lines("SEND", &lines[..], Some(body)));
    }

    /// Publish `body` to `destination` with extra headers. The extra headers
    /// go on the wire before `destination`.
    pub fn send_with_headers(&mut self, destination: &str, body: &str, headers: &Headers) {
        let lines = [format!("destination:{}", destination)];
        self.transmit(&codec::encode_lines_with_headers(
            "SEND",
            Some(headers),
            &lines[..],
            Some(body),
        ));
    }

    /// Start an orderly disconnect.
    ///
    /// Sends DISCONNECT carrying `receipt:{n}`, where `n` is the number of
    /// frames sent so far, and waits for the matching RECEIPT. Only valid
    /// while connected; in any other state this does nothing.
    pub fn disconnect(&mut self) {
        if self.state != ConnectionState::Connected {
            debug!(state = ?self.state, "disconnect ignored, not connected");
            return;
        }
        let lines = [format!("receipt:{}", self.command_count)];
        debug!(receipt = self.command_count, "sending DISCONNECT");
        self.transmit(&codec::encode_lines("DISCONNECT", &lines[..], None));
        self.state = ConnectionState::Disconnecting;
    }

    /// Set the user sent as `login` on the next CONNECT.
    pub fn set_identity(&mut self, user: impl Into<String>) {
        self.options.login = Some(user.into());
    }

    pub fn on_connect(&mut self, handler: impl FnMut(&Frame) + 'static) {
        self.connect_handler = Some(Box::new(handler));
    }

    pub fn on_disconnect(&mut self, handler: impl FnMut(&Frame) + 'static) {
        self.disconnect_handler = Some(Box::new(handler));
    }

    pub fn on_receipt(&mut self, handler: impl FnMut(&Frame) + 'static) {
        self.receipt_handler = Some(Box::new(handler));
    }

    pub fn on_error(&mut self, handler: impl FnMut(&Frame) + 'static) {
        self.error_handler = Some(Box::new(handler));
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Frames sent so far, heartbeats included.
    pub fn command_count(&self) -> u32 {
        self.command_count
    }

    /// Negotiated heartbeat interval in ms; `0` when disabled.
    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.heartbeat.interval_ms()
    }

    /// SockJS `h` frames seen so far.
    pub fn sockjs_heartbeats(&self) -> u32 {
        self.sockjs_heartbeats
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn transmit(&mut self, text: &str) {
        trace!(frame = text, "sending frame");
        self.transport.send(&codec::to_payload(text));
        let now = self.clock.now_ms();
        self.record_sent(now);
    }

    fn record_sent(&mut self, now: u64) {
        self.heartbeat.record_sent(now);
        self.command_count = self.command_count.wrapping_add(1);
    }
}
