//! Cooperative STOMP client core.
//!
//! The client runs on whatever loop the host already has: call
//! [`StompClient::tick`] repeatedly and it drains transport events,
//! dispatches frames to handlers and keeps heartbeats flowing. The client
//! never blocks and keeps its subscriptions in a fixed-size table.
//!
//! Any byte transport can sit underneath it through the [`Transport`] trait.
//! [`TcpTransport`] is the bundled one: plain TCP or TLS, driven by a tokio
//! task.
//!
//! ```ignore
//! use cobalt_stomp::{AckDirective, AckMode, ConnectOptions, StompClient, TcpTransport};
//!
//! let mut client = StompClient::new(TcpTransport::current(), ConnectOptions::default());
//! client.on_connect(|_| println!("connected"));
//! client.begin();
//! loop {
//!     client.tick();
//!     // ... other work ...
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod headers;
pub mod heartbeat;
pub mod subscription;
pub mod transport;

pub use codec::{StompCodec, StompItem};
pub use connection::{ConnectOptions, ConnectionState, StompClient};
pub use error::{ClientError, ServerError};
pub use frame::{Frame, ServerCommand};
pub use headers::Headers;
pub use heartbeat::{Clock, ManualClock, SystemClock, parse_heartbeat_header};
pub use subscription::{AckDirective, AckMode};
pub use transport::{TcpTransport, Transport, TransportEvent};
