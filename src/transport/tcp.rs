use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_rustls::{TlsConnector, rustls};
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use super::{Transport, TransportEvent};
use crate::codec::{DEFAULT_MAX_FRAME_LEN, StompCodec, StompItem};

/// STOMP over a raw TCP (optionally TLS) socket.
///
/// The socket is driven by a background task on the given tokio runtime.
/// Outgoing payloads and incoming events cross over through unbounded
/// channels, so `send` and `poll` never block the cooperative tick.
pub struct TcpTransport {
    runtime: Handle,
    max_frame_len: usize,
    outbound_tx: Option<mpsc::UnboundedSender<Bytes>>,
    events_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl TcpTransport {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            outbound_tx: None,
            events_rx: None,
        }
    }

    /// Use the runtime the caller is currently running on.
    ///
    /// Panics when called outside a tokio runtime, like
    /// `tokio::runtime::Handle::current`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Largest inbound frame accepted before the connection is dropped.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Drop the connection. The background task closes the socket once it
    /// notices the outbound channel is gone and reports `Disconnected`.
    pub fn close(&mut self) {
        self.outbound_tx = None;
    }
}

impl Transport for TcpTransport {
    fn open(&mut self, host: &str, port: u16, path: &str, secure: bool) {
        if !path.is_empty() && path != "/" {
            debug!(path, "path is not used by the TCP transport");
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Bytes>();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<TransportEvent>();
        self.outbound_tx = Some(outbound_tx);
        self.events_rx = Some(events_rx);

        let host = host.to_string();
        let codec = StompCodec::with_max_frame_len(self.max_frame_len);
        self.runtime.spawn(async move {
            if let Err(e) = run_connection(&host, port, secure, codec, outbound_rx, &events_tx).await
            {
                warn!(host = %host, port, error = %e, "transport connection failed");
            }
            let _ = events_tx.send(TransportEvent::Disconnected);
        });
    }

    fn send(&mut self, payload: &[u8]) {
        match &self.outbound_tx {
            Some(tx) => {
                if tx.send(Bytes::copy_from_slice(payload)).is_err() {
                    warn!(len = payload.len(), "transport closed, dropping payload");
                }
            }
            None => warn!(len = payload.len(), "transport not open, dropping payload"),
        }
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.events_rx.as_mut()?.try_recv().ok()
    }
}

async fn run_connection(
    host: &str,
    port: u16,
    secure: bool,
    codec: StompCodec,
    outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    events_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> io::Result<()> {
    let addr = format!("{}:{}", host, port);
    info!(%addr, secure, "connecting");
    let tcp = TcpStream::connect(&addr).await?;
    tcp.set_nodelay(true)?;

    if secure {
        let mut root_cert_store = rustls::RootCertStore::empty();
        root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(tls_config));
        let domain = rustls::pki_types::ServerName::try_from(host)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid TLS domain name"))?
            .to_owned();
        let tls = connector.connect(domain, tcp).await?;
        pump(tls, codec, outbound_rx, events_tx).await
    } else {
        pump(tcp, codec, outbound_rx, events_tx).await
    }
}

/// Shuttle payloads and frames between the channels and the socket until
/// either side goes away.
async fn pump<S>(
    stream: S,
    codec: StompCodec,
    mut outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    events_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if events_tx.send(TransportEvent::Connected).is_err() {
        return Ok(());
    }

    let (mut sink, mut frames) = Framed::new(stream, codec).split();
    loop {
        tokio::select! {
            maybe = outbound_rx.recv() => match maybe {
                Some(payload) => sink.send(payload).await?,
                None => {
                    debug!("transport closed locally");
                    sink.close().await?;
                    return Ok(());
                }
            },
            item = frames.next() => match item {
                Some(Ok(StompItem::Text(text))) => {
                    if events_tx.send(TransportEvent::Text(text)).is_err() {
                        return Ok(());
                    }
                }
                Some(Ok(StompItem::Heartbeat)) => trace!("heartbeat received"),
                Some(Err(e)) => return Err(e),
                None => {
                    debug!("connection closed by peer");
                    return Ok(());
                }
            },
        }
    }
}
