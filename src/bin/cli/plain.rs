use cobalt_stomp::{
    ConnectionState, ServerError, StompClient, TcpTransport, Transport, TransportEvent,
};
use std::cell::Cell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

use super::args::Cli;
use super::commands::{CommandResult, execute_command, print_help, subscribe_destination};
use super::exit_codes;
use super::state::new_shared_state;

/// How long the tick loop sleeps between steps
const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for the DISCONNECT receipt before giving up
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Passes everything through to `inner`, noting when the socket goes away.
///
/// The client treats a transport disconnect as silent, so the CLI watches
/// for it itself to decide when to exit.
struct WatchedTransport<T> {
    inner: T,
    closed: Rc<Cell<bool>>,
}

impl<T: Transport> Transport for WatchedTransport<T> {
    fn open(&mut self, host: &str, port: u16, path: &str, secure: bool) {
        self.closed.set(false);
        self.inner.open(host, port, path, secure);
    }

    fn send(&mut self, payload: &[u8]) {
        self.inner.send(payload);
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        let event = self.inner.poll();
        if event == Some(TransportEvent::Disconnected) {
            self.closed.set(true);
        }
        event
    }
}

/// Run the CLI: connect, subscribe, then interleave user commands with
/// client ticks until the user quits or the connection ends.
pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    let options = cli
        .connect_options()
        .map_err(|e| (e, exit_codes::NETWORK_ERROR))?;
    let ack_mode = cli.ack.into();

    println!("Connecting to {}...", cli.address);

    let state = new_shared_state(
        cli.address.clone(),
        cli.login.clone().unwrap_or_else(|| "(none)".to_string()),
    );
    let closed = Rc::new(Cell::new(false));
    let transport = WatchedTransport {
        inner: TcpTransport::current(),
        closed: closed.clone(),
    };
    let mut client = StompClient::new(transport, options);

    let s = state.clone();
    client.on_connect(move |frame| {
        let mut s = s.borrow_mut();
        s.connected_at = Some(chrono::Local::now());
        println!("Connected (server: {}).", frame.get_header("server"));
    });
    let s = state.clone();
    client.on_receipt(move |frame| {
        s.borrow_mut().receipts += 1;
        debug!(receipt = frame.get_header("receipt-id"), "receipt");
    });
    let s = state.clone();
    client.on_error(move |frame| {
        let err = ServerError::from_frame(frame);
        eprintln!("\n[BROKER ERROR] {}", err);
        for (k, v) in &frame.headers {
            eprintln!("  {}: {}", k, v);
        }
        s.borrow_mut().last_error = Some(err);
    });
    client.on_disconnect(|_| println!("Disconnected."));

    if cli.tls {
        client.begin_secure();
    } else {
        client.begin();
    }

    // Channel to receive user commands from the stdin reader
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if cmd_tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut subscribed = false;
    let mut quit_deadline: Option<Instant> = None;

    loop {
        client.tick();

        match client.state() {
            ConnectionState::Connected if !subscribed => {
                subscribed = true;
                state.borrow_mut().heartbeat_interval_ms = client.heartbeat_interval_ms();
                for dest in &cli.subscribe {
                    let id = subscribe_destination(&mut client, dest, ack_mode, &state)
                        .map_err(|msg| (msg, exit_codes::PROTOCOL_ERROR))?;
                    println!("Subscribed to {} (id {})", dest, id);
                }
                println!();
                print_help();
                println!();
                prompt();
            }
            ConnectionState::Disconnected if quit_deadline.is_some() => break,
            ConnectionState::Disconnected => {
                let never_connected = state.borrow().connected_at.is_none();
                let last_error = state.borrow().last_error.clone();
                if let Some(err) = last_error {
                    let code = if never_connected {
                        exit_codes::AUTH_ERROR
                    } else {
                        exit_codes::PROTOCOL_ERROR
                    };
                    return Err((err.to_string(), code));
                }
                if closed.get() {
                    let message = if never_connected {
                        format!("Connection failed: {}", cli.address)
                    } else {
                        format!("Connection lost: {}", cli.address)
                    };
                    return Err((message, exit_codes::NETWORK_ERROR));
                }
            }
            _ => {}
        }

        if let Some(deadline) = quit_deadline {
            if closed.get() || Instant::now() >= deadline {
                debug!("no DISCONNECT receipt, leaving anyway");
                break;
            }
        } else {
            match cmd_rx.try_recv() {
                Ok(line) => match execute_command(&line, &mut client, &state, ack_mode) {
                    CommandResult::Ok => prompt(),
                    CommandResult::Quit => {
                        println!("Disconnecting...");
                        client.disconnect();
                        quit_deadline = Some(Instant::now() + DISCONNECT_TIMEOUT);
                    }
                    CommandResult::Error(msg) => {
                        eprintln!("{}", msg);
                        prompt();
                    }
                },
                Err(mpsc::error::TryRecvError::Empty) => {}
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    client.disconnect();
                    quit_deadline = Some(Instant::now() + DISCONNECT_TIMEOUT);
                }
            }
        }

        tokio::time::sleep(TICK_INTERVAL).await;
    }

    if cli.summary {
        println!("{}", state.borrow().generate_summary(false));
    }
    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}
