use cobalt_stomp::{AckDirective, AckMode, Clock, Headers, StompClient, Transport};
use std::io::Write;

use super::state::SharedState;

/// A parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send { destination: String, body: String },
    Subscribe(String),
    Unsubscribe(usize),
    List,
    Summary(Option<String>),
    Report(Option<String>),
    Clear,
    Help,
    Quit,
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let parts: Vec<&str> = line.trim().splitn(3, ' ').collect();
        let arg = |i: usize| parts.get(i).map(|s| s.to_string());

        match parts[0] {
            "" => Ok(Command::Empty),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            "send" => match (arg(1), arg(2)) {
                (Some(destination), Some(body)) => Ok(Command::Send { destination, body }),
                _ => Err("Usage: send <destination> <message>".to_string()),
            },
            "sub" | "subscribe" => arg(1)
                .map(Command::Subscribe)
                .ok_or_else(|| "Usage: sub <destination>".to_string()),
            "unsub" | "unsubscribe" => arg(1)
                .and_then(|s| s.parse().ok())
                .map(Command::Unsubscribe)
                .ok_or_else(|| "Usage: unsub <id>".to_string()),
            "subs" | "list" => Ok(Command::List),
            "summary" => Ok(Command::Summary(arg(1))),
            "report" => Ok(Command::Report(arg(1))),
            "clear" => Ok(Command::Clear),
            "help" | "?" => Ok(Command::Help),
            other => Err(format!("Unknown command: {}. Type 'help' for commands.", other)),
        }
    }
}

/// Result of executing a command
pub enum CommandResult {
    Ok,
    Quit,
    Error(String),
}

/// Parse and execute one line of input against the client
pub fn execute_command<T: Transport, C: Clock>(
    line: &str,
    client: &mut StompClient<T, C>,
    state: &SharedState,
    ack_mode: AckMode,
) -> CommandResult {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(msg) => return CommandResult::Error(msg),
    };

    match command {
        Command::Empty => CommandResult::Ok,
        Command::Quit => CommandResult::Quit,

        Command::Send { destination, body } => {
            let mut headers = Headers::new();
            headers.append("content-type", "text/plain");
            client.send_with_headers(&destination, &body, &headers);
            CommandResult::Ok
        }

        Command::Subscribe(destination) => {
            match subscribe_destination(client, &destination, ack_mode, state) {
                Ok(id) => {
                    println!("Subscribed to {} (id {})", destination, id);
                    CommandResult::Ok
                }
                Err(msg) => CommandResult::Error(msg),
            }
        }

        Command::Unsubscribe(id) => match client.unsubscribe(id) {
            Ok(()) => {
                if let Some(stats) = state.borrow_mut().remove_subscription(id) {
                    println!("Unsubscribed from {}", stats.destination);
                }
                CommandResult::Ok
            }
            Err(e) => CommandResult::Error(e.to_string()),
        },

        Command::List => {
            let registry = client.subscriptions();
            println!("{} of {} slots in use", registry.len(), registry.capacity());
            for sub in registry.iter() {
                println!("  {:>2} {} ({})", sub.id(), sub.destination(), sub.ack_mode().as_str());
            }
            CommandResult::Ok
        }

        Command::Summary(file) => write_report(state, file, false),
        Command::Report(file) => write_report(state, file, true),

        Command::Clear => {
            state.borrow_mut().clear_messages();
            CommandResult::Ok
        }

        Command::Help => {
            print_help();
            CommandResult::Ok
        }
    }
}

/// Subscribe and record the subscription in the session state.
///
/// Messages are printed as they arrive; outside `auto` mode each one is
/// acknowledged once printed.
pub fn subscribe_destination<T: Transport, C: Clock>(
    client: &mut StompClient<T, C>,
    destination: &str,
    ack_mode: AckMode,
    state: &SharedState,
) -> Result<usize, String> {
    let handler_state = state.clone();
    let id = client
        .subscribe(destination, ack_mode, move |frame| {
            let id = cobalt_stomp::subscription::parse_wire_id(frame.get_header("subscription"))
                .unwrap_or_default();
            handler_state.borrow_mut().record_message(id, &frame.body);

            println!("\n[{}] MESSAGE received:", frame.get_header("destination"));
            for (k, v) in &frame.headers {
                println!("  {}: {}", k, v);
            }
            if !frame.body.is_empty() {
                println!("  Body: {}", frame.body);
            }
            print!("> ");
            let _ = std::io::stdout().flush();

            match ack_mode {
                AckMode::Auto => AckDirective::Continue,
                AckMode::Client | AckMode::ClientIndividual => AckDirective::Ack,
            }
        })
        .map_err(|e| format!("Failed to subscribe to '{}': {}", destination, e))?;

    state.borrow_mut().register_subscription(id, destination);
    Ok(id)
}

fn write_report(state: &SharedState, file: Option<String>, include_messages: bool) -> CommandResult {
    let report = state.borrow().generate_summary(include_messages);
    match file {
        Some(filename) => match std::fs::write(&filename, format!("{}\n", report)) {
            Ok(()) => {
                println!("Report written to {}", filename);
                CommandResult::Ok
            }
            Err(e) => CommandResult::Error(format!("Failed to write {}: {}", filename, e)),
        },
        None => {
            println!("{}", report);
            CommandResult::Ok
        }
    }
}

pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <message>  - Send a message");
    println!("  sub <destination>             - Subscribe to a destination");
    println!("  unsub <id>                    - Cancel a subscription");
    println!("  subs                          - List subscriptions");
    println!("  summary [file]                - Print session summary (or save to file)");
    println!("  report [file]                 - Summary with message history");
    println!("  clear                         - Clear message history");
    println!("  quit                          - Disconnect and exit");
}
