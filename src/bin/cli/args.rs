use clap::{Parser, ValueEnum};
use cobalt_stomp::{AckMode, ConnectOptions};

#[derive(Parser)]
#[command(name = "stomp")]
#[command(version)]
#[command(about = "Interactive STOMP client driven by a cooperative tick loop")]
pub struct Cli {
    /// STOMP broker address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:61613")]
    pub address: String,

    /// Login sent with CONNECT
    #[arg(short, long)]
    pub login: Option<String>,

    /// Shortest interval (ms) the client is willing to heartbeat at
    #[arg(long, default_value_t = 10_000)]
    pub heartbeat: u64,

    /// Connect over TLS
    #[arg(long)]
    pub tls: bool,

    /// Destinations to subscribe to once connected (can be repeated)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Acknowledgement mode for subscriptions
    #[arg(long, value_enum, default_value_t = AckArg::Auto)]
    pub ack: AckArg,

    /// Size of the subscription table
    #[arg(long, default_value_t = 8)]
    pub max_subscriptions: usize,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Show session summary on exit
    #[arg(long)]
    pub summary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AckArg {
    Auto,
    Client,
    ClientIndividual,
}

impl From<AckArg> for AckMode {
    fn from(arg: AckArg) -> Self {
        match arg {
            AckArg::Auto => AckMode::Auto,
            AckArg::Client => AckMode::Client,
            AckArg::ClientIndividual => AckMode::ClientIndividual,
        }
    }
}

impl Cli {
    /// Split `--address` into host and port.
    pub fn host_port(&self) -> Result<(String, u16), String> {
        let (host, port) = self
            .address
            .rsplit_once(':')
            .ok_or_else(|| format!("Invalid address '{}', expected host:port", self.address))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| format!("Invalid port in address '{}'", self.address))?;
        Ok((host.to_string(), port))
    }

    pub fn connect_options(&self) -> Result<ConnectOptions, String> {
        let (host, port) = self.host_port()?;
        let mut options = ConnectOptions::new(host, port, "/")
            .with_heartbeat_ms(self.heartbeat)
            .with_max_subscriptions(self.max_subscriptions);
        if let Some(login) = &self.login {
            options = options.with_login(login.clone());
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_address_and_options() {
        let cli = Cli::parse_from([
            "stomp",
            "--address",
            "broker.local:61614",
            "--login",
            "guest",
            "--heartbeat",
            "2500",
        ]);
        let options = cli.connect_options().unwrap();
        assert_eq!(options.host, "broker.local");
        assert_eq!(options.port, 61614);
        assert_eq!(options.login.as_deref(), Some("guest"));
        assert_eq!(options.heartbeat_ms, 2500);
    }

    #[test]
    fn rejects_address_without_port() {
        let cli = Cli::parse_from(["stomp", "--address", "broker.local"]);
        assert!(cli.connect_options().is_err());
    }

    #[test]
    fn ack_arg_maps_to_ack_mode() {
        let cli = Cli::parse_from(["stomp", "--ack", "client-individual"]);
        assert_eq!(AckMode::from(cli.ack), AckMode::ClientIndividual);
    }
}
