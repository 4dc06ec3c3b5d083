use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod probe;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to the gateway and serve the JSON-lines facade until Ctrl-C.
    Run(RunArgs),
    /// Connect once, perform the handshake, and print the server version.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

/// Where the upstream gateway listens.
#[derive(Args, Debug, Clone)]
pub struct UpstreamArgs {
    /// Host of TWS / IB Gateway.
    #[arg(long, env = "SIBI_TWS_HOST", default_value = "localhost")]
    pub tws_host: String,
    /// API port of TWS / IB Gateway.
    #[arg(long, env = "SIBI_TWS_PORT", default_value_t = 7498)]
    pub tws_port: u16,
    /// TCP connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub connect_timeout: Duration,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub upstream: UpstreamArgs,
    /// Client id presented to the gateway (0 is the master client).
    #[arg(long, env = "SIBI_CLIENT_ID", default_value_t = 0)]
    pub client_id: i64,
    /// Interface the facade binds.
    #[arg(long, env = "SIBI_LISTEN_HOST", default_value = "127.0.0.1")]
    pub listen_host: String,
    /// Port the facade listens on.
    #[arg(long, env = "SIBI_LISTEN_PORT", default_value_t = 7080)]
    pub listen_port: u16,
    /// Concurrent facade connections.
    #[arg(long, env = "SIBI_MAX_CONNECTIONS", default_value_t = 49)]
    pub max_connections: usize,
    /// Drop the connection when a sent request gets no traffic back in time.
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub idle_timeout: Duration,
    /// Fail requests with no final reply after this long. Off by default.
    #[arg(long, value_parser = parse_duration)]
    pub request_timeout: Option<Duration>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub upstream: UpstreamArgs,
    /// Time allowed for the handshake reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub timeout: Duration,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {input}"))?;

    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
