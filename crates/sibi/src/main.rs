mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "sibi",
    version,
    about = "Share one TWS / IB Gateway connection across many programs"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "SIBI_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sibi::facade;

    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["sibi", "run"]).expect("run args should parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.upstream.tws_host, "localhost");
        assert_eq!(args.upstream.tws_port, 7498);
        assert_eq!(args.client_id, 0);
        assert_eq!(args.listen_port, 7080);
        assert_eq!(args.max_connections, facade::DEFAULT_MAX_CONNECTIONS);
        assert_eq!(args.idle_timeout, Duration::from_secs(10));
        assert_eq!(args.request_timeout, None);
    }

    #[test]
    fn run_overrides() {
        let cli = Cli::try_parse_from([
            "sibi",
            "run",
            "--tws-host",
            "10.0.0.5",
            "--tws-port",
            "4002",
            "--client-id",
            "7",
            "--request-timeout",
            "30s",
            "--idle-timeout",
            "1500ms",
        ])
        .expect("run args should parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.upstream.tws_host, "10.0.0.5");
        assert_eq!(args.upstream.tws_port, 4002);
        assert_eq!(args.client_id, 7);
        assert_eq!(args.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(args.idle_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn rejects_bad_duration() {
        let err = Cli::try_parse_from(["sibi", "probe", "--timeout", "soon"])
            .expect_err("bad duration should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_probe_subcommand() {
        let cli = Cli::try_parse_from(["sibi", "probe", "--tws-port", "7497", "--timeout", "2s"])
            .expect("probe args should parse");
        assert!(matches!(cli.command, Command::Probe(_)));
    }
}
