use std::time::Duration;

use serde::Serialize;
use sibi_frame::{FrameConfig, FrameReader, FrameWriter};
use sibi_gateway::{handshake_blocking, HandshakeConfig};
use sibi_transport::TcpConnector;

use crate::cmd::ProbeArgs;
use crate::exit::{gateway_error, io_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

/// Granularity at which the blocking read re-checks the handshake deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Serialize)]
struct ProbeOutput {
    endpoint: String,
    server_version: i32,
    connection_time: String,
    handshake_ms: f64,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let connector = TcpConnector::new(&args.upstream.tws_host, args.upstream.tws_port)
        .with_connect_timeout(args.upstream.connect_timeout);
    let endpoint = format!("{}:{}", connector.host(), connector.port());

    let started = std::time::Instant::now();
    let stream = connector
        .connect_blocking()
        .map_err(|err| transport_error("connect failed", err))?;
    let writer_stream = stream
        .try_clone()
        .map_err(|err| io_error("socket clone failed", err))?;

    let frame_config = FrameConfig {
        read_timeout: Some(POLL_INTERVAL.min(args.timeout)),
        write_timeout: Some(args.timeout),
        ..FrameConfig::default()
    };
    let mut reader = FrameReader::with_config_tcp(stream, frame_config.clone())
        .map_err(|err| gateway_error("socket setup failed", err.into()))?;
    let mut writer = FrameWriter::with_config_tcp(writer_stream, frame_config)
        .map_err(|err| gateway_error("socket setup failed", err.into()))?;

    let handshake = HandshakeConfig {
        timeout: args.timeout,
        ..HandshakeConfig::default()
    };
    let result = handshake_blocking(&mut reader, &mut writer, &handshake)
        .map_err(|err| gateway_error("handshake failed", err))?;

    let out = ProbeOutput {
        endpoint,
        server_version: result.server_version,
        connection_time: result.connection_time,
        handshake_ms: (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Pretty => {
            println!("Gateway:");
            println!("  Endpoint:        {}", out.endpoint);
            println!("  Server version:  {}", out.server_version);
            println!("  Connection time: {}", out.connection_time);
            println!("  Handshake:       {:.2}ms", out.handshake_ms);
        }
    }
    Ok(SUCCESS)
}
