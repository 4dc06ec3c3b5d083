use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use sibi_frame::{encode_frame, FrameError, FrameReader, FrameWriter};
use tracing::{debug, info};

use crate::error::{GatewayError, Result};

/// Lowest server version this client can talk to.
pub const MIN_CLIENT_VERSION: i32 = 100;
/// Highest server version this client understands.
pub const MAX_CLIENT_VERSION: i32 = 176;

/// Configuration for the connection handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Raw bytes sent before any framed traffic.
    pub prefix: Vec<u8>,
    /// Lowest protocol version offered.
    pub min_version: i32,
    /// Highest protocol version offered.
    pub max_version: i32,
    /// Extra connect options appended to the version range, e.g. `+PACEAPI`.
    pub connect_options: String,
    /// How long to wait for the server reply.
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            prefix: b"API\0".to_vec(),
            min_version: MIN_CLIENT_VERSION,
            max_version: MAX_CLIENT_VERSION,
            connect_options: String::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl HandshakeConfig {
    /// The version-range payload: `v<min>..<max>`, plus connect options.
    pub fn version_range(&self) -> String {
        let range = format!("v{}..{}", self.min_version, self.max_version);
        if self.connect_options.is_empty() {
            range
        } else {
            format!("{range} {}", self.connect_options)
        }
    }
}

/// What the server announced in its handshake reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Negotiated protocol version; gates every later message layout.
    pub server_version: i32,
    /// Server-local connection timestamp, verbatim.
    pub connection_time: String,
}

/// The complete opening bytes: the raw prefix followed by the framed version
/// range. The range is sent as raw text, without a field terminator.
pub fn encode_handshake(config: &HandshakeConfig) -> Result<Bytes> {
    let range = config.version_range();
    let mut out = BytesMut::with_capacity(config.prefix.len() + 4 + range.len());
    out.extend_from_slice(&config.prefix);
    encode_frame(range.as_bytes(), &mut out)?;
    Ok(out.freeze())
}

/// Validate the server's reply to the handshake.
///
/// A valid reply is exactly two fields: a numeric server version inside the
/// offered range, and the connection time.
pub fn parse_reply(fields: &[String], config: &HandshakeConfig) -> Result<HandshakeResult> {
    let [version, connection_time] = fields else {
        return Err(GatewayError::HandshakeFailed(format!(
            "expected 2 fields in reply, got {}",
            fields.len()
        )));
    };

    let server_version: i32 = version.trim().parse().map_err(|_| {
        GatewayError::HandshakeFailed(format!("invalid server version '{version}'"))
    })?;

    if server_version < config.min_version {
        return Err(GatewayError::HandshakeFailed(format!(
            "server version {server_version} below minimum {}",
            config.min_version
        )));
    }
    if server_version > config.max_version {
        return Err(GatewayError::HandshakeFailed(format!(
            "server version {server_version} above maximum {}",
            config.max_version
        )));
    }

    Ok(HandshakeResult {
        server_version,
        connection_time: connection_time.clone(),
    })
}

/// Perform the handshake over blocking streams.
///
/// Used for one-shot checks; the long-running session drives the same
/// exchange over its async framed stream.
pub fn handshake_blocking<R: Read, W: Write>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    config: &HandshakeConfig,
) -> Result<HandshakeResult> {
    writer.send_unframed(&config.prefix)?;
    writer.send(config.version_range().as_bytes())?;
    debug!(range = %config.version_range(), "handshake sent");

    let deadline = Instant::now() + config.timeout;
    let fields = recv_reply(reader, deadline, config.timeout)?;
    let result = parse_reply(&fields, config)?;

    info!(
        server_version = result.server_version,
        connection_time = %result.connection_time,
        "handshake complete"
    );
    Ok(result)
}

fn recv_reply<R: Read>(
    reader: &mut FrameReader<R>,
    deadline: Instant,
    timeout: Duration,
) -> Result<Vec<String>> {
    loop {
        if Instant::now() >= deadline {
            return Err(GatewayError::HandshakeFailed(format!(
                "no reply within {timeout:?}"
            )));
        }

        match reader.read_fields() {
            Ok(fields) => return Ok(fields),
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                return Err(GatewayError::ConnectionLost(
                    "connection closed during handshake".to_string(),
                ));
            }
            Err(err) => return Err(err.into()),
        }
    }
}
