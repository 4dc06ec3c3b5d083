use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Connector;

/// TCP transport to the upstream gateway.
///
/// Cheap to clone; every [`Connector::connect`] call dials a new socket.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Duration,
    nodelay: bool,
}

impl TcpConnector {
    /// Default time allowed for a single connect attempt.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a connector for `host:port` with default settings.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            nodelay: true,
        }
    }

    /// Override the per-attempt connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable `TCP_NODELAY` on connected sockets.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Target host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Per-attempt connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Connect with a blocking std socket.
    ///
    /// Every resolved address is tried in turn; the last error is returned if
    /// none accepts. Read/write timeouts are left unset for the caller.
    pub fn connect_blocking(&self) -> Result<std::net::TcpStream> {
        let addrs = self.resolve()?;
        let mut last_err = None;

        for addr in addrs {
            match std::net::TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    debug!(%addr, "connected (blocking)");
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(match last_err {
            Some(err) if err.kind() == std::io::ErrorKind::TimedOut => {
                TransportError::ConnectTimeout {
                    addr: self.endpoint(),
                    timeout: self.connect_timeout,
                }
            }
            Some(source) => TransportError::Connect {
                addr: self.endpoint(),
                source,
            },
            None => TransportError::Unresolved(self.endpoint()),
        })
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                addr: self.endpoint(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::Unresolved(self.endpoint()));
        }
        Ok(addrs)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream> {
        let addr = self.endpoint();
        let attempt = TcpStream::connect((self.host.as_str(), self.port));

        let stream = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(TransportError::Connect { addr, source }),
            Err(_) => {
                return Err(TransportError::ConnectTimeout {
                    addr,
                    timeout: self.connect_timeout,
                })
            }
        };

        stream.set_nodelay(self.nodelay)?;
        info!(%addr, "tcp connection established");
        Ok(stream)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let connector = TcpConnector::new("127.0.0.1", port);
        let mut stream = connector.connect().await.unwrap();
        stream.write_all(b"ping").await.unwrap();

        assert_eq!(&server.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn refused_connection_reports_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = TcpConnector::new("127.0.0.1", port);
        let err = connector.connect().await.unwrap_err();

        let TransportError::Connect { addr, .. } = &err else {
            panic!("expected connect error, got {err:?}");
        };
        assert!(addr.ends_with(&port.to_string()));
    }

    #[test]
    fn blocking_connect_roundtrip() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 3];
            socket.read_exact(&mut buf).unwrap();
            buf
        });

        let connector = TcpConnector::new("127.0.0.1", port);
        let mut stream = connector.connect_blocking().unwrap();
        stream.write_all(b"api").unwrap();

        assert_eq!(&server.join().unwrap(), b"api");
    }

    #[test]
    fn builder_overrides() {
        let connector = TcpConnector::new("gw.local", 4002)
            .with_connect_timeout(Duration::from_millis(250))
            .with_nodelay(false);

        assert_eq!(connector.host(), "gw.local");
        assert_eq!(connector.port(), 4002);
        assert_eq!(connector.connect_timeout(), Duration::from_millis(250));
        assert_eq!(connector.endpoint(), "gw.local:4002");
    }
}
