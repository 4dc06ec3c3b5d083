use std::time::Duration;

use sibi_frame::DEFAULT_MAX_PAYLOAD;

use crate::backoff::ExponentialBackoff;
use crate::handshake::HandshakeConfig;

/// Error codes the server uses for status notices rather than failures
/// (market data farm connection OK, HMDS data farm OK, sec-def farm OK).
pub const DEFAULT_INFORMATIONAL_CODES: [i64; 3] = [2104, 2106, 2158];

/// Configuration for the gateway supervisor and its sessions.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Client id sent with the start-API message. 0 is the master client.
    pub client_id: i64,
    /// Close the connection when nothing arrives this long after a send.
    pub idle_timeout: Duration,
    /// Fail requests that stay pending longer than this. Disabled by default.
    pub request_timeout: Option<Duration>,
    /// First reconnect delay.
    pub reconnect_delay_initial: Duration,
    /// Reconnect delay ceiling.
    pub reconnect_delay_max: Duration,
    /// Growth factor between reconnect attempts.
    pub reconnect_factor: f64,
    /// A session must stay connected this long before its loss resets the
    /// reconnect delay. Shorter sessions keep the delay growing.
    pub backoff_reset_after: Duration,
    /// Error codes that are logged but never fail a request.
    pub informational_codes: Vec<i64>,
    /// Depth of the queue between client handles and the session.
    pub command_capacity: usize,
    /// Per-channel buffer of the fan-out broadcast channels.
    pub fanout_capacity: usize,
    /// Largest inbound payload accepted from the server.
    pub max_payload_size: usize,
    /// Handshake parameters.
    pub handshake: HandshakeConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            client_id: 0,
            idle_timeout: Duration::from_secs(10),
            request_timeout: None,
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_factor: 2.0,
            backoff_reset_after: Duration::from_secs(30),
            informational_codes: DEFAULT_INFORMATIONAL_CODES.to_vec(),
            command_capacity: 256,
            fanout_capacity: 1024,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            handshake: HandshakeConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn with_client_id(mut self, client_id: i64) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_reconnect_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay_initial = initial;
        self.reconnect_delay_max = max;
        self
    }

    pub fn with_backoff_reset_after(mut self, healthy: Duration) -> Self {
        self.backoff_reset_after = healthy;
        self
    }

    /// Build the reconnect backoff described by this config.
    ///
    /// The first attempt is immediate, and so is the first one after the
    /// loss of a session that outlived `backoff_reset_after`.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.reconnect_delay_initial,
            self.reconnect_delay_max,
            self.reconnect_factor,
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = GatewayConfig::default();

        assert_eq!(config.client_id, 0);
        assert_eq!(config.idle_timeout, Duration::from_secs(10));
        assert!(config.request_timeout.is_none());
        assert_eq!(config.informational_codes, vec![2104, 2106, 2158]);
        assert_eq!(config.backoff_reset_after, Duration::from_secs(30));
    }

    #[test]
    fn backoff_starts_immediate() {
        let config = GatewayConfig::default()
            .with_reconnect_delays(Duration::from_secs(1), Duration::from_secs(4));
        let mut backoff = config.backoff();

        assert_eq!(backoff.next_duration(), Duration::ZERO);
        assert_eq!(backoff.next_duration(), Duration::from_secs(1));
    }
}
