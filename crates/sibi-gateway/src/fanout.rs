//! Broadcast of unsolicited server events.
//!
//! Each push event kind has its own named broadcast channel. Publishing never
//! waits on subscribers: with no receivers the message is dropped, and a slow
//! receiver lags and skips rather than stalling the connection.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Named fan-out channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    #[serde(rename = "tickPrice")]
    TickPrice,
    #[serde(rename = "historicalDataUpdate")]
    HistoricalDataUpdate,
    #[serde(rename = "openOrder")]
    OpenOrder,
    #[serde(rename = "orderStatus")]
    OrderStatus,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::TickPrice,
        Channel::HistoricalDataUpdate,
        Channel::OpenOrder,
        Channel::OrderStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::TickPrice => "tickPrice",
            Channel::HistoricalDataUpdate => "historicalDataUpdate",
            Channel::OpenOrder => "openOrder",
            Channel::OrderStatus => "orderStatus",
        }
    }

    fn index(self) -> usize {
        match self {
            Channel::TickPrice => 0,
            Channel::HistoricalDataUpdate => 1,
            Channel::OpenOrder => 2,
            Channel::OrderStatus => 3,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a channel name does not match any [`Channel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.name() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// One published event.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub channel: Channel,
    /// Request or order id the event belongs to.
    pub id: i64,
    /// Serialized JSON object.
    pub payload: String,
}

/// Publisher side of the fan-out channels. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FanOut {
    senders: [broadcast::Sender<Published>; 4],
}

impl FanOut {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            senders: std::array::from_fn(|_| broadcast::channel(capacity).0),
        }
    }

    /// Merge `metadata` over `payload`, serialize, and broadcast on `channel`.
    ///
    /// Keys present in both take the metadata value. Returns the number of
    /// receivers the event reached.
    pub fn publish(
        &self,
        channel: Channel,
        id: i64,
        mut payload: Map<String, Value>,
        metadata: Option<&Map<String, Value>>,
    ) -> usize {
        if let Some(metadata) = metadata {
            for (key, value) in metadata {
                payload.insert(key.clone(), value.clone());
            }
        }

        let payload = match serde_json::to_string(&payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%channel, id, error = %err, "dropping unserializable event");
                return 0;
            }
        };

        let sender = &self.senders[channel.index()];
        match sender.send(Published {
            channel,
            id,
            payload,
        }) {
            Ok(receivers) => {
                debug!(%channel, id, receivers, "pushing data on channel");
                receivers
            }
            Err(_) => 0,
        }
    }

    /// Subscribe to `channel`.
    pub fn subscribe(&self, channel: Channel) -> Subscription {
        Subscription {
            channel,
            rx: self.senders[channel.index()].subscribe(),
        }
    }

    pub fn receiver_count(&self, channel: Channel) -> usize {
        self.senders[channel.index()].receiver_count()
    }
}

/// Receiver side of one fan-out channel.
#[derive(Debug)]
pub struct Subscription {
    channel: Channel,
    rx: broadcast::Receiver<Published>,
}

impl Subscription {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Next event, or `None` once the gateway is gone.
    ///
    /// Events missed because this receiver fell behind are skipped.
    pub async fn next(&mut self) -> Option<Published> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(channel = %self.channel, missed, "subscriber lagged, events skipped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
