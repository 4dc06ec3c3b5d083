use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::engine::{Command, Operation};
use crate::error::{GatewayError, Result};
use crate::fanout::{Channel, FanOut, Subscription};
use crate::models::{CancelTarget, Contract, HistoricalDataRequest, MarketDataRequest, Order};
use crate::state::ConnectionState;

/// Handle for issuing requests to a running [`crate::Gateway`].
///
/// Cheap to clone; every clone talks to the same connection. Each call
/// completes exactly once with the server's result or an error, and calls
/// made while the connection is down fail with
/// [`GatewayError::NotConnected`] instead of being queued.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    fanout: FanOut,
}

impl GatewayClient {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        state: watch::Receiver<ConnectionState>,
        fanout: FanOut,
    ) -> Self {
        Self {
            commands,
            state,
            fanout,
        }
    }

    /// Look up contracts matching `contract`. Resolves with the list of
    /// contract details records.
    pub async fn req_contract_details(&self, contract: Contract) -> Result<Value> {
        self.call(Operation::ContractDetails(contract)).await
    }

    /// Fetch historical bars. Resolves with the list of bars.
    pub async fn req_historical_data(&self, request: HistoricalDataRequest) -> Result<Value> {
        self.call(Operation::HistoricalData(request)).await
    }

    /// Open a market-data line. Resolves with `{"reqId": id}` once the request
    /// is flushed to the socket; the server sends no acknowledgement. Ticks
    /// arrive on [`Channel::TickPrice`]. A failed write fails the call with
    /// [`GatewayError::ConnectionLost`] and registers nothing.
    pub async fn req_mkt_data(&self, request: MarketDataRequest) -> Result<Value> {
        self.call(Operation::MktData(request)).await
    }

    /// Cancel one market-data line, or all of them. Resolves with the list of
    /// canceled ticker ids once the cancels are flushed; the lines stay
    /// registered if the write fails.
    pub async fn cancel_mkt_data(&self, target: impl Into<CancelTarget>) -> Result<Value> {
        self.call(Operation::CancelMktData(target.into())).await
    }

    /// Place an order under the next server-issued order id. Resolves with
    /// `{"orderId": id}` once flushed, which is not an acceptance by the
    /// server; progress and rejections arrive on [`Channel::OpenOrder`] and
    /// [`Channel::OrderStatus`].
    pub async fn place_order(&self, contract: Contract, order: Order) -> Result<Value> {
        self.call(Operation::PlaceOrder { contract, order }).await
    }

    /// Cancel an order. Resolves with `{"orderId": order_id}` once flushed.
    ///
    /// The call is tracked in the order id space under `order_id` itself, not
    /// under a fresh id. A second cancel for the same order issued before the
    /// first is flushed fails with [`GatewayError::DuplicateId`].
    pub async fn cancel_order(&self, order_id: i64) -> Result<Value> {
        self.call(Operation::CancelOrder(order_id)).await
    }

    async fn call(&self, op: Operation) -> Result<Value> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Call { op, reply })
            .await
            .map_err(|_| GatewayError::Shutdown)?;
        rx.await.map_err(|_| GatewayError::Shutdown)?
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that observes every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the handshake has completed.
    pub async fn wait_connected(&self) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|state| state.is_connected())
            .await
            .map(|_| ())
            .map_err(|_| GatewayError::Shutdown)
    }

    /// Subscribe to a fan-out channel.
    pub fn subscribe(&self, channel: Channel) -> Subscription {
        self.fanout.subscribe(channel)
    }

    /// Diagnostic snapshot: state, server version, pending ids,
    /// subscriptions and the next identifiers.
    pub async fn snapshot(&self) -> Result<Value> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| GatewayError::Shutdown)?;
        rx.await.map_err(|_| GatewayError::Shutdown)
    }

    /// Ask the connection task to stop. Returns once the request is queued.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}
