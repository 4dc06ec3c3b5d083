//! The single owner of all correlation state.
//!
//! The engine is driven from one task only: the supervisor while offline and
//! the session while a socket is up. It never touches I/O itself; commands
//! come in as [`Command`]s, inbound messages as decoded field lists, and the
//! frames it wants written go back out as return values.

use serde::Serialize;
use serde_json::{json, Map, Value};
use sibi_frame::Field;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::codec::{tick_type, Codec, InboundEvent, OutboundCall};
use crate::config::GatewayConfig;
use crate::correlation::{CorrelationTable, IdSpace, Reply};
use crate::error::{GatewayError, Result};
use crate::fanout::{Channel, FanOut};
use crate::handshake::HandshakeResult;
use crate::ids::{OrderIds, RequestIds};
use crate::models::{
    Bar, CancelTarget, Contract, HistoricalDataRequest, MarketDataRequest, Order, OrderStatus,
};
use crate::state::ConnectionState;
use crate::subscriptions::SubscriptionRegistry;

/// An outbound operation requested through a client handle.
#[derive(Debug)]
pub enum Operation {
    ContractDetails(Contract),
    HistoricalData(HistoricalDataRequest),
    MktData(MarketDataRequest),
    CancelMktData(CancelTarget),
    PlaceOrder { contract: Contract, order: Order },
    CancelOrder(i64),
}

/// Messages from client handles to the connection task.
#[derive(Debug)]
pub enum Command {
    Call { op: Operation, reply: Reply },
    Snapshot { reply: oneshot::Sender<Value> },
    Shutdown,
}

/// A call with no server reply, completed once its frames are flushed.
#[derive(Debug)]
enum Unflushed {
    MktData {
        req_id: i64,
        contract: Map<String, Value>,
    },
    CancelMktData {
        req_id: i64,
        all: bool,
        targets: Vec<i64>,
    },
    PlaceOrder {
        order_id: i64,
        metadata: Map<String, Value>,
    },
    CancelOrder {
        order_id: i64,
    },
}

pub(crate) struct Engine {
    codec: Box<dyn Codec>,
    client_id: i64,
    informational_codes: Vec<i64>,
    state_tx: watch::Sender<ConnectionState>,
    server: Option<HandshakeResult>,
    request_ids: RequestIds,
    order_ids: OrderIds,
    requests: CorrelationTable,
    orders: CorrelationTable,
    subscriptions: SubscriptionRegistry,
    unflushed: Vec<Unflushed>,
    fanout: FanOut,
}

impl Engine {
    pub(crate) fn new(
        config: &GatewayConfig,
        codec: Box<dyn Codec>,
        fanout: FanOut,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            codec,
            client_id: config.client_id,
            informational_codes: config.informational_codes.clone(),
            state_tx,
            server: None,
            request_ids: RequestIds::new(),
            order_ids: OrderIds::new(),
            requests: CorrelationTable::new(IdSpace::Request),
            orders: CorrelationTable::new(IdSpace::Order),
            subscriptions: SubscriptionRegistry::new(),
            unflushed: Vec::new(),
            fanout,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&mut self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "connection state changed");
        }
    }

    /// Negotiated server version, or 0 before the first handshake.
    pub(crate) fn server_version(&self) -> i32 {
        self.server.as_ref().map_or(0, |server| server.server_version)
    }

    /// A socket is open and the handshake has been sent.
    pub(crate) fn on_connecting(&mut self) {
        self.server = None;
        self.set_state(ConnectionState::Connecting);
    }

    /// Handshake reply accepted. Returns the start-API frame to send.
    pub(crate) fn on_handshake(&mut self, result: HandshakeResult) -> Result<Vec<Field>> {
        info!(
            server_version = result.server_version,
            connection_time = %result.connection_time,
            "handshake complete"
        );
        let server_version = result.server_version;
        self.server = Some(result);
        self.set_state(ConnectionState::Connected);

        let start = OutboundCall::StartApi {
            client_id: self.client_id,
            optional_capabilities: String::new(),
        };
        debug!(client_id = self.client_id, "sending start api");
        Ok(self.codec.encode(&start, server_version)?)
    }

    /// The socket is gone. Every pending request in both spaces is failed.
    ///
    /// Subscriptions and metadata survive; identifier counters are untouched.
    pub(crate) fn on_disconnected(&mut self, reason: &str) {
        self.set_state(ConnectionState::Disconnected);
        self.server = None;
        self.unflushed.clear();

        let err = GatewayError::ConnectionLost(reason.to_string());
        let requests = self.requests.fail_all(&err);
        let orders = self.orders.fail_all(&err);
        if !requests.is_empty() || !orders.is_empty() {
            warn!(?requests, ?orders, reason, "failed pending requests after connection loss");
        }
    }

    /// The gateway is stopping. Pending callers get [`GatewayError::Shutdown`].
    pub(crate) fn on_shutdown(&mut self) {
        self.set_state(ConnectionState::Disconnected);
        self.unflushed.clear();
        let requests = self.requests.fail_all(&GatewayError::Shutdown);
        let orders = self.orders.fail_all(&GatewayError::Shutdown);
        info!(
            failed = requests.len() + orders.len(),
            "gateway shut down"
        );
    }

    /// Fail requests pending longer than `timeout`.
    pub(crate) fn expire(&mut self, timeout: std::time::Duration) {
        let requests = self.requests.expire(timeout);
        let orders = self.orders.expire(timeout);
        if !requests.is_empty() || !orders.is_empty() {
            warn!(?requests, ?orders, ?timeout, "pending requests timed out");
        }
    }

    /// Handle one client command. Returns the frames to write, in order.
    ///
    /// Calls made while not connected fail immediately with
    /// [`GatewayError::NotConnected`]; nothing is queued. Calls the server
    /// never answers stay pending until [`Engine::on_flushed`].
    pub(crate) fn handle_command(&mut self, command: Command) -> Vec<Vec<Field>> {
        match command {
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                Vec::new()
            }
            Command::Shutdown => Vec::new(),
            Command::Call { reply, .. } if !self.state().is_connected() => {
                debug!("rejecting call while not connected");
                let _ = reply.send(Err(GatewayError::NotConnected));
                Vec::new()
            }
            Command::Call { op, reply } => self.submit(op, reply),
        }
    }

    fn submit(&mut self, op: Operation, reply: Reply) -> Vec<Vec<Field>> {
        match op {
            Operation::ContractDetails(contract) => {
                let req_id = self.request_ids.next_id();
                let call = OutboundCall::ReqContractDetails { req_id, contract };
                self.issue(IdSpace::Request, req_id, reply, true, vec![call])
                    .unwrap_or_default()
            }
            Operation::HistoricalData(request) => {
                let req_id = self.request_ids.next_id();
                let call = OutboundCall::ReqHistoricalData { req_id, request };
                self.issue(IdSpace::Request, req_id, reply, true, vec![call])
                    .unwrap_or_default()
            }
            Operation::MktData(request) => {
                let req_id = self.request_ids.next_id();
                let contract = to_object(&request.contract);
                let call = OutboundCall::ReqMktData { req_id, request };
                let Some(frames) = self.issue(IdSpace::Request, req_id, reply, false, vec![call])
                else {
                    return Vec::new();
                };

                self.unflushed.push(Unflushed::MktData { req_id, contract });
                frames
            }
            Operation::CancelMktData(target) => self.cancel_mkt_data(target, reply),
            Operation::PlaceOrder { contract, order } => {
                let order_id = match self.order_ids.next_id() {
                    Ok(order_id) => order_id,
                    Err(err) => {
                        warn!("order placed before the server assigned order ids");
                        let _ = reply.send(Err(err));
                        return Vec::new();
                    }
                };
                let mut metadata = Map::new();
                metadata.insert("contract".to_string(), to_value(&contract));
                metadata.insert("order".to_string(), to_value(&order));
                let call = OutboundCall::PlaceOrder {
                    order_id,
                    contract,
                    order,
                };
                let Some(frames) = self.issue(IdSpace::Order, order_id, reply, false, vec![call])
                else {
                    return Vec::new();
                };

                self.unflushed.push(Unflushed::PlaceOrder { order_id, metadata });
                frames
            }
            Operation::CancelOrder(order_id) => {
                let call = OutboundCall::CancelOrder { order_id };
                let Some(frames) = self.issue(IdSpace::Order, order_id, reply, false, vec![call])
                else {
                    return Vec::new();
                };

                self.unflushed.push(Unflushed::CancelOrder { order_id });
                frames
            }
        }
    }

    /// The cancel is its own request: it gets a fresh request id and resolves
    /// with the ticker ids it canceled. The canceled lines themselves have no
    /// pending entry to settle.
    fn cancel_mkt_data(&mut self, target: CancelTarget, reply: Reply) -> Vec<Vec<Field>> {
        let req_id = self.request_ids.next_id();
        let targets = match target {
            CancelTarget::All => self.subscriptions.ids().to_vec(),
            CancelTarget::Id(ticker_id) => vec![ticker_id],
        };
        let calls = targets
            .iter()
            .map(|&ticker_id| OutboundCall::CancelMktData { req_id: ticker_id })
            .collect();

        let Some(frames) = self.issue(IdSpace::Request, req_id, reply, false, calls) else {
            return Vec::new();
        };

        self.unflushed.push(Unflushed::CancelMktData {
            req_id,
            all: target == CancelTarget::All,
            targets,
        });
        frames
    }

    /// The frames from the last [`Engine::handle_command`] reached the
    /// socket. Registry changes are applied and fire-and-forget calls resolve.
    ///
    /// If the write fails instead, [`Engine::on_disconnected`] fails them.
    pub(crate) fn on_flushed(&mut self) {
        for sent in std::mem::take(&mut self.unflushed) {
            match sent {
                Unflushed::MktData { req_id, contract } => {
                    self.subscriptions.add(req_id);
                    self.requests.set_metadata(req_id, contract);
                    self.requests.resolve(req_id);
                }
                Unflushed::CancelMktData {
                    req_id,
                    all,
                    targets,
                } => {
                    if all {
                        self.subscriptions.drain_all();
                    }
                    for ticker_id in &targets {
                        self.subscriptions.remove(*ticker_id);
                        self.requests.remove_metadata(*ticker_id);
                    }
                    info!(canceled = ?targets, "market data canceled");
                    self.requests.resolve_with(req_id, json!(targets));
                }
                Unflushed::PlaceOrder { order_id, metadata } => {
                    self.orders.set_metadata(order_id, metadata);
                    self.orders.resolve(order_id);
                }
                Unflushed::CancelOrder { order_id } => {
                    self.orders.resolve(order_id);
                }
            }
        }
    }

    /// Encode `calls`, then register the pending entry.
    ///
    /// Nothing is registered when encoding fails; the caller gets the codec
    /// error instead.
    fn issue(
        &mut self,
        space: IdSpace,
        id: i64,
        reply: Reply,
        streaming: bool,
        calls: Vec<OutboundCall>,
    ) -> Option<Vec<Vec<Field>>> {
        let label = calls.first().map_or("cancelMktData", OutboundCall::name);
        let server_version = self.server_version();

        let frames: std::result::Result<Vec<_>, _> = calls
            .iter()
            .map(|call| self.codec.encode(call, server_version))
            .collect();
        let frames = match frames {
            Ok(frames) => frames,
            Err(err) => {
                warn!(%space, id, label, error = %err, "cannot encode call");
                let _ = reply.send(Err(err.into()));
                return None;
            }
        };

        self.table_mut(space)
            .issue(id, label, reply, streaming)
            .ok()?;
        Some(frames)
    }

    fn table_mut(&mut self, space: IdSpace) -> &mut CorrelationTable {
        match space {
            IdSpace::Request => &mut self.requests,
            IdSpace::Order => &mut self.orders,
        }
    }

    /// Decode one inbound message and apply its events, in order.
    pub(crate) fn handle_message(&mut self, fields: &[String]) {
        match self.codec.decode(fields, self.server_version()) {
            Ok(events) => {
                for event in events {
                    self.on_event(event);
                }
            }
            Err(err) => warn!(error = %err, "dropping undecodable message"),
        }
    }

    pub(crate) fn on_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::NextValidId { order_id } => self.order_ids.seed(order_id),
            InboundEvent::Error { id, code, message } => self.on_error(id, code, message),
            InboundEvent::ContractDetails { req_id, details } => {
                self.requests.accumulate(req_id, to_value(&*details));
            }
            InboundEvent::ContractDetailsEnd { req_id } => {
                self.requests.resolve(req_id);
            }
            InboundEvent::HistoricalData { req_id, bar } => {
                self.requests.accumulate(req_id, to_value(&bar));
            }
            InboundEvent::HistoricalDataEnd { req_id, start, end } => {
                debug!(req_id, %start, %end, "historical data complete");
                self.requests.resolve(req_id);
            }
            InboundEvent::HistoricalDataUpdate { req_id, bar } => {
                self.publish_bar_update(req_id, &bar);
            }
            InboundEvent::TickPrice {
                req_id,
                tick_type,
                price,
                ..
            } => {
                let mut payload = Map::new();
                payload.insert("reqId".to_string(), json!(req_id));
                payload.insert("tickType".to_string(), json!(tick_type::name(tick_type)));
                payload.insert("price".to_string(), json!(price));
                self.fanout.publish(
                    Channel::TickPrice,
                    req_id,
                    payload,
                    self.requests.metadata(req_id),
                );
            }
            InboundEvent::TickSize {
                req_id,
                tick_type,
                size,
            } => {
                debug!(req_id, tick_type = tick_type::name(tick_type), size, "tick size");
            }
            InboundEvent::TickString {
                req_id,
                tick_type,
                value,
            } => {
                debug!(req_id, tick_type = tick_type::name(tick_type), %value, "tick string");
            }
            InboundEvent::TickGeneric {
                req_id,
                tick_type,
                value,
            } => {
                debug!(req_id, tick_type = tick_type::name(tick_type), value, "tick generic");
            }
            InboundEvent::OpenOrder {
                order_id, order, ..
            } => {
                self.fanout.publish(
                    Channel::OpenOrder,
                    order_id,
                    to_object(&*order),
                    self.orders.metadata(order_id),
                );
            }
            InboundEvent::OrderStatus(status) => self.publish_order_status(status),
            InboundEvent::Unknown { msg_id } => {
                debug!(msg_id, "unhandled message dropped");
            }
        }
    }

    fn publish_bar_update(&self, req_id: i64, bar: &Bar) {
        let mut payload = Map::new();
        payload.insert("reqId".to_string(), json!(req_id));
        payload.insert("barData".to_string(), to_value(bar));
        self.fanout.publish(
            Channel::HistoricalDataUpdate,
            req_id,
            payload,
            self.requests.metadata(req_id),
        );
    }

    fn publish_order_status(&mut self, status: OrderStatus) {
        let order_id = status.order_id;
        self.fanout.publish(
            Channel::OrderStatus,
            order_id,
            to_object(&status),
            self.orders.metadata(order_id),
        );
        if status.is_terminal() && self.orders.remove_metadata(order_id).is_some() {
            debug!(order_id, status = %status.status, "order finished, context dropped");
        }
    }

    /// Route a server error event.
    ///
    /// Informational codes are only logged. Anything else fails the pending
    /// request with that id (request space first, then order space), or, with
    /// nothing pending, drops a market-data line the server has given up on.
    fn on_error(&mut self, id: i64, code: i64, message: String) {
        if self.informational_codes.contains(&code) {
            info!(id, code, %message, "server notice");
            return;
        }
        error!(id, code, %message, "server error");

        let err = GatewayError::Api { id, code, message };
        if self.requests.fail(id, err.clone()) || self.orders.fail(id, err) {
            return;
        }
        if self.subscriptions.remove(id) {
            self.requests.remove_metadata(id);
            warn!(id, "market data line dropped by server");
        }
    }

    /// Diagnostic view of the connection and its bookkeeping.
    pub(crate) fn snapshot(&self) -> Value {
        json!({
            "state": self.state(),
            "serverVersion": self.server.as_ref().map(|s| s.server_version),
            "connectionTime": self.server.as_ref().map(|s| s.connection_time.clone()),
            "nextRequestId": self.request_ids.peek(),
            "nextOrderId": self.order_ids.peek(),
            "pendingRequests": self.requests.ids(),
            "pendingOrders": self.orders.ids(),
            "subscriptions": self.subscriptions.ids(),
        })
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        warn!(error = %err, "record not representable as json");
        Value::Null
    })
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match to_value(value) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
