//! The seam between the connection machinery and the application protocol.
//!
//! The session only ever sees [`OutboundCall`]s going out and
//! [`InboundEvent`]s coming in; how those map to wire fields is the job of a
//! [`Codec`]. [`TwsCodec`] covers the message subset this gateway uses.

mod cursor;
pub mod tick_type;
mod tws;

use sibi_frame::Field;

use crate::models::{
    Bar, Contract, ContractDetails, HistoricalDataRequest, MarketDataRequest, Order, OrderStatus,
};

pub use cursor::FieldCursor;
pub use tws::TwsCodec;

/// Errors raised while translating between calls/events and wire fields.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// The message carried no fields at all.
    #[error("empty message")]
    Empty,

    /// The message ended before a required field.
    #[error("message {msg_id} truncated: missing {field}")]
    Truncated { msg_id: i64, field: &'static str },

    /// A field could not be parsed as the expected type.
    #[error("message {msg_id}: invalid {field} '{value}'")]
    InvalidValue {
        msg_id: i64,
        field: &'static str,
        value: String,
    },

    /// The connected server is too old for this call.
    #[error("{call} requires server version {required}, connected to {actual}")]
    Unsupported {
        call: &'static str,
        required: i32,
        actual: i32,
    },
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Outbound application calls.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCall {
    /// Sent once right after the handshake. No reply is expected.
    StartApi {
        client_id: i64,
        optional_capabilities: String,
    },
    ReqContractDetails {
        req_id: i64,
        contract: Contract,
    },
    ReqHistoricalData {
        req_id: i64,
        request: HistoricalDataRequest,
    },
    ReqMktData {
        req_id: i64,
        request: MarketDataRequest,
    },
    CancelMktData {
        req_id: i64,
    },
    PlaceOrder {
        order_id: i64,
        contract: Contract,
        order: Order,
    },
    CancelOrder {
        order_id: i64,
    },
}

impl OutboundCall {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundCall::StartApi { .. } => "startApi",
            OutboundCall::ReqContractDetails { .. } => "reqContractDetails",
            OutboundCall::ReqHistoricalData { .. } => "reqHistoricalData",
            OutboundCall::ReqMktData { .. } => "reqMktData",
            OutboundCall::CancelMktData { .. } => "cancelMktData",
            OutboundCall::PlaceOrder { .. } => "placeOrder",
            OutboundCall::CancelOrder { .. } => "cancelOrder",
        }
    }
}

/// Decoded inbound events.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NextValidId {
        order_id: i64,
    },
    Error {
        id: i64,
        code: i64,
        message: String,
    },
    ContractDetails {
        req_id: i64,
        details: Box<ContractDetails>,
    },
    ContractDetailsEnd {
        req_id: i64,
    },
    HistoricalData {
        req_id: i64,
        bar: Bar,
    },
    HistoricalDataEnd {
        req_id: i64,
        start: String,
        end: String,
    },
    HistoricalDataUpdate {
        req_id: i64,
        bar: Bar,
    },
    TickPrice {
        req_id: i64,
        tick_type: i64,
        price: f64,
        size: f64,
    },
    TickSize {
        req_id: i64,
        tick_type: i64,
        size: f64,
    },
    TickString {
        req_id: i64,
        tick_type: i64,
        value: String,
    },
    TickGeneric {
        req_id: i64,
        tick_type: i64,
        value: f64,
    },
    OpenOrder {
        order_id: i64,
        contract: Box<Contract>,
        order: Box<Order>,
    },
    OrderStatus(OrderStatus),
    /// A message id the codec does not handle.
    Unknown {
        msg_id: i64,
    },
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::NextValidId { .. } => "nextValidId",
            InboundEvent::Error { .. } => "error",
            InboundEvent::ContractDetails { .. } => "contractDetails",
            InboundEvent::ContractDetailsEnd { .. } => "contractDetailsEnd",
            InboundEvent::HistoricalData { .. } => "historicalData",
            InboundEvent::HistoricalDataEnd { .. } => "historicalDataEnd",
            InboundEvent::HistoricalDataUpdate { .. } => "historicalDataUpdate",
            InboundEvent::TickPrice { .. } => "tickPrice",
            InboundEvent::TickSize { .. } => "tickSize",
            InboundEvent::TickString { .. } => "tickString",
            InboundEvent::TickGeneric { .. } => "tickGeneric",
            InboundEvent::OpenOrder { .. } => "openOrder",
            InboundEvent::OrderStatus(_) => "orderStatus",
            InboundEvent::Unknown { .. } => "unknown",
        }
    }
}

/// Translates application calls and events to and from wire fields.
///
/// Implementations must be pure: the session calls them from its own task
/// and never shares a codec across connections in a way that relies on state.
pub trait Codec: Send + Sync + 'static {
    /// Fields for one outbound message.
    fn encode(&self, call: &OutboundCall, server_version: i32) -> Result<Vec<Field>>;

    /// Events carried by one inbound message. A single message may carry
    /// several (a block of bars followed by its end marker, for instance).
    fn decode(&self, fields: &[String], server_version: i32) -> Result<Vec<InboundEvent>>;
}
