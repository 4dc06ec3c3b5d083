//! One persistent connection to a trading gateway, shared by many callers.
//!
//! This is the "just works" layer. [`Gateway::start`] spawns a task that
//! connects, performs the handshake, and reconnects with backoff whenever the
//! socket drops. [`GatewayClient`] handles issue correlated requests through
//! it and subscribe to pushed events on named [`Channel`]s.
//!
//! Application field layouts live behind the [`Codec`] trait; [`TwsCodec`]
//! covers the messages this crate needs.

pub mod backoff;
pub mod client;
pub mod codec;
pub mod config;
pub mod correlation;
mod engine;
pub mod error;
pub mod fanout;
pub mod handshake;
pub mod ids;
pub mod models;
mod session;
pub mod state;
pub mod subscriptions;
pub mod supervisor;

pub use backoff::ExponentialBackoff;
pub use client::GatewayClient;
pub use codec::{Codec, CodecError, InboundEvent, OutboundCall, TwsCodec};
pub use config::{GatewayConfig, DEFAULT_INFORMATIONAL_CODES};
pub use correlation::{CorrelationTable, IdSpace};
pub use error::{GatewayError, Result};
pub use fanout::{Channel, FanOut, Published, Subscription, UnknownChannel};
pub use handshake::{
    encode_handshake, handshake_blocking, parse_reply, HandshakeConfig, HandshakeResult,
};
pub use models::{
    Bar, CancelTarget, ComboLeg, Contract, ContractDetails, HistoricalDataRequest,
    MarketDataRequest, Order, OrderStatus, CANCEL_ALL,
};
pub use state::ConnectionState;
pub use subscriptions::SubscriptionRegistry;
pub use supervisor::Gateway;
