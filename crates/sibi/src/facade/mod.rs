//! JSON-lines facade over TCP.
//!
//! Downstream programs talk to the gateway through this listener. Each line a
//! client sends is one request:
//!
//! ```text
//! {"id": 1, "method": "reqMktData", "params": {"symbol": "AAPL", "secType": "STK"}}
//! ```
//!
//! and gets exactly one reply line echoing its `id`, either
//! `{"id": 1, "result": ...}` or `{"id": 1, "error": {"kind": ..., "message": ...}}`.
//! Replies come back in completion order, not request order. After a
//! `subscribe` call, events from the named channels are interleaved as
//! `{"channel": "tickPrice", "reqId": 1, "data": {...}}`.
//!
//! Methods: `reqContractDetails`, `reqHistoricalData`, `reqMktData`,
//! `cancelMktData`, `placeOrder`, `cancelOrder`, `subscribe`, `status`.

mod error;
mod params;
mod protocol;

pub use error::{FacadeError, Result};
pub use protocol::{ErrorBody, Event, Request, Response};

use std::collections::HashSet;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sibi_gateway::{GatewayClient, Subscription};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7080";
pub const DEFAULT_MAX_CONNECTIONS: usize = 49;
/// Longest accepted request line in bytes. Default: 1 MiB.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Configuration for the facade listener.
#[derive(Debug, Clone)]
pub struct FacadeConfig {
    /// Address to bind, `host:port`.
    pub listen_addr: String,
    /// Concurrent client connections; further clients wait to be accepted.
    pub max_connections: usize,
    pub max_line_length: usize,
    /// Reply and event lines buffered per connection before the writer
    /// applies backpressure.
    pub outbound_capacity: usize,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            outbound_capacity: 1024,
        }
    }
}

impl FacadeConfig {
    pub fn with_listen_addr(mut self, listen_addr: impl Into<String>) -> Self {
        self.listen_addr = listen_addr.into();
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }
}

/// A bound facade listener.
#[derive(Debug)]
pub struct Facade {
    listener: TcpListener,
    config: FacadeConfig,
    client: GatewayClient,
}

impl Facade {
    /// Bind the listener. Connections are not accepted until [`Facade::serve`].
    pub async fn bind(config: FacadeConfig, client: GatewayClient) -> io::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr.as_str()).await?;
        Ok(Self {
            listener,
            config,
            client,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve clients until `shutdown` completes, then close every
    /// open client connection.
    pub async fn serve<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let permits = Arc::new(Semaphore::new(self.config.max_connections.max(1)));
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = permits.clone().acquire_owned() => {
                    permit.map_err(|_| io::Error::other("connection limiter closed"))?
                }
            };

            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                },
            };

            let client = self.client.clone();
            let config = self.config.clone();
            connections.spawn(async move {
                serve_connection(stream, peer, client, &config).await;
                drop(permit);
            });

            while connections.try_join_next().is_some() {}
        }

        info!(open = connections.len(), "facade shutting down");
        connections.shutdown().await;
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    client: GatewayClient,
    config: &FacadeConfig,
) {
    info!(%peer, "facade client connected");
    let codec = LinesCodec::new_with_max_length(config.max_line_length);
    let (mut sink, mut lines) = Framed::new(stream, codec).split();

    let (out_tx, mut out_rx) = mpsc::channel::<String>(config.outbound_capacity.max(1));
    let writer = tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            if let Err(err) = sink.send(line).await {
                debug!(%peer, error = %err, "facade write failed");
                break;
            }
        }
    });

    let mut tasks = JoinSet::new();
    let mut subscribed = HashSet::new();

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                let err = FacadeError::InvalidRequest("line too long".to_string());
                let reply = Response::failure(Value::Null, &err);
                if out_tx.send(reply.to_line()).await.is_err() {
                    break;
                }
                continue;
            }
            Err(LinesCodecError::Io(err)) => {
                debug!(%peer, error = %err, "facade read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request = match Request::parse(&line) {
            Ok(request) => request,
            Err(err) => {
                let reply = Response::failure(Value::Null, &err);
                if out_tx.send(reply.to_line()).await.is_err() {
                    break;
                }
                continue;
            }
        };
        debug!(%peer, id = %request.id, method = %request.method, "facade request");

        if request.method == "subscribe" {
            let reply = match params::subscribe(request.params) {
                Ok(channels) => {
                    let mut names = Vec::with_capacity(channels.len());
                    for channel in channels {
                        if subscribed.insert(channel) {
                            let subscription = client.subscribe(channel);
                            tasks.spawn(forward_events(subscription, out_tx.clone()));
                        }
                        names.push(channel.name());
                    }
                    Response::success(request.id, json!({ "subscribed": names }))
                }
                Err(err) => Response::failure(request.id, &err),
            };
            if out_tx.send(reply.to_line()).await.is_err() {
                break;
            }
        } else {
            let client = client.clone();
            let out_tx = out_tx.clone();
            tasks.spawn(async move {
                let reply = dispatch(&client, request).await;
                let _ = out_tx.send(reply.to_line()).await;
            });
        }

        while tasks.try_join_next().is_some() {}
    }

    tasks.shutdown().await;
    drop(out_tx);
    let _ = writer.await;
    info!(%peer, "facade client disconnected");
}

/// Push events to one facade client until it goes away.
async fn forward_events(mut subscription: Subscription, out: mpsc::Sender<String>) {
    while let Some(published) = subscription.next().await {
        let Some(event) = Event::from_published(&published) else {
            warn!(channel = %published.channel, id = published.id, "dropping non-JSON event");
            continue;
        };
        if out.send(event.to_line()).await.is_err() {
            break;
        }
    }
}

/// Run one request against the gateway and build its reply.
///
/// `subscribe` is connection-scoped and handled by the connection loop, so it
/// is an unknown method here.
pub async fn dispatch(client: &GatewayClient, request: Request) -> Response {
    let Request { id, method, params } = request;
    match call(client, &method, params).await {
        Ok(result) => Response::success(id, result),
        Err(err) => {
            debug!(%id, %method, error = %err, "facade request failed");
            Response::failure(id, &err)
        }
    }
}

async fn call(client: &GatewayClient, method: &str, params: Value) -> Result<Value> {
    let result = match method {
        "reqContractDetails" => {
            client
                .req_contract_details(params::contract_details(params)?)
                .await?
        }
        "reqHistoricalData" => {
            client
                .req_historical_data(params::historical_data(params)?)
                .await?
        }
        "reqMktData" => client.req_mkt_data(params::mkt_data(params)?).await?,
        "cancelMktData" => {
            client
                .cancel_mkt_data(params::cancel_mkt_data(params)?)
                .await?
        }
        "placeOrder" => {
            let (contract, order) = params::place_order(params)?;
            client.place_order(contract, order).await?
        }
        "cancelOrder" => client.cancel_order(params::cancel_order(params)?).await?,
        "status" => client.snapshot().await?,
        other => return Err(FacadeError::UnknownMethod(other.to_string())),
    };
    Ok(result)
}
