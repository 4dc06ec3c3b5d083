use std::future::Future;

use sibi_transport::Connector;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::GatewayClient;
use crate::codec::Codec;
use crate::config::GatewayConfig;
use crate::engine::{Command, Engine};
use crate::fanout::FanOut;
use crate::session::{run_session, SessionEnd};
use crate::state::ConnectionState;

/// A running gateway: the connection task plus a handle to talk to it.
///
/// The task owns the socket, the correlation tables and both identifier
/// counters for as long as it runs; reconnects happen inside it and never
/// reset any of that state.
#[derive(Debug)]
pub struct Gateway {
    client: GatewayClient,
    task: JoinHandle<()>,
}

impl Gateway {
    /// Spawn the connection task on the current tokio runtime.
    ///
    /// Returns immediately; the first connect attempt happens in the
    /// background. Use [`GatewayClient::wait_connected`] to wait for it.
    pub fn start<C, K>(config: GatewayConfig, connector: C, codec: K) -> Self
    where
        C: Connector,
        K: Codec,
    {
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let fanout = FanOut::new(config.fanout_capacity);

        let engine = Engine::new(&config, Box::new(codec), fanout.clone(), state_tx);
        let client = GatewayClient::new(command_tx, state_rx, fanout);
        let task = tokio::spawn(supervise(config, connector, engine, command_rx));

        Self { client, task }
    }

    /// A new handle to the running gateway.
    pub fn client(&self) -> GatewayClient {
        self.client.clone()
    }

    /// Ask the connection task to stop and wait for it.
    ///
    /// Pending requests fail with [`crate::GatewayError::Shutdown`].
    pub async fn stop(self) {
        self.client.shutdown().await;
        if let Err(err) = self.task.await {
            warn!(error = %err, "gateway task ended abnormally");
        }
    }
}

/// Connect, run the session, sweep, back off, repeat, until shutdown.
///
/// Delays keep growing across sessions that drop soon after the handshake;
/// only a session that lasted `backoff_reset_after` brings them back down.
async fn supervise<C: Connector>(
    config: GatewayConfig,
    connector: C,
    mut engine: Engine,
    mut commands: mpsc::Receiver<Command>,
) {
    let endpoint = connector.endpoint();
    let mut backoff = config.backoff();

    loop {
        let delay = backoff.next_duration();
        if !delay.is_zero() {
            warn!(%endpoint, ?delay, "reconnecting after delay");
            let sleep = tokio::time::sleep(delay);
            if offline(sleep, &mut engine, &mut commands).await.is_none() {
                break;
            }
        }

        info!(%endpoint, "connecting");
        let stream = match offline(connector.connect(), &mut engine, &mut commands).await {
            None => break,
            Some(Ok(stream)) => stream,
            Some(Err(err)) => {
                warn!(%endpoint, error = %err, "connection attempt failed");
                continue;
            }
        };

        match run_session(stream, &config, &mut engine, &mut commands).await {
            SessionEnd::Shutdown => break,
            SessionEnd::Lost {
                reason,
                connected_for,
            } => {
                warn!(%endpoint, %reason, ?connected_for, "connection lost");
                engine.on_disconnected(&reason);
                if connected_for.is_some_and(|up| up >= config.backoff_reset_after) {
                    debug!(%endpoint, "session was healthy, reconnect delay reset");
                    backoff.reset();
                }
            }
        }
    }

    engine.on_shutdown();
}

/// Await `fut` while answering commands as "not connected".
///
/// Returns `None` if shutdown was requested in the meantime.
async fn offline<F: Future>(
    fut: F,
    engine: &mut Engine,
    commands: &mut mpsc::Receiver<Command>,
) -> Option<F::Output> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            output = &mut fut => return Some(output),
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => return None,
                Some(command) => {
                    engine.handle_command(command);
                }
            },
        }
    }
}
