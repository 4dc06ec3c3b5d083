use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use sibi_frame::{Field, FieldCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use crate::config::GatewayConfig;
use crate::engine::{Command, Engine};
use crate::handshake::{encode_handshake, parse_reply};
use crate::state::ConnectionState;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// Shutdown was requested, or every client handle is gone.
    Shutdown,
    /// The connection failed; the supervisor should reconnect.
    Lost {
        reason: String,
        /// Time spent connected, or `None` when the handshake never completed.
        connected_for: Option<Duration>,
    },
}

impl SessionEnd {
    fn lost(reason: impl Into<String>, connected_at: Option<Instant>) -> Self {
        SessionEnd::Lost {
            reason: reason.into(),
            connected_for: connected_at.map(|at| at.elapsed()),
        }
    }
}

/// Drive one connected stream until it fails or the gateway shuts down.
///
/// Sends the handshake, waits for the reply, then pumps commands out and
/// messages in. The idle timer is armed by every send and disarmed by every
/// inbound frame; if it fires the connection is dropped.
pub(crate) async fn run_session<S>(
    stream: S,
    config: &GatewayConfig,
    engine: &mut Engine,
    commands: &mut mpsc::Receiver<Command>,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, FieldCodec::with_max_payload(config.max_payload_size));

    let hello = match encode_handshake(&config.handshake) {
        Ok(hello) => hello,
        Err(err) => return SessionEnd::lost(err.to_string(), None),
    };
    engine.on_connecting();
    if let Err(err) = framed.send(hello).await {
        return SessionEnd::lost(format!("handshake send failed: {err}"), None);
    }
    debug!(range = %config.handshake.version_range(), "handshake sent");

    let handshake_wait = config.idle_timeout.min(config.handshake.timeout);
    let idle = time::sleep(handshake_wait);
    tokio::pin!(idle);
    let mut idle_armed = true;

    let mut sweep = config.request_timeout.map(sweep_interval);
    let mut connected_at = None;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let command = match command {
                    None | Some(Command::Shutdown) => return SessionEnd::Shutdown,
                    Some(command) => command,
                };

                let frames = engine.handle_command(command);
                if !frames.is_empty() {
                    if let Err(reason) = send_all(&mut framed, frames).await {
                        return SessionEnd::lost(reason, connected_at);
                    }
                    idle.as_mut().reset(Instant::now() + config.idle_timeout);
                    idle_armed = true;
                }
                engine.on_flushed();
            }

            frame = framed.next() => {
                let fields = match frame {
                    Some(Ok(fields)) => fields,
                    Some(Err(err)) => {
                        return SessionEnd::lost(format!("read failed: {err}"), connected_at)
                    }
                    None => return SessionEnd::lost("connection closed by peer", connected_at),
                };
                idle_armed = false;
                trace!(fields = fields.len(), "message received");

                if engine.state() != ConnectionState::Connecting {
                    engine.handle_message(&fields);
                    continue;
                }

                let start = match parse_reply(&fields, &config.handshake)
                    .and_then(|result| engine.on_handshake(result))
                {
                    Ok(start) => start,
                    Err(err) => return SessionEnd::lost(err.to_string(), None),
                };
                connected_at = Some(Instant::now());
                if let Err(reason) = send_all(&mut framed, vec![start]).await {
                    return SessionEnd::lost(reason, connected_at);
                }
                idle.as_mut().reset(Instant::now() + config.idle_timeout);
                idle_armed = true;
            }

            () = &mut idle, if idle_armed => {
                let state = engine.state();
                warn!(%state, "no data received before idle timeout");
                return SessionEnd::lost("idle timeout", connected_at);
            }

            () = tick(&mut sweep) => {
                if let Some(timeout) = config.request_timeout {
                    engine.expire(timeout);
                }
            }
        }
    }
}

/// Queue every frame, then flush once. Frames go out in order.
async fn send_all<S>(
    framed: &mut Framed<S, FieldCodec>,
    frames: Vec<Vec<Field>>,
) -> Result<(), String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let count = frames.len();
    for frame in frames {
        framed
            .feed(frame)
            .await
            .map_err(|err| format!("write failed: {err}"))?;
    }
    SinkExt::<Vec<Field>>::flush(framed)
        .await
        .map_err(|err| format!("write failed: {err}"))?;
    trace!(count, "messages sent");
    Ok(())
}

fn sweep_interval(timeout: Duration) -> Interval {
    let period = (timeout / 4).max(Duration::from_millis(10));
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
