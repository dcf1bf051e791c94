//! One rep-counting session per connection.
//!
//! Frames from a connection are processed strictly in order by the task that
//! owns the connection's `RepCounter`, so a `Reset` can never interleave with
//! a frame in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{Config, ExerciseKind};
use crate::protocol::{recv_message, send_message, ClientMessage, MessageStream, ServerMessage};
use crate::tracker::RepCounter;
use crate::GIT_VERSION;

struct Session {
    config: Arc<Config>,
    counter: RepCounter,
    /// クライアント時刻 0 に対応するローカル時刻
    epoch: Instant,
}

impl Session {
    fn new(config: Arc<Config>) -> Self {
        let counter = RepCounter::new(&config, config.app.exercise);
        Self {
            config,
            counter,
            epoch: Instant::now(),
        }
    }

    fn handle(&mut self, msg: ClientMessage) -> ServerMessage {
        match msg {
            ClientMessage::Frame {
                timestamp_us,
                landmarks,
            } => {
                let now = self.epoch + Duration::from_micros(timestamp_us);
                match self.counter.process_landmarks(&landmarks, now) {
                    Ok(output) => ServerMessage::Update {
                        phase: output.phase,
                        rep_count: self.counter.state().rep_count,
                        depth_inches: output.depth_inches,
                        effects: output.effects,
                    },
                    Err(e) => {
                        log::warn!("rejected frame at {}us: {}", timestamp_us, e);
                        ServerMessage::Error {
                            message: e.to_string(),
                        }
                    }
                }
            }
            ClientMessage::Reset => {
                self.counter.reset();
                self.ready()
            }
            ClientMessage::SelectExercise { name } => match name.parse::<ExerciseKind>() {
                Ok(kind) => {
                    log::info!("exercise -> {}", kind);
                    self.counter = RepCounter::new(&self.config, kind);
                    self.ready()
                }
                Err(e) => ServerMessage::Error {
                    message: e.to_string(),
                },
            },
            ClientMessage::RequestSummary => ServerMessage::Summary {
                reps: self.counter.summary(),
            },
        }
    }

    fn ready(&self) -> ServerMessage {
        ServerMessage::Ready {
            exercise: self.counter.kind(),
            version: GIT_VERSION.to_string(),
        }
    }
}

/// Serve one client until it disconnects.
pub async fn serve_connection<S>(mut stream: MessageStream<S>, config: Arc<Config>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(config);
    send_message(&mut stream, &session.ready()).await?;

    while let Some(msg) = recv_message::<S, ClientMessage>(&mut stream).await? {
        let reply = session.handle(msg);
        send_message(&mut stream, &reply).await?;
    }
    log::info!(
        "client closed after {} reps",
        session.counter.state().rep_count
    );
    Ok(())
}
