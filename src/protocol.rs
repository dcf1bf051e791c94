//! TCP protocol between a landmark source and the rep server.
//!
//! Each message is a bincode body behind a 4-byte length prefix.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::config::ExerciseKind;
use crate::pose::Landmark;
use crate::tracker::{Effect, Phase, RepScore};

const MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Landmark source → server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Frame { timestamp_us: u64, landmarks: Vec<Landmark> },
    Reset,
    SelectExercise { name: String },
    RequestSummary,
}

/// Server → landmark source
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Ready { exercise: ExerciseKind, version: String },
    Update {
        phase: Phase,
        rep_count: u32,
        depth_inches: Option<f32>,
        effects: Vec<Effect>,
    },
    Summary { reps: Vec<RepScore> },
    Error { message: String },
}

// --- codec helpers ---

pub type MessageStream<S = TcpStream> = Framed<S, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream<S: AsyncRead + AsyncWrite>(stream: S) -> MessageStream<S> {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<S, T>(stream: &mut MessageStream<S>, msg: &T) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Serialize,
{
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message. `Ok(None)` when the peer closed.
pub async fn recv_message<S, T>(stream: &mut MessageStream<S>) -> anyhow::Result<Option<T>>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: DeserializeOwned,
{
    match stream.next().await {
        Some(Ok(bytes)) => Ok(Some(bincode::deserialize(&bytes)?)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}
