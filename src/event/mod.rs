use chrono::{DateTime, Local};
use serde::Deserialize;

mod decode;
#[cfg(test)]
mod tests;

pub use decode::{DecodeError, Decoded, MessageDecoder};

/// RawMessage is one message as delivered by the transport.
///
/// It lives only for one ingestion call; the payload is kept as raw bytes so
/// the dump receives exactly what arrived on the wire.
#[derive(Clone, Debug)]
pub struct RawMessage {
    /// Topic (subject) the message was published on
    pub topic: String,

    /// Raw payload bytes, not necessarily UTF-8
    pub payload: Vec<u8>,

    /// Local wall-clock time at arrival
    pub received_at: DateTime<Local>,
}

impl RawMessage {
    /// Build a message stamped with the current local time
    pub fn now(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Local::now(),
        }
    }
}

/// Wire shape of a position report on the draw topic:
/// `{"pos": [x, y, ...], "id": n, "msg": "..."}`
#[derive(Debug, Deserialize)]
pub(crate) struct PositionReport {
    pub pos: Vec<f64>,
    pub id: u64,
    pub msg: String,
}
