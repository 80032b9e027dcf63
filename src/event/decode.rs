use super::PositionReport;
use crate::state::EntityUpdate;
use std::fmt;

/// Decoding errors for draw-topic payloads
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Payload is not valid JSON or does not match the report shape
    Malformed(String),
    /// `pos` has fewer than two components
    ShortPosition(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(reason) => write!(f, "malformed position report: {}", reason),
            DecodeError::ShortPosition(len) => {
                write!(f, "pos must have at least 2 components, got {}", len)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result of looking at one message
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Position report on the draw topic
    Update(EntityUpdate),
    /// Message on some other subscribed topic; logged only
    Irrelevant,
}

/// Turns draw-topic payloads into entity updates.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    draw_topic: String,
}

impl MessageDecoder {
    pub fn new(draw_topic: impl Into<String>) -> Self {
        Self {
            draw_topic: draw_topic.into(),
        }
    }

    pub fn draw_topic(&self) -> &str {
        &self.draw_topic
    }

    /// True if messages on `topic` update drawn state
    pub fn is_draw_topic(&self, topic: &str) -> bool {
        topic == self.draw_topic
    }

    /// Decode a message.
    ///
    /// Topic matching is exact. Extra JSON fields and extra `pos` components
    /// are ignored.
    pub fn decode(&self, topic: &str, payload: &[u8]) -> Result<Decoded, DecodeError> {
        if !self.is_draw_topic(topic) {
            return Ok(Decoded::Irrelevant);
        }

        decode_report(payload).map(Decoded::Update)
    }
}

/// Parse a position report payload regardless of topic
fn decode_report(payload: &[u8]) -> Result<EntityUpdate, DecodeError> {
    let report: PositionReport = serde_json::from_slice(payload)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    if report.pos.len() < 2 {
        return Err(DecodeError::ShortPosition(report.pos.len()));
    }

    Ok(EntityUpdate {
        id: report.id,
        position: (report.pos[0], report.pos[1]),
        label: report.msg,
    })
}
