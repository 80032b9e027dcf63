use crate::event::RawMessage;
use anyhow::Result;
use std::collections::VecDeque;
use std::time::Duration;

/// Publish/subscribe transport as seen by the pumping loop.
///
/// Connecting happens when the transport is constructed. `pump` is the only
/// place messages reach the application: it runs on the caller's thread and
/// hands each queued message to `handler` before returning.
pub trait Transport {
    /// Subscribe to a topic
    fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Deliver pending messages to `handler`.
    ///
    /// Waits at most `timeout` for the first message, then drains what is
    /// already queued without waiting. Returns the number delivered. An error
    /// means the transport can no longer deliver anything.
    fn pump(&mut self, timeout: Duration, handler: &mut dyn FnMut(RawMessage)) -> Result<usize>;
}

/// In-process transport fed by `push`; delivers only subscribed topics.
#[derive(Debug, Default)]
pub struct QueueTransport {
    topics: Vec<String>,
    queue: VecDeque<RawMessage>,
}

impl QueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message as if it had arrived from the broker
    pub fn push(&mut self, message: RawMessage) {
        if self.topics.iter().any(|t| *t == message.topic) {
            self.queue.push_back(message);
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Transport for QueueTransport {
    fn subscribe(&mut self, topic: &str) -> Result<()> {
        if !self.topics.iter().any(|t| t == topic) {
            self.topics.push(topic.to_string());
        }
        Ok(())
    }

    fn pump(&mut self, _timeout: Duration, handler: &mut dyn FnMut(RawMessage)) -> Result<usize> {
        let mut delivered = 0;
        while let Some(message) = self.queue.pop_front() {
            handler(message);
            delivered += 1;
        }
        Ok(delivered)
    }
}
