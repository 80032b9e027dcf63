use crate::event::RawMessage;
use crate::transport::Transport;
use anyhow::{bail, Context, Result};
use chrono::Local;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Channel capacity for incoming messages (applies backpressure when full)
const MESSAGE_CHANNEL_CAPACITY: usize = 4096;

/// Transport configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    /// Broker address
    #[serde(default = "default_url")]
    pub url: String,

    /// Subjects to subscribe to; every message on them is dumped
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// The one subject whose messages update drawn state
    #[serde(default = "default_draw_topic")]
    pub draw_topic: String,

    /// Longest wait for a message in one pump step
    #[serde(default = "default_pump_timeout_ms")]
    pub pump_timeout_ms: u64,

    /// Upper bound on messages dispatched in one pump step
    #[serde(default = "default_max_messages_per_pump")]
    pub max_messages_per_pump: usize,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_topics() -> Vec<String> {
    vec![default_draw_topic()]
}

fn default_draw_topic() -> String {
    "radar_debug".to_string()
}

fn default_pump_timeout_ms() -> u64 {
    1
}

fn default_max_messages_per_pump() -> usize {
    256
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            topics: default_topics(),
            draw_topic: default_draw_topic(),
            pump_timeout_ms: default_pump_timeout_ms(),
            max_messages_per_pump: default_max_messages_per_pump(),
        }
    }
}

/// NATS-backed transport.
///
/// The client and one forwarding task per subscription run on the tokio
/// runtime; they only move raw messages into a bounded channel. All
/// ingestion happens in `pump`, on the caller's thread.
pub struct NatsTransport {
    runtime: Handle,
    client: async_nats::Client,
    message_tx: mpsc::Sender<RawMessage>,
    message_rx: mpsc::Receiver<RawMessage>,
    subscriptions: Vec<(String, JoinHandle<()>)>,
    max_messages_per_pump: usize,
}

impl NatsTransport {
    /// Connect to the broker.
    ///
    /// Must not be called from inside the runtime, since it blocks on it.
    pub fn connect(runtime: Handle, config: &NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = runtime
            .block_on(async_nats::connect(config.url.as_str()))
            .with_context(|| format!("Failed to connect to NATS at {}", config.url))?;

        info!("Connected to NATS at {}", config.url);

        let (message_tx, message_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);

        Ok(Self {
            runtime,
            client,
            message_tx,
            message_rx,
            subscriptions: Vec::new(),
            max_messages_per_pump: config.max_messages_per_pump.max(1),
        })
    }

    /// Subjects currently subscribed
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.subscriptions.iter().map(|(t, _)| t.clone()).collect()
    }

    fn all_subscriptions_ended(&self) -> bool {
        !self.subscriptions.is_empty() && self.subscriptions.iter().all(|(_, h)| h.is_finished())
    }
}

impl Transport for NatsTransport {
    fn subscribe(&mut self, topic: &str) -> Result<()> {
        if self.subscriptions.iter().any(|(t, _)| t == topic) {
            warn!("Already subscribed to {}", topic);
            return Ok(());
        }

        let mut subscriber = self
            .runtime
            .block_on(self.client.subscribe(topic.to_string()))
            .with_context(|| format!("Failed to subscribe to '{}'", topic))?;

        let tx = self.message_tx.clone();
        let name = topic.to_string();

        let handle = self.runtime.spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let raw = RawMessage {
                    topic: msg.subject.to_string(),
                    payload: msg.payload.to_vec(),
                    received_at: Local::now(),
                };

                if tx.send(raw).await.is_err() {
                    debug!(topic = %name, "Message receiver dropped");
                    return;
                }
            }
            warn!(topic = %name, "Subscription stream ended");
        });

        self.subscriptions.push((topic.to_string(), handle));
        info!("Subscribed to {}", topic);

        Ok(())
    }

    fn pump(&mut self, timeout: Duration, handler: &mut dyn FnMut(RawMessage)) -> Result<usize> {
        let rx = &mut self.message_rx;
        let first = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, rx.recv()).await });

        let first = match first {
            Ok(Some(message)) => message,
            // Cannot happen while we hold a sender, but treat it as fatal
            Ok(None) => bail!("NATS message channel closed"),
            Err(_elapsed) => {
                if self.all_subscriptions_ended() {
                    bail!("All NATS subscriptions have ended");
                }
                return Ok(0);
            }
        };

        handler(first);
        let mut delivered = 1;

        while delivered < self.max_messages_per_pump {
            match self.message_rx.try_recv() {
                Ok(message) => {
                    handler(message);
                    delivered += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        Ok(delivered)
    }
}

impl Drop for NatsTransport {
    fn drop(&mut self) {
        for (_, handle) in &self.subscriptions {
            handle.abort();
        }
    }
}
