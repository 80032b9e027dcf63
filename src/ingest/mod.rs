use crate::dump::{format_line, DumpSink};
use crate::event::{Decoded, MessageDecoder, RawMessage};
use crate::state::EntityStore;
use std::sync::Arc;
use tracing::{info, warn};

mod delivery;


pub use delivery::DeliveryLoop;

/// Log target of the per-message echo. Enabled by the default filter;
/// `RUST_LOG=radarview=info,radarview::traffic=off` silences it.
pub const TRAFFIC_TARGET: &str = "radarview::traffic";

/// Console echo of a message: its dump line without the newline
fn echo_line(message: &RawMessage) -> String {
    let line = format_line(message);
    String::from_utf8_lossy(line.strip_suffix(b"\n").unwrap_or(&line)).into_owned()
}

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Draw-topic report applied to the store for this entity id
    Updated(u64),
    /// Not on the draw topic; dumped only
    Irrelevant,
    /// Draw-topic payload that failed to decode; dumped only
    Rejected,
}

/// Reaction to each delivered message: dump it, then decode and apply it.
///
/// Every failure is absorbed here and reported as a diagnostic, so nothing
/// unwinds into the transport's delivery path.
pub struct IngestionHandler {
    decoder: MessageDecoder,
    store: Arc<EntityStore>,
    sink: Arc<DumpSink>,
    flush_every: u64,
    received: u64,
}

impl IngestionHandler {
    pub fn new(
        decoder: MessageDecoder,
        store: Arc<EntityStore>,
        sink: Arc<DumpSink>,
        flush_every: u64,
    ) -> Self {
        Self {
            decoder,
            store,
            sink,
            flush_every: flush_every.max(1),
            received: 0,
        }
    }

    /// Messages handled so far
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn handle(&mut self, message: RawMessage) -> IngestOutcome {
        self.received += 1;

        info!(target: TRAFFIC_TARGET, "{}", echo_line(&message));

        // The dump captures all traffic, decodable or not
        if let Err(e) = self.sink.append(&message) {
            warn!(topic = %message.topic, error = %e, "Failed to dump message, dropping it from the log");
        }

        if self.received % self.flush_every == 0 {
            if let Err(e) = self.sink.flush() {
                warn!(error = %e, "Failed to flush dump");
            }
            info!(received = self.received, "Received {} messages", self.received);
        }

        match self.decoder.decode(&message.topic, &message.payload) {
            Ok(Decoded::Update(update)) => {
                let id = update.id;
                self.store.apply(update);
                IngestOutcome::Updated(id)
            }
            Ok(Decoded::Irrelevant) => IngestOutcome::Irrelevant,
            Err(e) => {
                warn!(
                    topic = %message.topic,
                    error = %e,
                    "Malformed position report, skipping"
                );
                IngestOutcome::Rejected
            }
        }
    }
}
