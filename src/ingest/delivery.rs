use super::IngestionHandler;
use crate::dump::DumpSink;
use crate::shutdown::{self, ShutdownSignal};
use crate::transport::Transport;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Pump-and-ingest half of the loop, run on its own thread next to a window.
///
/// A window only runs code when the platform gives it frames. This loop
/// keeps feeding the store and the dump while it gets none, and is the one
/// that notices the shutdown flag and closes the dump.
pub struct DeliveryLoop<T> {
    transport: T,
    ingest: IngestionHandler,
    sink: Arc<DumpSink>,
    pump_timeout: Duration,
    shutdown: ShutdownSignal,
}

impl<T: Transport> DeliveryLoop<T> {
    pub fn new(
        transport: T,
        ingest: IngestionHandler,
        sink: Arc<DumpSink>,
        pump_timeout: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            transport,
            ingest,
            sink,
            pump_timeout,
            shutdown,
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Messages handled so far
    pub fn received(&self) -> u64 {
        self.ingest.received()
    }

    /// Pump until shutdown is requested or the transport fails.
    ///
    /// `wake` runs after every pump step that delivered messages and once
    /// more on the way out. The dump is flushed and closed on every return.
    pub fn run(&mut self, wake: &dyn Fn()) -> Result<()> {
        info!("Delivery loop running");

        let pumped = self.pump_until_shutdown(wake);
        let closed = shutdown::finish(&self.sink);
        wake();

        info!(received = self.ingest.received(), "Delivery loop stopped");
        pumped.and(closed)
    }

    fn pump_until_shutdown(&mut self, wake: &dyn Fn()) -> Result<()> {
        while !self.shutdown.is_requested() {
            let ingest = &mut self.ingest;
            let delivered = self
                .transport
                .pump(self.pump_timeout, &mut |message| {
                    ingest.handle(message);
                })
                .context("Transport pump failed")?;

            if delivered > 0 {
                debug!(delivered = delivered, "Pump step delivered messages");
                wake();
            }
        }
        Ok(())
    }
}
