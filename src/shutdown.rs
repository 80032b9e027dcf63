use crate::dump::DumpSink;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info};

/// Process-wide stop request.
///
/// The signal listener only sets the flag. Whichever loop pumps the
/// transport (`RenderLoop` headless, `DeliveryLoop` beside a window) checks
/// it before every pump step and does the flush and close itself.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Listen for Ctrl-C on `runtime` and turn it into a stop request
    pub fn listen(&self, runtime: &Handle) {
        let signal = self.clone();
        runtime.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received, exiting...");
                    signal.request();
                }
                Err(e) => error!(error = %e, "Failed to listen for ctrl_c signal"),
            }
        });
    }
}

/// Flush and close the dump. Safe to call again after it already ran.
pub fn finish(sink: &DumpSink) -> Result<()> {
    if !sink.is_closed() {
        // A flush failure still leaves close to try finishing the frame
        if let Err(e) = sink.flush() {
            error!(error = %e, "Failed to flush dump before close");
        }
    }
    sink.close().context("Failed to close dump")
}
