// Render loop and drawing surface interface

mod marker;

pub use marker::{
    Category, FieldTransform, Marker, CATEGORY_OFFSET, LABEL_OFFSET, MARKER_RADIUS, TAG_OFFSET,
    TEXT_COLOR,
};

use crate::dump::DumpSink;
use crate::ingest::IngestionHandler;
use crate::shutdown::{self, ShutdownSignal};
use crate::state::EntityStore;
use crate::transport::Transport;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};


/// Where frames are drawn.
///
/// `begin_frame` starts from an untouched copy of the background; markers
/// are drawn over it and `present` shows the result.
pub trait Surface {
    fn begin_frame(&mut self) -> Result<()>;

    fn draw_marker(&mut self, marker: &Marker) -> Result<()>;

    fn present(&mut self) -> Result<()>;

    /// True if any key was pressed since the last poll. Never blocks.
    fn poll_key(&mut self) -> bool;
}

/// Surface for running without a display: draws nothing, never sees keys
#[derive(Debug, Default)]
pub struct HeadlessSurface;

impl Surface for HeadlessSurface {
    fn begin_frame(&mut self) -> Result<()> {
        Ok(())
    }

    fn draw_marker(&mut self, _marker: &Marker) -> Result<()> {
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        Ok(())
    }

    fn poll_key(&mut self) -> bool {
        false
    }
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Shutdown was requested and the dump has been closed
    Exit,
}

/// Drawing half of an iteration: snapshot, draw, present, clear on key
pub struct Overlay {
    store: Arc<EntityStore>,
    transform: FieldTransform,
    frames: u64,
}

impl Overlay {
    pub fn new(store: Arc<EntityStore>, transform: FieldTransform) -> Self {
        Self {
            store,
            transform,
            frames: 0,
        }
    }

    /// Frames drawn so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Markers for the current store contents
    pub fn markers(&self) -> Vec<Marker> {
        self.store
            .snapshot()
            .iter()
            .map(|record| Marker::for_record(record, &self.transform))
            .collect()
    }

    /// Draw one frame from a snapshot, then clear the store if a key was hit
    pub fn draw(&mut self, surface: &mut dyn Surface) -> Result<()> {
        surface.begin_frame().context("Failed to start frame")?;

        for marker in self.markers() {
            debug!(
                id = marker.id,
                x = marker.center.0,
                y = marker.center.1,
                label = %marker.label,
                "Draw point"
            );
            surface
                .draw_marker(&marker)
                .with_context(|| format!("Failed to draw entity {}", marker.id))?;
        }

        surface.present().context("Failed to present frame")?;
        self.frames += 1;

        if surface.poll_key() {
            self.store.clear();
        }

        Ok(())
    }
}

/// Draw, poll input, pump the transport; once per iteration.
///
/// Messages delivered by the pump step of iteration N are fully ingested
/// before the frame of iteration N+1 is drawn.
pub struct RenderLoop<T> {
    overlay: Overlay,
    sink: Arc<DumpSink>,
    ingest: IngestionHandler,
    transport: T,
    pump_timeout: Duration,
    shutdown: ShutdownSignal,
}

impl<T: Transport> RenderLoop<T> {
    pub fn new(
        store: Arc<EntityStore>,
        sink: Arc<DumpSink>,
        ingest: IngestionHandler,
        transport: T,
        transform: FieldTransform,
        pump_timeout: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            overlay: Overlay::new(store, transform),
            sink,
            ingest,
            transport,
            pump_timeout,
            shutdown,
        }
    }

    /// Frames drawn so far
    pub fn frames(&self) -> u64 {
        self.overlay.frames()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.overlay.markers()
    }

    /// Run one iteration. Errors are fatal for the process.
    pub fn tick(&mut self, surface: &mut dyn Surface) -> Result<TickOutcome> {
        if self.shutdown.is_requested() {
            shutdown::finish(&self.sink)?;
            return Ok(TickOutcome::Exit);
        }

        self.overlay.draw(surface)?;

        let ingest = &mut self.ingest;
        let delivered = self
            .transport
            .pump(self.pump_timeout, &mut |message| {
                ingest.handle(message);
            })
            .context("Transport pump failed")?;

        if delivered > 0 {
            debug!(delivered = delivered, "Pump step delivered messages");
        }

        Ok(TickOutcome::Continue)
    }

    /// Loop until shutdown is requested or a fatal error occurs
    pub fn run(&mut self, surface: &mut dyn Surface) -> Result<()> {
        info!("Render loop running");
        loop {
            if self.tick(surface)? == TickOutcome::Exit {
                info!(
                    frames = self.overlay.frames(),
                    received = self.ingest.received(),
                    "Render loop stopped"
                );
                return Ok(());
            }
        }
    }
}
