//! Native window backend.
//!
//! The window thread only draws; a delivery thread pumps the transport and
//! wakes the window when the store changes.

use crate::config::DisplayConfig;
use crate::ingest::DeliveryLoop;
use crate::render::{Marker, Overlay, Surface, TEXT_COLOR};
use crate::shutdown::ShutdownSignal;
use crate::transport::Transport;
use anyhow::{anyhow, Context, Result};
use eframe::egui;
use image::{Rgb, RgbaImage};
use std::io;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

const TEXT_SIZE: f32 = 13.0;

/// Read the background image once; its size defines the pixel space
pub fn load_background(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("Failed to read background image {}", path.display()))?
        .to_rgba8();

    info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Loaded background"
    );

    Ok(image)
}

fn color(rgb: Rgb<u8>) -> egui::Color32 {
    let Rgb([r, g, b]) = rgb;
    egui::Color32::from_rgb(r, g, b)
}

/// Surface drawing into the window's central panel for one egui pass
struct EguiSurface<'a> {
    ctx: &'a egui::Context,
    painter: &'a egui::Painter,
    background: &'a egui::TextureHandle,
    origin: egui::Pos2,
    size: egui::Vec2,
}

impl EguiSurface<'_> {
    fn at(&self, (x, y): (i32, i32)) -> egui::Pos2 {
        self.origin + egui::vec2(x as f32, y as f32)
    }

    fn text(&self, anchor: (i32, i32), text: &str) {
        self.painter.text(
            self.at(anchor),
            egui::Align2::LEFT_BOTTOM,
            text,
            egui::FontId::proportional(TEXT_SIZE),
            color(TEXT_COLOR),
        );
    }
}

impl Surface for EguiSurface<'_> {
    fn begin_frame(&mut self) -> Result<()> {
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        self.painter.image(
            self.background.id(),
            egui::Rect::from_min_size(self.origin, self.size),
            uv,
            egui::Color32::WHITE,
        );
        Ok(())
    }

    fn draw_marker(&mut self, marker: &Marker) -> Result<()> {
        let center = self.at(marker.center);
        self.painter
            .circle_filled(center, marker.radius, color(marker.fill));
        self.painter.circle_stroke(
            center,
            marker.radius,
            egui::Stroke::new(1.0, color(marker.outline)),
        );
        self.text(marker.tag_anchor(), &marker.tag);
        self.text(marker.label_anchor(), &marker.label);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        // egui presents the shapes once update() returns
        Ok(())
    }

    fn poll_key(&mut self) -> bool {
        self.ctx.input(|input| {
            input
                .events
                .iter()
                .any(|event| matches!(event, egui::Event::Key { pressed: true, .. }))
        })
    }
}

type FaultSlot = Arc<Mutex<Option<anyhow::Error>>>;

/// How long the delivery thread waits for the window to close once it has
/// stopped, before ending the process itself
const CLOSE_GRACE: Duration = Duration::from_secs(2);

fn store_fault(slot: &FaultSlot, e: anyhow::Error) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
}

struct OverlayApp {
    overlay: Overlay,
    background: egui::TextureHandle,
    size: egui::Vec2,
    poll_interval: Duration,
    shutdown: ShutdownSignal,
    fault: FaultSlot,
    closing: bool,
}

impl OverlayApp {
    fn close(&mut self, ctx: &egui::Context) {
        self.closing = true;
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.closing {
            return;
        }
        if self.shutdown.is_requested() {
            self.close(ctx);
            return;
        }

        let drawn = egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let mut surface = EguiSurface {
                    ctx,
                    painter: ui.painter(),
                    background: &self.background,
                    origin: ui.max_rect().min,
                    size: self.size,
                };
                self.overlay.draw(&mut surface)
            })
            .inner;

        match drawn {
            Ok(()) => ctx.request_repaint_after(self.poll_interval),
            Err(e) => {
                error!(error = %format!("{:#}", e), "Drawing failed");
                store_fault(&self.fault, e);
                self.shutdown.request();
                self.close(ctx);
            }
        }
    }
}

/// Run `delivery` on its own thread, waking the window as messages arrive.
///
/// Once the loop stops it asks the window to close. If the window gets no
/// frame to act on that within [`CLOSE_GRACE`] (minimized, occluded), the
/// process exits from here; the dump is already closed by then.
fn spawn_delivery<T: Transport + Send + 'static>(
    mut delivery: DeliveryLoop<T>,
    ctx: egui::Context,
    shutdown: ShutdownSignal,
    fault: FaultSlot,
    window_closed: mpsc::Receiver<()>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("delivery".to_string())
        .spawn(move || {
            let wake = || ctx.request_repaint();
            if let Err(e) = delivery.run(&wake) {
                error!(error = %format!("{:#}", e), "Delivery loop failed");
                store_fault(&fault, e);
                shutdown.request();
            }

            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            ctx.request_repaint();

            if let Err(RecvTimeoutError::Timeout) = window_closed.recv_timeout(CLOSE_GRACE) {
                let failed = fault
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some();
                warn!("Window did not close after shutdown, exiting");
                std::process::exit(if failed { 1 } else { 0 });
            }
        })
}

/// Open the window, draw `overlay` in it and run `delivery` beside it until
/// shutdown, window close or a fatal error
pub fn run<T: Transport + Send + 'static>(
    overlay: Overlay,
    delivery: DeliveryLoop<T>,
    shutdown: ShutdownSignal,
    background: RgbaImage,
    config: &DisplayConfig,
) -> Result<()> {
    let (width, height) = background.dimensions();
    let size = egui::vec2(width as f32, height as f32);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(config.window_title.clone())
            .with_inner_size(size)
            .with_resizable(false),
        ..Default::default()
    };

    let fault: FaultSlot = Arc::new(Mutex::new(None));
    let worker: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::new(Mutex::new(None));
    let (closed_tx, closed_rx) = mpsc::channel::<()>();
    let poll_interval = Duration::from_millis(config.poll_interval_ms);

    let app_fault = Arc::clone(&fault);
    let app_worker = Arc::clone(&worker);
    let app_shutdown = shutdown.clone();

    let displayed = eframe::run_native(
        &config.window_title,
        options,
        Box::new(move |cc| {
            let image = egui::ColorImage::from_rgba_unmultiplied(
                [width as usize, height as usize],
                background.as_raw(),
            );
            let texture =
                cc.egui_ctx
                    .load_texture("background", image, egui::TextureOptions::LINEAR);

            let handle = spawn_delivery(
                delivery,
                cc.egui_ctx.clone(),
                app_shutdown.clone(),
                Arc::clone(&app_fault),
                closed_rx,
            )?;
            *app_worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

            Ok(Box::new(OverlayApp {
                overlay,
                background: texture,
                size,
                poll_interval,
                shutdown: app_shutdown,
                fault: app_fault,
                closing: false,
            }))
        }),
    );

    // Window is gone; stop delivery and wait for it to close the dump
    shutdown.request();
    drop(closed_tx);
    let handle = worker.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(handle) = handle {
        if handle.join().is_err() {
            error!("Delivery thread panicked");
        }
    }

    displayed.map_err(|e| anyhow!("Display failed: {}", e))?;

    let fault = fault.lock().unwrap_or_else(PoisonError::into_inner).take();
    match fault {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
