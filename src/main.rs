use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use radarview::cli::{Cli, Command};
use radarview::config::{load_config, RadarConfig};
use radarview::dump::DumpSink;
use radarview::event::MessageDecoder;
use radarview::ingest::{DeliveryLoop, IngestionHandler};
use radarview::nats::NatsTransport;
use radarview::render::{FieldTransform, HeadlessSurface, Overlay, RenderLoop};
use radarview::shutdown::{self, ShutdownSignal};
use radarview::state::EntityStore;
use radarview::transport::Transport;
use radarview::{display, replay};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| radarview::DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Command::Replay { file, draw_topic }) => {
            let summary = replay::replay_file(&file, &draw_topic)?;
            print!("{}", summary);
            Ok(())
        }
        None => {
            let config = load_config(&cli.config)
                .with_context(|| format!("Failed to load {}", cli.config.display()))?;
            run_overlay(config, cli.headless)
        }
    }
}

fn run_overlay(config: RadarConfig, headless: bool) -> Result<()> {
    info!("radarview starting...");

    let background = display::load_background(&config.display.background)?;
    let transform = FieldTransform::new(
        (config.display.field_width, config.display.field_height),
        background.dimensions(),
    );

    // The runtime only hosts the NATS connection and the signal listener;
    // the pumping thread stays outside it and blocks on it.
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;

    let sink = Arc::new(
        DumpSink::open(&config.dump.directory, Local::now()).context("Failed to open dump file")?,
    );

    let shutdown_signal = ShutdownSignal::new();
    shutdown_signal.listen(runtime.handle());

    let mut transport = NatsTransport::connect(runtime.handle().clone(), &config.transport)?;
    for topic in &config.transport.topics {
        transport.subscribe(topic)?;
    }

    let store = Arc::new(EntityStore::new());
    let ingest = IngestionHandler::new(
        MessageDecoder::new(config.transport.draw_topic.clone()),
        Arc::clone(&store),
        Arc::clone(&sink),
        config.dump.flush_every,
    );

    let result = if headless {
        // No display to pace the loop; the pump wait does
        let mut render = RenderLoop::new(
            store,
            Arc::clone(&sink),
            ingest,
            transport,
            transform,
            Duration::from_millis(config.display.poll_interval_ms),
            shutdown_signal,
        );
        render.run(&mut HeadlessSurface)
    } else {
        let delivery = DeliveryLoop::new(
            transport,
            ingest,
            Arc::clone(&sink),
            Duration::from_millis(config.transport.pump_timeout_ms),
            shutdown_signal.clone(),
        );
        display::run(
            Overlay::new(store, transform),
            delivery,
            shutdown_signal,
            background,
            &config.display,
        )
    };

    // Covers window close and fatal errors; a no-op after a signal exit
    shutdown::finish(&sink)?;
    info!("radarview stopped");

    result
}
