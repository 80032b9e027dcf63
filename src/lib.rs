// Entity state shared by ingestion and rendering
pub mod state;

// Raw messages and position report decoding
pub mod event;

// Compressed message dump
pub mod dump;

// Message arrival handling
pub mod ingest;

// Transport interface and NATS implementation
pub mod transport;
pub mod nats;

// Render loop, markers and display backend
pub mod render;
pub mod display;

pub mod shutdown;
pub mod config;
pub mod replay;
pub mod cli;

/// Log filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "radarview=info";
