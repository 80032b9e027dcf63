// NATS transport

mod client;

pub use client::{NatsConfig, NatsTransport};
