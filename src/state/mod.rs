// Entity state shared by ingestion and rendering

mod entity;
mod store;

pub use entity::{EntityRecord, EntityUpdate};
pub use store::EntityStore;
