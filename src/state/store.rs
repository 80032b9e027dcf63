use crate::state::entity::{EntityRecord, EntityUpdate};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// In-memory map of entity id to its latest record.
///
/// Writers take the write lock for a whole-record replace, so readers never
/// see a half-applied update. `snapshot` copies under the read lock, which
/// gives the render loop a point-in-time view even if delivery is moved onto
/// another thread.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: RwLock<HashMap<u64, EntityRecord>>,
}

impl EntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `id`
    pub fn upsert(&self, id: u64, position: (f64, f64), label: String) {
        let record = EntityRecord {
            id,
            position,
            label,
        };

        let previous = self
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, record);

        if previous.is_none() {
            debug!(entity_id = id, "New entity");
        }
    }

    /// Apply a decoded update
    pub fn apply(&self, update: EntityUpdate) {
        self.upsert(update.id, update.position, update.label);
    }

    /// Point-in-time copy of all records, in unspecified order
    pub fn snapshot(&self) -> Vec<EntityRecord> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Get one record by id
    pub fn get(&self, id: u64) -> Option<EntityRecord> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Remove every record at once
    pub fn clear(&self) {
        let mut entities = self
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = entities.len();
        entities.clear();
        drop(entities);

        info!(removed = removed, "Cleared all entities");
    }

    pub fn len(&self) -> usize {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
