//! Offline reading of dump files.

use crate::dump::{read_dump, DumpRecord};
use crate::event::{Decoded, MessageDecoder};
use crate::state::{EntityRecord, EntityStore};
use anyhow::Result;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::info;

/// What a dump contains, plus the entity state it leads to
#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub records: usize,
    pub per_topic: BTreeMap<String, usize>,
    /// Draw-topic records that failed to decode
    pub rejected: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    /// Final state, sorted by id. Clears done in the live view are not
    /// recorded in dumps, so this is every entity ever reported.
    pub entities: Vec<EntityRecord>,
}

/// Feed records through the decoder into a fresh store
pub fn replay(records: &[DumpRecord], decoder: &MessageDecoder) -> ReplaySummary {
    let store = EntityStore::new();
    let mut summary = ReplaySummary {
        records: records.len(),
        ..Default::default()
    };

    for record in records {
        *summary.per_topic.entry(record.topic.clone()).or_default() += 1;

        summary.first = Some(match summary.first {
            Some(first) => first.min(record.received_at),
            None => record.received_at,
        });
        summary.last = Some(match summary.last {
            Some(last) => last.max(record.received_at),
            None => record.received_at,
        });

        match decoder.decode(&record.topic, &record.payload) {
            Ok(Decoded::Update(update)) => store.apply(update),
            Ok(Decoded::Irrelevant) => {}
            Err(_) => summary.rejected += 1,
        }
    }

    let mut entities = store.snapshot();
    entities.sort_by_key(|e| e.id);
    summary.entities = entities;
    summary
}

/// Read a dump file and replay it
pub fn replay_file(path: &Path, draw_topic: &str) -> Result<ReplaySummary> {
    let records = read_dump(path)?;
    info!(path = %path.display(), records = records.len(), "Read dump");
    Ok(replay(&records, &MessageDecoder::new(draw_topic)))
}

impl fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} records", self.records)?;
        if let (Some(first), Some(last)) = (self.first, self.last) {
            writeln!(f, "from {} to {}", first, last)?;
        }
        for (topic, count) in &self.per_topic {
            writeln!(f, "  {:<24} {}", topic, count)?;
        }
        if self.rejected > 0 {
            writeln!(f, "{} malformed draw-topic records", self.rejected)?;
        }
        writeln!(f, "{} entities:", self.entities.len())?;
        for entity in &self.entities {
            writeln!(
                f,
                "  {:>5}  ({:>7.2}, {:>7.2})  {}",
                entity.id, entity.position.0, entity.position.1, entity.label
            )?;
        }
        Ok(())
    }
}
