use super::TIMESTAMP_FORMAT;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;
use zstd::stream::read::Decoder;

/// One line of a dump file
#[derive(Clone, Debug, PartialEq)]
pub struct DumpRecord {
    pub topic: String,
    /// Local wall-clock arrival time, second resolution
    pub received_at: NaiveDateTime,
    pub payload: Vec<u8>,
}

/// Parse one record line (without its trailing newline)
pub fn parse_line(line: &[u8]) -> Result<DumpRecord> {
    let rest = line
        .strip_prefix(b"*")
        .context("Record line does not start with '*'")?;

    let mut parts = rest.splitn(3, |&b| b == b' ');
    let topic = parts.next().context("Record line missing topic")?;
    let stamp = parts.next().context("Record line missing timestamp")?;
    let payload = parts.next().context("Record line missing payload")?;

    let topic = std::str::from_utf8(topic)
        .context("Record topic is not UTF-8")?
        .to_string();
    let stamp = std::str::from_utf8(stamp).context("Record timestamp is not UTF-8")?;
    let received_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid record timestamp '{}'", stamp))?;

    Ok(DumpRecord {
        topic,
        received_at,
        payload: payload.to_vec(),
    })
}

/// Read all records from a dump file.
///
/// Payloads are written raw, so one containing `\n` spans several physical
/// lines. A line that is not a record line continues the payload of the
/// record before it, with the newline restored. Lines before the first
/// record are skipped.
///
/// A dump cut short by a crash has no zstd frame end; everything decoded up
/// to that point is returned and the truncation is logged.
pub fn read_dump(path: &Path) -> Result<Vec<DumpRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open dump file {}", path.display()))?;
    let decoder = Decoder::new(file).context("Failed to initialize zstd decoder")?;

    let mut records: Vec<DumpRecord> = Vec::new();

    for (index, line) in BufReader::new(decoder).split(b'\n').enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    records = records.len(),
                    error = %e,
                    "Dump truncated, stopping at last complete record"
                );
                break;
            }
        };

        if line.starts_with(b"*") {
            match parse_line(&line) {
                Ok(record) => {
                    records.push(record);
                    continue;
                }
                // Inside a payload a leading '*' is just data
                Err(e) if records.is_empty() => {
                    warn!(
                        path = %path.display(),
                        line = index + 1,
                        error = %format!("{:#}", e),
                        "Skipping unparseable dump line"
                    );
                    continue;
                }
                Err(_) => {}
            }
        }

        match records.last_mut() {
            Some(previous) => {
                previous.payload.push(b'\n');
                previous.payload.extend_from_slice(&line);
            }
            None => warn!(
                path = %path.display(),
                line = index + 1,
                "Skipping dump line before the first record"
            ),
        }
    }

    Ok(records)
}
