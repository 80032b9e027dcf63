use crate::event::RawMessage;
use chrono::{DateTime, Local};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info};
use zstd::stream::write::Encoder;

pub mod reader;


pub use reader::{parse_line, read_dump, DumpRecord};

/// File name suffix of every dump
pub const DUMP_EXTENSION: &str = ".mqttdump.zst";

/// Timestamp layout used in file names and record lines (ISO 8601 basic)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// zstd level for dump files
const COMPRESSION_LEVEL: i32 = 3;

/// Suffixed names tried after the plain one is taken
const MAX_NAME_SUFFIX: u32 = 99;

/// Errors from the dump sink
#[derive(Debug)]
pub enum SinkError {
    Io(io::Error),
    /// The sink was closed (or is closing); nothing was written
    Closed,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "dump I/O error: {}", e),
            SinkError::Closed => write!(f, "dump sink is closed"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Closed => None,
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Append-only, zstd-compressed capture of every received message.
///
/// Each append writes one complete line while holding the sink lock, and
/// `close` takes the same lock, so a close racing an append either waits for
/// the whole line or makes the append fail with [`SinkError::Closed`].
pub struct DumpSink {
    path: PathBuf,
    encoder: Mutex<Option<Encoder<'static, File>>>,
    closing: AtomicBool,
    lines: AtomicU64,
}

impl DumpSink {
    /// Create a new dump file in `directory`, named after `started_at`.
    ///
    /// Format: {timestamp}.mqttdump.zst
    /// Example: 20260212T153045.mqttdump.zst
    ///
    /// Never overwrites an existing file. If a dump for the same second
    /// already exists, a `-N` suffix is added to the timestamp:
    /// 20260212T153045-1.mqttdump.zst
    pub fn open(directory: &Path, started_at: DateTime<Local>) -> Result<Self, SinkError> {
        fs::create_dir_all(directory)?;

        let (path, file) = create_unique(directory, started_at)?;
        let encoder = Encoder::new(file, COMPRESSION_LEVEL)?;

        info!(path = %path.display(), "Dumping to {}", path.display());

        Ok(Self {
            path,
            encoder: Mutex::new(Some(encoder)),
            closing: AtomicBool::new(false),
            lines: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines accepted so far
    pub fn lines_written(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Append one record line for `message`
    pub fn append(&self, message: &RawMessage) -> Result<(), SinkError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }

        let line = format_line(message);

        let mut guard = self.encoder.lock().unwrap_or_else(PoisonError::into_inner);
        let encoder = guard.as_mut().ok_or(SinkError::Closed)?;
        encoder.write_all(&line)?;

        self.lines.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Push buffered compressed data through to the file
    pub fn flush(&self) -> Result<(), SinkError> {
        let mut guard = self.encoder.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(encoder) => encoder.flush().map_err(SinkError::from),
            None => Err(SinkError::Closed),
        }
    }

    /// Finish the zstd frame, sync and release the file.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn close(&self) -> Result<(), SinkError> {
        self.closing.store(true, Ordering::SeqCst);

        let encoder = self
            .encoder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(encoder) = encoder {
            let file = encoder.finish()?;
            file.sync_all()?;

            info!(
                path = %self.path.display(),
                lines = self.lines_written(),
                "Dump closed"
            );
        }

        Ok(())
    }
}

impl Drop for DumpSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(error = %e, path = %self.path.display(), "Failed to close dump");
        }
    }
}

/// Dump file path for a run started at `started_at`
pub fn dump_path(directory: &Path, started_at: DateTime<Local>) -> PathBuf {
    numbered_dump_path(directory, started_at, 0)
}

/// Like [`dump_path`], with `-{suffix}` after the timestamp when `suffix > 0`
pub fn numbered_dump_path(directory: &Path, started_at: DateTime<Local>, suffix: u32) -> PathBuf {
    let stamp = started_at.format(TIMESTAMP_FORMAT);
    let filename = if suffix == 0 {
        format!("{}{}", stamp, DUMP_EXTENSION)
    } else {
        format!("{}-{}{}", stamp, suffix, DUMP_EXTENSION)
    };
    directory.join(filename)
}

fn create_unique(directory: &Path, started_at: DateTime<Local>) -> io::Result<(PathBuf, File)> {
    let mut suffix = 0;
    loop {
        let path = numbered_dump_path(directory, started_at, suffix);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && suffix < MAX_NAME_SUFFIX => {
                debug!(path = %path.display(), "Dump file exists, trying next name");
                suffix += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Record line: `*<topic> <timestamp> <payload>\n`
pub fn format_line(message: &RawMessage) -> Vec<u8> {
    let stamp = message.received_at.format(TIMESTAMP_FORMAT).to_string();

    let mut line =
        Vec::with_capacity(message.topic.len() + stamp.len() + message.payload.len() + 4);
    line.push(b'*');
    line.extend_from_slice(message.topic.as_bytes());
    line.push(b' ');
    line.extend_from_slice(stamp.as_bytes());
    line.push(b' ');
    line.extend_from_slice(&message.payload);
    line.push(b'\n');
    line
}
