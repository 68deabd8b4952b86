//! Durable event log: one JSON object per line, flushed per record

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use driftlab_core::{EventRecord, EventSink, HostAddr};

/// Append-only JSON Lines sink backing a client's event log.
#[derive(Debug)]
pub struct JsonLinesSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonLinesSink {
    /// Create (or truncate) the log file, creating parent directories as
    /// needed.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Conventional per-client log location: `<dir>/client-<host>-<port>.jsonl`.
    pub fn for_client(dir: impl AsRef<Path>, addr: &HostAddr) -> io::Result<Self> {
        let name = format!("client-{}.jsonl", addr.as_str().replace(':', "-"));
        Self::create(dir.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonLinesSink {
    fn record(&mut self, event: &EventRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, event).map_err(io::Error::from)?;
        self.writer.write_all(b"\n")?;
        // Flush per record: the log must survive an abrupt process end.
        self.writer.flush()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
