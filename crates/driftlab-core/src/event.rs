//! Client event records and the sink they are persisted to
//!
//! Each client appends one record per loop iteration. Records are created
//! once, never mutated, and handed to the sink immediately.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::message::Message;

// ----------------------------------------------------------------------------
// Event Records
// ----------------------------------------------------------------------------

/// What happened during one tick of a client's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Send,
    Receive,
    Internal,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Send => "SEND",
            EventKind::Receive => "RECEIVE",
            EventKind::Internal => "INTERNAL",
        };
        write!(f, "{name}")
    }
}

/// One append-only log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    /// Wall clock at the event, seconds since the UNIX epoch.
    pub system_time: f64,
    /// The client's logical clock after the event's update.
    pub logical_time: u64,
    /// Inbound queue length after the event.
    pub queue_depth: usize,
    /// The message sent or received, if any.
    pub message: Option<Message>,
}

// ----------------------------------------------------------------------------
// Event Sink
// ----------------------------------------------------------------------------

/// Destination for a client's event log.
///
/// Implementations must persist each record before returning; the worker loop
/// treats a sink failure as fatal.
pub trait EventSink: Send {
    fn record(&mut self, event: &EventRecord) -> std::io::Result<()>;
}

/// In-memory sink for tests; clones share the same record buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: &EventRecord) -> std::io::Result<()> {
        self.records.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
