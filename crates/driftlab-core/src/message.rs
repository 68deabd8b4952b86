//! The wire message exchanged between clients through the router

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::HostAddr;

// ----------------------------------------------------------------------------
// Routing Directive
// ----------------------------------------------------------------------------

/// Where the router should forward a message: the lexicographically first of
/// the sender's peers, the second, or both. A routing instruction, not a
/// payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Directive {
    SendFirst,
    SendSecond,
    Broadcast,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Directive::SendFirst => "SEND_FIRST",
            Directive::SendSecond => "SEND_SECOND",
            Directive::Broadcast => "BROADCAST",
        };
        write!(f, "{name}")
    }
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// Immutable value exchanged between router and clients.
///
/// `logical_time` is the sender's clock *after* the send update, so receivers
/// can apply the max rule directly. Per sender it is non-decreasing across
/// successive sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Address of the sending client.
    pub source: HostAddr,
    /// Routing directive.
    pub kind: Directive,
    /// Sender's wall clock at send time, seconds since the UNIX epoch.
    pub system_time: f64,
    /// Sender's logical clock at send time.
    pub logical_time: u64,
    /// Opaque content; not required for correctness.
    pub payload: Option<String>,
}

impl Message {
    pub fn new(source: HostAddr, kind: Directive, system_time: f64, logical_time: u64) -> Self {
        Self {
            source,
            kind,
            system_time,
            logical_time,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
