//! Fundamental types shared by the router and clients
//!
//! Newtype wrappers keep address handling and wall-clock access behind small,
//! testable seams.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ----------------------------------------------------------------------------
// Host Address
// ----------------------------------------------------------------------------

/// A client's identity: the `host:port` string form of its socket address.
///
/// The derived `Ord` is plain lexicographic order on the string, which is the
/// total order used to pick the "first" and "second" peer of a sender.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostAddr(String);

impl HostAddr {
    /// Build an address from its host and port parts.
    pub fn new(host: &str, port: u16) -> Self {
        Self(format!("{host}:{port}"))
    }

    /// The `host:port` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SocketAddr> for HostAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

impl FromStr for HostAddr {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ProtocolError::InvalidAddress(s.to_string()))?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(ProtocolError::InvalidAddress(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Time Source
// ----------------------------------------------------------------------------

/// Wall-clock access as an injectable seam so tests control timestamps.
pub trait TimeSource {
    /// Seconds since the UNIX epoch.
    fn now(&self) -> f64;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
