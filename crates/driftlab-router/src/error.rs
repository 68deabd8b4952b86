//! Error types for the router

use driftlab_core::{HostAddr, ProtocolError};
use thiserror::Error;

/// A connection could not be added to the registry. The offending connection
/// is refused; the router keeps serving everyone else.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("address {0} already has a live connection")]
    DuplicateAddress(HostAddr),

    #[error("registry already holds {capacity} clients")]
    RegistryFull { capacity: usize },
}

/// A message could not be forwarded. The message is dropped; the connection
/// and the router keep running.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("{origin} has {available} registered peer(s), directive needs {required}")]
    InsufficientPeers {
        origin: HostAddr,
        available: usize,
        required: usize,
    },
}

/// Unified router error.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RouterError>;
