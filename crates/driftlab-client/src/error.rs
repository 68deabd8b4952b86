//! Error types for the client

use std::net::SocketAddr;

use driftlab_core::ProtocolError;
use thiserror::Error;

/// Client-side failures. Anything touching the router connection is fatal
/// for the client by design: the star topology has no redundant path, so
/// there is no retry and no reconnect.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to bind client socket to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to router at {router_addr}: {source}")]
    Connect {
        router_addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to router lost: {0}")]
    ConnectionLost(#[source] ProtocolError),

    #[error("router closed the connection")]
    Disconnected,

    #[error("failed to persist event record: {0}")]
    Sink(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("client task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
