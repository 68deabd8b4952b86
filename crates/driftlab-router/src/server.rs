//! TCP server: accept loop and per-connection tasks
//!
//! Every accepted connection gets a reader task (frames in, routed through
//! the shared registry) and a writer task (forwarded messages out). The
//! writer is fed through an unbounded channel, so routing to one peer never
//! waits on another peer's socket.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use driftlab_core::{wire, HostAddr, Message, ProtocolError};

use crate::error::Result;
use crate::registry::PeerRegistry;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Address the router listens on.
    pub listen_addr: SocketAddr,
    /// Number of clients served at once.
    pub capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            capacity: PeerRegistry::DEFAULT_CAPACITY,
        }
    }
}

// ----------------------------------------------------------------------------
// Router
// ----------------------------------------------------------------------------

/// The central hub of the star topology.
pub struct Router {
    listener: TcpListener,
    registry: Arc<Mutex<PeerRegistry>>,
    shutdown: CancellationToken,
}

impl Router {
    /// Bind the listen socket. The router does not serve until [`run`] is
    /// called.
    ///
    /// [`run`]: Router::run
    pub async fn bind(config: RouterConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        info!("router listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            registry: Arc::new(Mutex::new(PeerRegistry::new(config.capacity))),
            shutdown: CancellationToken::new(),
        })
    }

    /// The actually bound address; useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops the accept loop and all connection tasks.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until the shutdown token fires. Connection failures are logged
    /// and contained; only listener failures surface.
    pub async fn run(self) -> Result<()> {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("router shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            self.admit(stream, peer_addr, &mut connections);
                        }
                        Err(e) => warn!("accept failed: {e}"),
                    }
                }
            }
        }

        // Cancellation has propagated to every reader; drain the tasks.
        drop(self.listener);
        while connections.join_next().await.is_some() {}
        Ok(())
    }

    /// Register the connection and spawn its reader/writer pair, or refuse it.
    fn admit(&self, stream: TcpStream, peer_addr: SocketAddr, connections: &mut JoinSet<()>) {
        let peer = HostAddr::from(peer_addr);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        if let Err(e) = self
            .registry
            .lock()
            .unwrap()
            .register(peer.clone(), outbound_tx)
        {
            warn!("refusing connection from {peer}: {e}");
            return;
        }

        let (read_half, write_half) = stream.into_split();
        connections.spawn(write_outbound(write_half, outbound_rx, peer.clone()));
        connections.spawn(serve_connection(
            read_half,
            Arc::clone(&self.registry),
            peer,
            self.shutdown.child_token(),
        ));
    }
}

// ----------------------------------------------------------------------------
// Connection Tasks
// ----------------------------------------------------------------------------

/// Reader side: frames from one client, routed to its peers.
async fn serve_connection(
    mut reader: OwnedReadHalf,
    registry: Arc<Mutex<PeerRegistry>>,
    peer: HostAddr,
    shutdown: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = wire::read_message(&mut reader) => next,
        };

        match next {
            Ok(Some(message)) => {
                debug!(
                    "received {} from {} (logical time {})",
                    message.kind, message.source, message.logical_time
                );
                let routed = registry.lock().unwrap().route(&message);
                if let Err(e) = routed {
                    warn!("dropping message: {e}");
                }
            }
            Ok(None) => {
                info!("client {peer} disconnected");
                break;
            }
            Err(ProtocolError::Serialization(e)) => {
                // Recoverable: the stream is still aligned on the next frame.
                warn!("discarding malformed frame from {peer}: {e}");
            }
            Err(e) => {
                warn!("connection to {peer} failed: {e}");
                break;
            }
        }
    }

    registry.lock().unwrap().deregister(&peer);
}

/// Writer side: forwarded messages onto one client's socket. Exits when the
/// registry entry is dropped or the socket fails.
async fn write_outbound(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    peer: HostAddr,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = wire::write_message(&mut writer, &message).await {
            warn!("write to {peer} failed: {e}");
            break;
        }
    }
    debug!("writer for {peer} stopped");
}
