//! Listener task: connection reads feeding the inbound queue

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use driftlab_core::{wire, HostAddr, Message, ProtocolError};

/// Read framed messages off the connection and enqueue them for the worker.
///
/// Runs until shutdown, a closed connection, or an unrecoverable read error.
/// A malformed frame body is dropped with a warning and the loop continues.
pub(crate) async fn run_listener<R>(
    mut reader: R,
    queue: mpsc::UnboundedSender<Message>,
    addr: HostAddr,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = wire::read_message(&mut reader) => next,
        };

        match next {
            Ok(Some(message)) => {
                if queue.send(message).is_err() {
                    // Worker is gone; nothing left to deliver to.
                    break;
                }
            }
            Ok(None) => {
                info!("client {addr}: router closed the connection");
                break;
            }
            Err(ProtocolError::Serialization(e)) => {
                warn!("client {addr}: discarding malformed frame: {e}");
            }
            Err(e) => {
                error!("client {addr}: read failed: {e}");
                break;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
