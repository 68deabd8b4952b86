//! Star-topology router
//!
//! Accepts connections from exactly three clients, tracks each under its
//! `host:port` address, and forwards messages to the sender's peers according
//! to the message's routing directive. The router never interprets message
//! content beyond the directive and source address, and it keeps no clock
//! state of its own.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod error;
pub mod registry;
pub mod server;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use error::{RegistrationError, Result, RouterError, RoutingError};
pub use registry::{Forwarder, PeerRegistry};
pub use server::{Router, RouterConfig};
