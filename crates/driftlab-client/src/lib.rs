//! Simulated client process
//!
//! A client connects to the router once at startup and then runs two
//! concurrent activities sharing one inbound queue: a listener that reads
//! framed messages off the connection, and a worker that executes the tick
//! loop, advances the Lamport clock, and appends every event to its log sink.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod client;
pub mod error;
pub mod sink;

mod listener;
mod worker;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use client::{Client, ClientConfig, ClientHandle};
pub use error::{ClientError, Result};
pub use sink::JsonLinesSink;
