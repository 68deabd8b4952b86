//! Core protocol for the driftlab logical-clock simulator
//!
//! This crate provides the shared vocabulary between the router and the
//! clients: the wire message and its framed codec, the Lamport clock update
//! rules, client event records, and the randomized tick sampling used by the
//! client event loop.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod clock;
pub mod error;
pub mod event;
pub mod message;
pub mod sampler;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use clock::LamportClock;
pub use error::{ProtocolError, Result};
pub use event::{EventKind, EventRecord, EventSink, MemorySink};
pub use message::{Directive, Message};
pub use sampler::{draw_clock_speed, EventMix, TickAction};
pub use types::{HostAddr, SystemTimeSource, TimeSource};
pub use wire::WireFormat;
