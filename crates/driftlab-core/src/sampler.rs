//! Randomized tick outcomes for the client event loop
//!
//! Clients draw what to do on an idle tick (send to a peer, broadcast, or a
//! purely internal step) against a configured probability partition, and draw
//! their fixed clock speed at startup. Randomness comes in through `rand::Rng`
//! so tests substitute a seeded generator.

use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::message::Directive;

/// Default clock-speed range in ticks per second.
pub const DEFAULT_SPEED_RANGE: RangeInclusive<u32> = 1..=6;

// ----------------------------------------------------------------------------
// Event Mix
// ----------------------------------------------------------------------------

/// Probability partition over the outcomes of an idle tick. The remainder
/// `1 - (p_send_first + p_send_second + p_broadcast)` is the internal-event
/// probability; the four outcomes are mutually exclusive and exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventMix {
    pub p_send_first: f64,
    pub p_send_second: f64,
    pub p_broadcast: f64,
}

impl Default for EventMix {
    /// Internal with probability 0.7, the remainder
    /// split evenly across the three directives.
    fn default() -> Self {
        Self::uniform_sends(0.7)
    }
}

impl EventMix {
    /// A mix where sends are equally likely and internal events take the
    /// given probability.
    pub fn uniform_sends(p_internal: f64) -> Self {
        let share = (1.0 - p_internal) / 3.0;
        Self {
            p_send_first: share,
            p_send_second: share,
            p_broadcast: share,
        }
    }

    /// A mix that never touches the network. Useful for passive clients.
    pub fn all_internal() -> Self {
        Self {
            p_send_first: 0.0,
            p_send_second: 0.0,
            p_broadcast: 0.0,
        }
    }

    /// Probability of the internal outcome.
    pub fn p_internal(&self) -> f64 {
        1.0 - (self.p_send_first + self.p_send_second + self.p_broadcast)
    }

    pub fn validate(&self) -> Result<()> {
        let parts = [self.p_send_first, self.p_send_second, self.p_broadcast];
        if parts.iter().any(|p| !(0.0..=1.0).contains(p) || p.is_nan()) {
            return Err(ProtocolError::InvalidConfig(format!(
                "event probabilities must lie in [0, 1]: {self:?}"
            )));
        }
        let sum: f64 = parts.iter().sum();
        if sum > 1.0 {
            return Err(ProtocolError::InvalidConfig(format!(
                "event probabilities sum to {sum}, which exceeds 1"
            )));
        }
        Ok(())
    }

    /// Draw one tick outcome against the partition.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> TickAction {
        let roll: f64 = rng.gen();
        if roll < self.p_send_first {
            TickAction::Send(Directive::SendFirst)
        } else if roll < self.p_send_first + self.p_send_second {
            TickAction::Send(Directive::SendSecond)
        } else if roll < self.p_send_first + self.p_send_second + self.p_broadcast {
            TickAction::Send(Directive::Broadcast)
        } else {
            TickAction::Internal
        }
    }
}

/// Outcome of one idle tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Send(Directive),
    Internal,
}

// ----------------------------------------------------------------------------
// Clock Speed
// ----------------------------------------------------------------------------

/// Draw a client's fixed tick rate uniformly from the given range.
pub fn draw_clock_speed<R: Rng + ?Sized>(rng: &mut R, range: RangeInclusive<u32>) -> u32 {
    rng.gen_range(range)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
