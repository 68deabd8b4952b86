//! Address registry and forwarding logic
//!
//! The registry is the only state shared between connection handlers. Call
//! sites guard it with one mutex so `register`, `route`, and `deregister` are
//! mutually exclusive; a client removed mid-route can never be forwarded to.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use driftlab_core::{Directive, HostAddr, Message};

use crate::error::{RegistrationError, RoutingError};

/// Handle into a peer connection's writer task. Sends never block, so one
/// slow peer cannot stall a route and a dead peer cannot fail a broadcast to
/// the live one.
pub type Forwarder = mpsc::UnboundedSender<Message>;

/// Number of peer destinations every directive needs.
const REQUIRED_PEERS: usize = 2;

// ----------------------------------------------------------------------------
// Peer Registry
// ----------------------------------------------------------------------------

/// Address → connection mapping with fixed capacity.
#[derive(Debug)]
pub struct PeerRegistry {
    peers: HashMap<HostAddr, Forwarder>,
    capacity: usize,
}

impl PeerRegistry {
    /// The experiment topology: one router, three clients.
    pub const DEFAULT_CAPACITY: usize = 3;

    pub fn new(capacity: usize) -> Self {
        Self {
            peers: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, addr: &HostAddr) -> bool {
        self.peers.contains_key(addr)
    }

    /// Add a connection under its address. At most one live connection per
    /// address, at most `capacity` connections total.
    pub fn register(
        &mut self,
        addr: HostAddr,
        forwarder: Forwarder,
    ) -> Result<(), RegistrationError> {
        if self.peers.contains_key(&addr) {
            return Err(RegistrationError::DuplicateAddress(addr));
        }
        if self.peers.len() >= self.capacity {
            return Err(RegistrationError::RegistryFull {
                capacity: self.capacity,
            });
        }

        self.peers.insert(addr.clone(), forwarder);
        info!("registered client {addr} ({}/{})", self.peers.len(), self.capacity);
        Ok(())
    }

    /// Remove a connection on disconnect. Subsequent routes see the smaller
    /// address set.
    pub fn deregister(&mut self, addr: &HostAddr) -> bool {
        let removed = self.peers.remove(addr).is_some();
        if removed {
            info!("deregistered client {addr} ({}/{})", self.peers.len(), self.capacity);
        }
        removed
    }

    /// Forward a message to the sender's peers per its directive.
    ///
    /// Destinations are the registered addresses minus the sender, in
    /// lexicographic order, so "first" and "second" are deterministic
    /// regardless of registration order. Returns the addresses the message
    /// was handed off to.
    pub fn route(&self, message: &Message) -> Result<Vec<HostAddr>, RoutingError> {
        let mut others: Vec<&HostAddr> = self
            .peers
            .keys()
            .filter(|addr| **addr != message.source)
            .collect();
        others.sort();

        if others.len() < REQUIRED_PEERS {
            return Err(RoutingError::InsufficientPeers {
                origin: message.source.clone(),
                available: others.len(),
                required: REQUIRED_PEERS,
            });
        }

        let targets: &[&HostAddr] = match message.kind {
            Directive::SendFirst => &others[..1],
            Directive::SendSecond => &others[1..2],
            Directive::Broadcast => &others[..2],
        };

        let mut delivered = Vec::with_capacity(targets.len());
        for &target in targets {
            // Each forward stands alone: a dropped writer only loses its own copy.
            match self.peers[target].send(message.clone()) {
                Ok(()) => delivered.push(target.clone()),
                Err(_) => warn!("peer {target} went away before forward, skipping"),
            }
        }

        debug!(
            "routed {} from {} to {:?}",
            message.kind, message.source, delivered
        );
        Ok(delivered)
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use driftlab_core::Directive;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn addr(port: u16) -> HostAddr {
        HostAddr::new("localhost", port)
    }

    fn message(from: &HostAddr, kind: Directive) -> Message {
        Message::new(from.clone(), kind, 0.0, 1)
    }

    /// Registry with the three experiment clients, registered in the given
    /// order. Returns the receivers keyed in the same order.
    fn populated(ports: &[u16]) -> (PeerRegistry, Vec<(HostAddr, UnboundedReceiver<Message>)>) {
        let mut registry = PeerRegistry::default();
        let mut receivers = Vec::new();
        for &port in ports {
            let (tx, rx) = mpsc::unbounded_channel();
            let a = addr(port);
            registry.register(a.clone(), tx).unwrap();
            receivers.push((a, rx));
        }
        (registry, receivers)
    }

    #[test]
    fn send_first_picks_lexicographic_first_of_others() {
        // Registration order must not matter.
        for order in [[8001u16, 8002, 8003], [8003, 8001, 8002], [8002, 8003, 8001]] {
            let (registry, mut receivers) = populated(&order);

            let delivered = registry
                .route(&message(&addr(8001), Directive::SendFirst))
                .unwrap();
            assert_eq!(delivered, vec![addr(8002)]);

            for (a, rx) in receivers.iter_mut() {
                if *a == addr(8002) {
                    assert!(rx.try_recv().is_ok());
                } else {
                    assert!(rx.try_recv().is_err(), "{a} should not receive");
                }
            }
        }
    }

    #[test]
    fn send_second_picks_lexicographic_second_of_others() {
        let (registry, mut receivers) = populated(&[8003, 8002, 8001]);

        let delivered = registry
            .route(&message(&addr(8001), Directive::SendSecond))
            .unwrap();
        assert_eq!(delivered, vec![addr(8003)]);

        for (a, rx) in receivers.iter_mut() {
            assert_eq!(rx.try_recv().is_ok(), *a == addr(8003));
        }
    }

    #[test]
    fn the_first_of_the_middle_sender_differs() {
        // For the sender in the middle of the order, "first" is the lowest
        // address overall, not the lowest above the sender.
        let (registry, mut receivers) = populated(&[8001, 8002, 8003]);

        let delivered = registry
            .route(&message(&addr(8002), Directive::SendFirst))
            .unwrap();
        assert_eq!(delivered, vec![addr(8001)]);

        for (a, rx) in receivers.iter_mut() {
            assert_eq!(rx.try_recv().is_ok(), *a == addr(8001));
        }
    }

    #[test]
    fn broadcast_reaches_both_peers_unchanged() {
        let (registry, mut receivers) = populated(&[8001, 8002, 8003]);

        let sent = message(&addr(8001), Directive::Broadcast).with_payload("drift");
        let delivered = registry.route(&sent).unwrap();
        assert_eq!(delivered, vec![addr(8002), addr(8003)]);

        for (a, rx) in receivers.iter_mut() {
            if *a == addr(8001) {
                assert!(rx.try_recv().is_err(), "sender must not hear its own message");
                continue;
            }
            let copy = rx.try_recv().unwrap();
            assert_eq!(copy, sent);
            // Exactly one copy each.
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn sender_is_never_a_destination() {
        let (registry, mut receivers) = populated(&[8001, 8002, 8003]);

        for kind in [Directive::SendFirst, Directive::SendSecond, Directive::Broadcast] {
            let delivered = registry.route(&message(&addr(8002), kind)).unwrap();
            assert!(!delivered.contains(&addr(8002)));
        }
        let sender_rx = &mut receivers.iter_mut().find(|(a, _)| *a == addr(8002)).unwrap().1;
        assert!(sender_rx.try_recv().is_err());
    }

    #[test]
    fn routing_with_too_few_peers_is_an_error() {
        let (registry, _receivers) = populated(&[8001, 8002]);

        let result = registry.route(&message(&addr(8001), Directive::SendSecond));
        assert!(matches!(
            result,
            Err(RoutingError::InsufficientPeers { available: 1, required: 2, .. })
        ));
    }

    #[test]
    fn duplicate_address_is_refused() {
        let (mut registry, _receivers) = populated(&[8001, 8002]);
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = registry.register(addr(8001), tx);
        assert!(matches!(result, Err(RegistrationError::DuplicateAddress(a)) if a == addr(8001)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn fourth_registration_is_refused_until_a_slot_frees() {
        let (mut registry, _receivers) = populated(&[8001, 8002, 8003]);

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = registry.register(addr(8004), tx);
        assert!(matches!(
            result,
            Err(RegistrationError::RegistryFull { capacity: 3 })
        ));

        assert!(registry.deregister(&addr(8002)));
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(addr(8004), tx).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn deregistered_peer_disappears_from_routing() {
        let (mut registry, mut receivers) = populated(&[8001, 8002, 8003]);
        registry.deregister(&addr(8002));

        // Only one peer left beside the sender: routing reports it.
        let result = registry.route(&message(&addr(8001), Directive::SendFirst));
        assert!(matches!(result, Err(RoutingError::InsufficientPeers { .. })));
        for (_, rx) in receivers.iter_mut() {
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn dead_forwarder_does_not_break_broadcast_to_the_live_peer() {
        let (registry, mut receivers) = populated(&[8001, 8002, 8003]);

        // Drop 8002's receiver: its writer task is gone.
        let position = receivers.iter().position(|(a, _)| *a == addr(8002)).unwrap();
        receivers.remove(position);

        let delivered = registry
            .route(&message(&addr(8001), Directive::Broadcast))
            .unwrap();
        assert_eq!(delivered, vec![addr(8003)]);

        let rx_8003 = &mut receivers.iter_mut().find(|(a, _)| *a == addr(8003)).unwrap().1;
        assert!(rx_8003.try_recv().is_ok());
    }
}
