//! Full-stack test: router plus three clients over real TCP.
//!
//! One client is forced to send on every tick while the other two stay
//! passive, so the routing outcome is observable in the event logs without
//! depending on random draws.

use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::time::sleep;

use driftlab_client::{Client, ClientConfig, ClientHandle};
use driftlab_core::{EventKind, EventMix, MemorySink, SystemTimeSource};
use driftlab_router::{Router, RouterConfig};

async fn start_router() -> std::net::SocketAddr {
    let config = RouterConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..RouterConfig::default()
    };
    let router = Router::bind(config).await.unwrap();
    let addr = router.local_addr().unwrap();
    tokio::spawn(router.run());
    addr
}

async fn connect_client(
    router: std::net::SocketAddr,
    mix: EventMix,
    seed: u64,
) -> (ClientHandle, MemorySink) {
    let sink = MemorySink::new();
    let config = ClientConfig {
        router_addr: router,
        clock_speed: Some(10),
        mix,
        ..ClientConfig::default()
    };
    let handle = Client::connect_with(
        config,
        Box::new(sink.clone()),
        ChaCha8Rng::seed_from_u64(seed),
        SystemTimeSource,
    )
    .await
    .unwrap();
    (handle, sink)
}

#[tokio::test]
async fn send_first_lands_on_the_lexicographically_first_peer() {
    let router = start_router().await;

    let send_first_only = EventMix {
        p_send_first: 1.0,
        p_send_second: 0.0,
        p_broadcast: 0.0,
    };
    let (sender, sender_sink) = connect_client(router, send_first_only, 1).await;
    let (peer_a, sink_a) = connect_client(router, EventMix::all_internal(), 2).await;
    let (peer_b, sink_b) = connect_client(router, EventMix::all_internal(), 3).await;

    // Let the sender get a handful of ticks through the router.
    sleep(Duration::from_millis(800)).await;

    let sender_addr = sender.addr().clone();
    let addr_a = peer_a.addr().clone();
    let addr_b = peer_b.addr().clone();
    let mut peers = vec![addr_a.clone(), addr_b];
    peers.sort();

    sender.shutdown().await.unwrap();
    peer_a.shutdown().await.unwrap();
    peer_b.shutdown().await.unwrap();

    let receives = |sink: &MemorySink| {
        sink.snapshot()
            .into_iter()
            .filter(|e| e.kind == EventKind::Receive)
            .collect::<Vec<_>>()
    };

    // The sender never hears its own messages.
    assert!(receives(&sender_sink).is_empty());

    let (first_sink, second_sink) = if addr_a == peers[0] {
        (&sink_a, &sink_b)
    } else {
        (&sink_b, &sink_a)
    };

    let delivered = receives(first_sink);
    assert!(
        !delivered.is_empty(),
        "the lexicographically first peer should have received messages"
    );
    for event in &delivered {
        let message = event.message.as_ref().unwrap();
        assert_eq!(message.source, sender_addr);
    }

    // The other peer's queue stays empty the whole run.
    assert!(receives(second_sink).is_empty());
}

#[tokio::test]
async fn receive_clocks_jump_past_the_sender_timestamps() {
    let router = start_router().await;

    let broadcast_only = EventMix {
        p_send_first: 0.0,
        p_send_second: 0.0,
        p_broadcast: 1.0,
    };
    let (sender, _sender_sink) = connect_client(router, broadcast_only, 4).await;
    let (peer_a, sink_a) = connect_client(router, EventMix::all_internal(), 5).await;
    let (peer_b, sink_b) = connect_client(router, EventMix::all_internal(), 6).await;

    sleep(Duration::from_millis(800)).await;

    sender.shutdown().await.unwrap();
    peer_a.shutdown().await.unwrap();
    peer_b.shutdown().await.unwrap();

    for sink in [&sink_a, &sink_b] {
        let events = sink.snapshot();
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::Receive), "peer never received a broadcast");

        // Clock monotonicity across the whole log.
        for pair in events.windows(2) {
            assert!(pair[1].logical_time > pair[0].logical_time);
        }

        // The receive rule: strictly past the carried timestamp.
        for event in events.iter().filter(|e| e.kind == EventKind::Receive) {
            let message = event.message.as_ref().unwrap();
            assert!(event.logical_time > message.logical_time);
        }
    }
}
