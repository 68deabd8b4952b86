//! Worker task: the client's tick loop
//!
//! One iteration per tick of the client's private clock rate. A tick either
//! drains exactly one queued message (receive) or draws a random outcome
//! (send to a peer, broadcast, or internal step). Every iteration advances
//! the Lamport clock exactly once and appends exactly one event record.

use std::time::Duration;

use rand::Rng;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use driftlab_core::{
    wire, EventKind, EventMix, EventRecord, EventSink, HostAddr, LamportClock, Message,
    TickAction, TimeSource,
};

use crate::error::{ClientError, Result};

pub(crate) struct Worker<W, R, T> {
    pub(crate) addr: HostAddr,
    pub(crate) clock: LamportClock,
    pub(crate) tick: Duration,
    pub(crate) mix: EventMix,
    pub(crate) queue: mpsc::UnboundedReceiver<Message>,
    pub(crate) writer: W,
    pub(crate) sink: Box<dyn EventSink>,
    pub(crate) rng: R,
    pub(crate) time: T,
    pub(crate) shutdown: CancellationToken,
}

impl<W, R, T> Worker<W, R, T>
where
    W: AsyncWrite + Unpin,
    R: Rng,
    T: TimeSource,
{
    /// Run until shutdown. The sleep to the next tick boundary is the only
    /// suspension point besides the actual socket write.
    pub(crate) async fn run(mut self) -> Result<()> {
        let mut interval = tokio::time::interval(self.tick);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.step().await?;
        }
        debug!("client {} worker stopped at logical time {}", self.addr, self.clock.current());
        Ok(())
    }

    /// One tick of the event loop.
    async fn step(&mut self) -> Result<()> {
        match self.queue.try_recv() {
            Ok(message) => {
                let logical_time = self.clock.observe(message.logical_time);
                self.record(EventKind::Receive, logical_time, Some(message))?;
            }
            Err(TryRecvError::Empty) => match self.mix.draw(&mut self.rng) {
                TickAction::Send(kind) => {
                    let logical_time = self.clock.tick();
                    let message =
                        Message::new(self.addr.clone(), kind, self.time.now(), logical_time);
                    wire::write_message(&mut self.writer, &message)
                        .await
                        .map_err(ClientError::ConnectionLost)?;
                    self.record(EventKind::Send, logical_time, Some(message))?;
                }
                TickAction::Internal => {
                    let logical_time = self.clock.tick();
                    self.record(EventKind::Internal, logical_time, None)?;
                }
            },
            Err(TryRecvError::Disconnected) => return Err(ClientError::Disconnected),
        }
        Ok(())
    }

    fn record(
        &mut self,
        kind: EventKind,
        logical_time: u64,
        message: Option<Message>,
    ) -> Result<()> {
        let event = EventRecord {
            kind,
            system_time: self.time.now(),
            logical_time,
            queue_depth: self.queue.len(),
            message,
        };
        self.sink.record(&event)?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use driftlab_core::{Directive, MemorySink};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tokio::io::DuplexStream;
    use tokio::sync::mpsc::UnboundedSender;

    struct FixedTime(f64);

    impl TimeSource for FixedTime {
        fn now(&self) -> f64 {
            self.0
        }
    }

    fn addr() -> HostAddr {
        HostAddr::new("localhost", 8001)
    }

    fn peer_message(logical_time: u64) -> Message {
        Message::new(
            HostAddr::new("localhost", 8002),
            Directive::SendFirst,
            0.0,
            logical_time,
        )
    }

    #[allow(clippy::type_complexity)]
    fn test_worker(
        mix: EventMix,
    ) -> (
        Worker<DuplexStream, ChaCha8Rng, FixedTime>,
        UnboundedSender<Message>,
        DuplexStream,
        MemorySink,
    ) {
        let (local, remote) = tokio::io::duplex(4096);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let sink = MemorySink::new();
        let worker = Worker {
            addr: addr(),
            clock: LamportClock::new(),
            tick: Duration::from_millis(1),
            mix,
            queue: queue_rx,
            writer: local,
            sink: Box::new(sink.clone()),
            rng: ChaCha8Rng::seed_from_u64(11),
            time: FixedTime(1_000.5),
            shutdown: CancellationToken::new(),
        };
        (worker, queue_tx, remote, sink)
    }

    #[tokio::test]
    async fn receive_applies_the_max_rule() {
        let (mut worker, queue, _remote, sink) = test_worker(EventMix::all_internal());

        // Three internal ticks bring the local clock to 3.
        for _ in 0..3 {
            worker.step().await.unwrap();
        }
        queue.send(peer_message(7)).unwrap();
        worker.step().await.unwrap();

        let events = sink.snapshot();
        assert_eq!(events.len(), 4);
        let receive = &events[3];
        assert_eq!(receive.kind, EventKind::Receive);
        // max(3, 7) + 1
        assert_eq!(receive.logical_time, 8);
        assert_eq!(receive.message, Some(peer_message(7)));
    }

    #[tokio::test]
    async fn queue_drains_fifo_one_message_per_tick() {
        let (mut worker, queue, _remote, sink) = test_worker(EventMix::all_internal());

        for logical_time in [10, 11, 12] {
            queue.send(peer_message(logical_time)).unwrap();
        }
        for _ in 0..3 {
            worker.step().await.unwrap();
        }

        let events = sink.snapshot();
        let received: Vec<u64> = events
            .iter()
            .map(|e| e.message.as_ref().unwrap().logical_time)
            .collect();
        assert_eq!(received, vec![10, 11, 12]);
        let depths: Vec<usize> = events.iter().map(|e| e.queue_depth).collect();
        assert_eq!(depths, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn receive_takes_priority_over_sending() {
        let mix = EventMix {
            p_send_first: 1.0,
            p_send_second: 0.0,
            p_broadcast: 0.0,
        };
        let (mut worker, queue, _remote, sink) = test_worker(mix);

        queue.send(peer_message(5)).unwrap();
        worker.step().await.unwrap();

        let events = sink.snapshot();
        assert_eq!(events[0].kind, EventKind::Receive);
    }

    #[tokio::test]
    async fn sends_carry_the_post_update_logical_time() {
        let mix = EventMix {
            p_send_first: 1.0,
            p_send_second: 0.0,
            p_broadcast: 0.0,
        };
        let (mut worker, _queue, mut remote, sink) = test_worker(mix);

        worker.step().await.unwrap();
        worker.step().await.unwrap();

        for expected in [1u64, 2] {
            let message = wire::read_message(&mut remote).await.unwrap().unwrap();
            assert_eq!(message.source, addr());
            assert_eq!(message.kind, Directive::SendFirst);
            assert_eq!(message.logical_time, expected);
            assert_eq!(message.system_time, 1_000.5);
        }

        let events = sink.snapshot();
        assert!(events.iter().all(|e| e.kind == EventKind::Send));
        assert_eq!(events[0].logical_time, 1);
        assert_eq!(events[1].logical_time, 2);
    }

    #[tokio::test]
    async fn internal_ticks_advance_the_clock_by_one() {
        let (mut worker, _queue, _remote, sink) = test_worker(EventMix::all_internal());

        for _ in 0..5 {
            worker.step().await.unwrap();
        }

        let events = sink.snapshot();
        assert!(events.iter().all(|e| e.kind == EventKind::Internal));
        let clocks: Vec<u64> = events.iter().map(|e| e.logical_time).collect();
        assert_eq!(clocks, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn logical_clock_is_strictly_increasing_across_mixed_events() {
        let (mut worker, queue, _remote, sink) = test_worker(EventMix::all_internal());

        worker.step().await.unwrap();
        queue.send(peer_message(40)).unwrap();
        worker.step().await.unwrap();
        queue.send(peer_message(2)).unwrap();
        worker.step().await.unwrap();
        worker.step().await.unwrap();

        let clocks: Vec<u64> = sink.snapshot().iter().map(|e| e.logical_time).collect();
        for pair in clocks.windows(2) {
            assert!(pair[1] > pair[0], "clock went {} -> {}", pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn broken_connection_is_fatal_on_send() {
        let mix = EventMix {
            p_send_first: 0.0,
            p_send_second: 0.0,
            p_broadcast: 1.0,
        };
        let (mut worker, _queue, remote, _sink) = test_worker(mix);
        drop(remote);

        let outcome = worker.step().await;
        assert!(matches!(outcome, Err(ClientError::ConnectionLost(_))));
    }

    #[tokio::test]
    async fn closed_queue_surfaces_disconnection() {
        let (mut worker, queue, _remote, _sink) = test_worker(EventMix::all_internal());
        drop(queue);

        let outcome = worker.step().await;
        assert!(matches!(outcome, Err(ClientError::Disconnected)));
    }
}
