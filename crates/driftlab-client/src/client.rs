//! Client lifecycle: connect, spawn listener and worker, shut down

use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::TcpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use driftlab_core::{
    draw_clock_speed, sampler::DEFAULT_SPEED_RANGE, EventMix, EventSink, HostAddr, LamportClock,
    SystemTimeSource, TimeSource,
};

use crate::error::{ClientError, Result};
use crate::listener::run_listener;
use crate::worker::Worker;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Address to bind the client socket to. This is the client's identity:
    /// the router registers the connection under exactly this address.
    pub bind_addr: SocketAddr,
    /// Router to connect to at startup.
    pub router_addr: SocketAddr,
    /// Fixed tick rate in Hz; drawn from `speed_range` when absent.
    pub clock_speed: Option<u32>,
    /// Range the tick rate is drawn from.
    pub speed_range: RangeInclusive<u32>,
    /// Probability partition over idle-tick outcomes.
    pub mix: EventMix,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            router_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            clock_speed: None,
            speed_range: DEFAULT_SPEED_RANGE,
            mix: EventMix::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Client
// ----------------------------------------------------------------------------

/// Entry point for running a simulated client process.
pub struct Client;

impl Client {
    /// Connect to the router and start the listener/worker pair with system
    /// randomness and the system clock.
    pub async fn connect(
        config: ClientConfig,
        sink: Box<dyn EventSink>,
    ) -> Result<ClientHandle> {
        Self::connect_with(config, sink, StdRng::from_entropy(), SystemTimeSource).await
    }

    /// Connect with explicit randomness and time sources, so tests drive the
    /// loop deterministically.
    pub async fn connect_with<R, T>(
        config: ClientConfig,
        sink: Box<dyn EventSink>,
        mut rng: R,
        time: T,
    ) -> Result<ClientHandle>
    where
        R: Rng + Send + 'static,
        T: TimeSource + Send + 'static,
    {
        config.mix.validate()?;
        let clock_speed = config
            .clock_speed
            .unwrap_or_else(|| draw_clock_speed(&mut rng, config.speed_range.clone()));

        let socket = if config.bind_addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|source| ClientError::Bind {
            addr: config.bind_addr,
            source,
        })?;
        socket
            .set_reuseaddr(true)
            .and_then(|()| socket.bind(config.bind_addr))
            .map_err(|source| ClientError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        let stream = socket
            .connect(config.router_addr)
            .await
            .map_err(|source| ClientError::Connect {
                router_addr: config.router_addr,
                source,
            })?;
        let addr = HostAddr::from(stream.local_addr().map_err(|source| ClientError::Connect {
            router_addr: config.router_addr,
            source,
        })?);

        info!(
            "client {addr} connected to router {} at {clock_speed} Hz",
            config.router_addr
        );

        let (read_half, write_half) = stream.into_split();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let listener = tokio::spawn(run_listener(
            read_half,
            queue_tx,
            addr.clone(),
            shutdown.clone(),
        ));

        let worker = Worker {
            addr: addr.clone(),
            clock: LamportClock::new(),
            tick: Duration::from_secs_f64(1.0 / f64::from(clock_speed)),
            mix: config.mix,
            queue: queue_rx,
            writer: write_half,
            sink,
            rng,
            time,
            shutdown: shutdown.clone(),
        };
        let worker = tokio::spawn(worker.run());

        Ok(ClientHandle {
            addr,
            clock_speed,
            shutdown,
            listener,
            worker,
        })
    }
}

// ----------------------------------------------------------------------------
// Client Handle
// ----------------------------------------------------------------------------

/// Handle over a running client's tasks.
pub struct ClientHandle {
    addr: HostAddr,
    clock_speed: u32,
    shutdown: CancellationToken,
    listener: JoinHandle<()>,
    worker: JoinHandle<Result<()>>,
}

impl ClientHandle {
    /// The address the client is registered under.
    pub fn addr(&self) -> &HostAddr {
        &self.addr
    }

    /// The tick rate assigned at startup.
    pub fn clock_speed(&self) -> u32 {
        self.clock_speed
    }

    /// Stop both tasks promptly and report how the worker ended.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        let worker_outcome = self.worker.await?;
        self.listener.await?;
        info!("client {} stopped", self.addr);
        worker_outcome
    }
}
