//! In-process experiment orchestration
//!
//! Runs the router and exactly three clients for a fixed duration, then
//! shuts everything down and leaves one event log per client under the
//! experiment's directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::sleep;
use tracing::{info, warn};

use driftlab_client::{Client, ClientConfig, JsonLinesSink};
use driftlab_core::{draw_clock_speed, EventMix, HostAddr};
use driftlab_router::{Router, RouterConfig};

use crate::config::AppConfig;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Experiment Plan
// ----------------------------------------------------------------------------

/// Everything an experiment run needs, resolved from configuration and CLI
/// overrides.
#[derive(Debug, Clone)]
pub struct ExperimentPlan {
    pub name: String,
    pub run_time: Duration,
    pub clock_speeds: [u32; 3],
    pub mix: EventMix,
    pub router_addr: SocketAddr,
    pub client_ports: [u16; 3],
    pub log_dir: PathBuf,
}

impl ExperimentPlan {
    /// Resolve a plan, drawing missing clock speeds from the configured
    /// range.
    pub fn resolve(
        name: String,
        run_time: Option<u64>,
        clock_speeds: Option<Vec<u32>>,
        prob_internal: Option<f64>,
        config: &AppConfig,
    ) -> Result<Self> {
        let speeds = match clock_speeds {
            Some(given) => {
                let speeds: [u32; 3] = given.try_into().map_err(|given: Vec<u32>| {
                    crate::error::CliError::Config(format!(
                        "exactly 3 clock speeds are required, got {}",
                        given.len()
                    ))
                })?;
                if speeds.contains(&0) {
                    return Err(crate::error::CliError::Config(
                        "clock speeds must be at least 1 Hz".to_string(),
                    ));
                }
                speeds
            }
            None => {
                let mut rng = StdRng::from_entropy();
                let mut speeds = [0u32; 3];
                for speed in &mut speeds {
                    *speed = draw_clock_speed(&mut rng, config.speed_range());
                }
                info!("no clock speeds given, drew {:?}", speeds);
                speeds
            }
        };

        let mix = match prob_internal {
            Some(p) => {
                let mix = EventMix::uniform_sends(p);
                mix.validate()
                    .map_err(|e| crate::error::CliError::Config(e.to_string()))?;
                mix
            }
            None => config.mix(),
        };

        let client_ports: [u16; 3] =
            config.network.client_ports.clone().try_into().map_err(
                |ports: Vec<u16>| {
                    crate::error::CliError::Config(format!(
                        "exactly 3 client ports are required, got {}",
                        ports.len()
                    ))
                },
            )?;

        Ok(Self {
            name,
            run_time: Duration::from_secs(run_time.unwrap_or(config.simulation.run_time_secs)),
            clock_speeds: speeds,
            mix,
            router_addr: config.network.router_addr,
            client_ports,
            log_dir: config.logging.dir.clone(),
        })
    }
}

// ----------------------------------------------------------------------------
// Experiment Runner
// ----------------------------------------------------------------------------

/// Run the plan to completion (or until Ctrl-C).
pub async fn run(plan: ExperimentPlan) -> Result<()> {
    info!(
        "experiment '{}' starting: {:?} Hz for {:?}",
        plan.name, plan.clock_speeds, plan.run_time
    );

    let router = Router::bind(RouterConfig {
        listen_addr: plan.router_addr,
        ..RouterConfig::default()
    })
    .await?;
    let router_addr = router.local_addr()?;
    let router_shutdown = router.shutdown_token();
    let router_task = tokio::spawn(router.run());

    let log_dir = plan.log_dir.join(&plan.name);
    let mut clients = Vec::with_capacity(3);
    for (port, speed) in plan.client_ports.into_iter().zip(plan.clock_speeds) {
        let bind_addr = SocketAddr::from(([127, 0, 0, 1], port));
        let sink = JsonLinesSink::for_client(&log_dir, &HostAddr::from(bind_addr))?;
        let config = ClientConfig {
            bind_addr,
            router_addr,
            clock_speed: Some(speed),
            mix: plan.mix,
            ..ClientConfig::default()
        };
        let handle = Client::connect(config, Box::new(sink)).await?;
        info!("client {} running at {speed} Hz", handle.addr());
        clients.push(handle);
    }

    tokio::select! {
        _ = sleep(plan.run_time) => info!("run time elapsed, stopping"),
        _ = tokio::signal::ctrl_c() => info!("interrupt received, stopping early"),
    }

    // Clients first so the router sees clean disconnects, then the router.
    for handle in clients {
        let addr = handle.addr().clone();
        if let Err(e) = handle.shutdown().await {
            warn!("client {addr} ended with error: {e}");
        }
    }
    router_shutdown.cancel();
    router_task.await??;

    info!(
        "experiment '{}' complete, logs in {}",
        plan.name,
        log_dir.display()
    );
    Ok(())
}
