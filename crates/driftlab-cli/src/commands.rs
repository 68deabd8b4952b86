//! Subcommand execution

use std::net::SocketAddr;

use tracing::info;

use driftlab_client::{Client, ClientConfig, JsonLinesSink};
use driftlab_core::HostAddr;
use driftlab_router::{Router, RouterConfig};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::Result;
use crate::experiment::{self, ExperimentPlan};

/// Routes parsed commands to their implementations.
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Router { listen } => {
                Self::run_router(listen.unwrap_or(config.network.router_addr)).await
            }
            Commands::Client {
                bind,
                router,
                clock_speed,
                exp_name,
            } => {
                Self::run_client(
                    bind,
                    router.unwrap_or(config.network.router_addr),
                    clock_speed,
                    exp_name,
                    &config,
                )
                .await
            }
            Commands::Experiment {
                name,
                run_time,
                clock_speeds,
                prob_internal,
            } => {
                let plan =
                    ExperimentPlan::resolve(name, run_time, clock_speeds, prob_internal, &config)?;
                experiment::run(plan).await
            }
        }
    }

    /// Serve the router until interrupted.
    async fn run_router(listen: SocketAddr) -> Result<()> {
        let router = Router::bind(RouterConfig {
            listen_addr: listen,
            ..RouterConfig::default()
        })
        .await?;
        let shutdown = router.shutdown_token();
        let task = tokio::spawn(router.run());

        tokio::signal::ctrl_c().await?;
        info!("interrupt received, shutting down");
        shutdown.cancel();
        task.await??;
        Ok(())
    }

    /// Run one client until interrupted.
    async fn run_client(
        bind: SocketAddr,
        router: SocketAddr,
        clock_speed: Option<u32>,
        exp_name: String,
        config: &AppConfig,
    ) -> Result<()> {
        let log_dir = config.logging.dir.join(&exp_name);
        let sink = JsonLinesSink::for_client(&log_dir, &HostAddr::from(bind))?;

        let client_config = ClientConfig {
            bind_addr: bind,
            router_addr: router,
            clock_speed,
            speed_range: config.speed_range(),
            mix: config.mix(),
        };
        let handle = Client::connect(client_config, Box::new(sink)).await?;
        info!(
            "client {} running at {} Hz, press Ctrl-C to stop",
            handle.addr(),
            handle.clock_speed()
        );

        tokio::signal::ctrl_c().await?;
        handle.shutdown().await?;
        Ok(())
    }
}
