//! Command-line interface definitions and parsing

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the central router
    Router {
        /// Listen address; defaults to the configured router address
        #[arg(short, long)]
        listen: Option<SocketAddr>,
    },
    /// Run a single client against an already-running router
    Client {
        /// Address to bind the client socket to (the client's identity)
        #[arg(short, long)]
        bind: SocketAddr,

        /// Router address to connect to
        #[arg(short, long)]
        router: Option<SocketAddr>,

        /// Fixed clock speed in Hz; drawn from the configured range when omitted
        #[arg(long)]
        clock_speed: Option<u32>,

        /// Experiment name used for the log directory
        #[arg(long, default_value = "adhoc")]
        exp_name: String,
    },
    /// Run the router and three clients in-process for a fixed duration
    Experiment {
        /// Experiment name used for the log directory
        #[arg(long)]
        name: String,

        /// Total run time in seconds; defaults to the configured value
        #[arg(long)]
        run_time: Option<u64>,

        /// Exactly three clock speeds; drawn from the configured range when omitted
        #[arg(long, num_args = 3)]
        clock_speeds: Option<Vec<u32>>,

        /// Probability that an idle tick is an internal event
        #[arg(long)]
        prob_internal: Option<f64>,
    },
}
