//! Application configuration
//!
//! Defaults cover the standard setup (one local router, three clients,
//! 1-6 Hz clock speeds, 0.7 internal probability); a TOML file overrides
//! them and CLI flags override the file.

use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use driftlab_core::EventMix;

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Configuration Types
// ----------------------------------------------------------------------------

/// Complete configuration for the driftlab CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the router listens on and clients connect to.
    pub router_addr: SocketAddr,

    /// Ports the experiment's three clients bind on localhost.
    pub client_ports: Vec<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Inclusive clock-speed range clients draw from, in Hz.
    pub speed_min: u32,
    pub speed_max: u32,

    /// Probability that an idle tick is an internal event; the remainder is
    /// split evenly across the three send directives.
    pub prob_internal: f64,

    /// Default experiment duration in seconds.
    pub run_time_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory client event logs are written under, one subdirectory per
    /// experiment.
    pub dir: PathBuf,
}

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            router_addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            client_ports: vec![8001, 8002, 8003],
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed_min: 1,
            speed_max: 6,
            prob_internal: 0.7,
            run_time_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Validation
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a specific TOML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.simulation.speed_min == 0 {
            return Err(CliError::Config(
                "clock speeds must be at least 1 Hz".to_string(),
            ));
        }
        if self.simulation.speed_min > self.simulation.speed_max {
            return Err(CliError::Config(format!(
                "clock speed range {}..={} is empty",
                self.simulation.speed_min, self.simulation.speed_max
            )));
        }
        if !(0.0..=1.0).contains(&self.simulation.prob_internal) {
            return Err(CliError::Config(format!(
                "prob_internal must lie in [0, 1], got {}",
                self.simulation.prob_internal
            )));
        }
        if self.simulation.run_time_secs == 0 {
            return Err(CliError::Config("run time must be positive".to_string()));
        }
        if self.network.client_ports.len() != 3 {
            return Err(CliError::Config(format!(
                "exactly 3 client ports are required, got {}",
                self.network.client_ports.len()
            )));
        }
        self.mix()
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(())
    }

    /// The tick-outcome partition implied by `prob_internal`.
    pub fn mix(&self) -> EventMix {
        EventMix::uniform_sends(self.simulation.prob_internal)
    }

    /// The clock-speed range clients draw from.
    pub fn speed_range(&self) -> RangeInclusive<u32> {
        self.simulation.speed_min..=self.simulation.speed_max
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
