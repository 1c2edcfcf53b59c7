//! Application configuration.
//!
//! ```toml
//! counters_path = "/var/lib/pumplink/counters.json"
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! parity = "odd"
//!
//! [engine]
//! address = 80
//! crc_order = "lohi"
//! auto_poll = true
//! poll_interval_ms = 500
//! ```
//!
//! Every key is optional; command-line flags override the file.

use anyhow::{Context, Result};
use pumplink_core::NozzleNumber;
use pumplink_engine::EngineConfig;
use pumplink_transport::SerialConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::RunArgs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub engine: EngineConfig,
    pub counters_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            engine: EngineConfig::default(),
            counters_path: PathBuf::from("counters.json"),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn apply_run_args(&mut self, args: &RunArgs) -> Result<()> {
        if let Some(port) = &args.port {
            self.serial.port.clone_from(port);
        }
        if let Some(baud) = args.baud {
            self.serial.baud_rate = baud;
        }
        if let Some(parity) = args.parity {
            self.serial.parity = parity.into();
        }
        if let Some(stop_bits) = args.stop_bits {
            self.serial.stop_bits = stop_bits.into();
        }
        if let Some(address) = args.address {
            self.engine.address = address;
        }
        if let Some(nozzle) = args.nozzle {
            self.engine.nozzle = NozzleNumber::new(nozzle).context("invalid --nozzle")?;
        }
        if let Some(order) = args.crc {
            self.engine.crc_order = order;
        }
        if args.auto_poll {
            self.engine.auto_poll = true;
        }
        if let Some(poll_ms) = args.poll_ms {
            self.engine.poll_interval_ms = poll_ms;
        }
        if args.no_auto_ack {
            self.engine.auto_ack = false;
        }
        if let Some(counters) = &args.counters {
            self.counters_path.clone_from(counters);
        }
        Ok(())
    }
}
