use pumplink_core::constants::{DEFAULT_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
use pumplink_core::{CrcOrder, NozzleNumber, PumpAddress};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine settings for one pump.
///
/// # Example
///
/// ```
/// use pumplink_engine::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{"crc_order": "hilo", "auto_poll": true}"#).unwrap();
/// assert!(config.auto_poll);
/// assert!(config.auto_ack);
/// assert_eq!(config.address.as_u8(), 0x50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub address: PumpAddress,
    pub nozzle: NozzleNumber,
    pub crc_order: CrcOrder,
    /// Answer every CRC-valid long frame with a minimal ack.
    pub auto_ack: bool,
    /// Send a minimal poll on every heartbeat tick.
    pub auto_poll: bool,
    pub poll_interval_ms: u64,
}

impl EngineConfig {
    /// Heartbeat period, never below the minimum poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: PumpAddress::default(),
            nozzle: NozzleNumber::default(),
            crc_order: CrcOrder::LoHi,
            auto_ack: true,
            auto_poll: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}
