use pumplink_core::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS, MIN_READ_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    #[default]
    Odd,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Parity::None => f.write_str("N"),
            Parity::Even => f.write_str("E"),
            Parity::Odd => f.write_str("O"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StopBits::One => f.write_str("1"),
            StopBits::Two => f.write_str("2"),
        }
    }
}

/// Serial line settings. Data bits are always eight.
///
/// # Example
///
/// ```
/// use pumplink_transport::{Parity, SerialConfig};
///
/// let config = SerialConfig {
///     port: "/dev/ttyUSB0".to_string(),
///     ..SerialConfig::default()
/// };
/// assert_eq!(config.baud_rate, 9600);
/// assert_eq!(config.parity, Parity::Odd);
/// assert_eq!(config.to_string(), "/dev/ttyUSB0 9600 8O1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Bounds how long a close waits for the reader to notice.
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(MIN_READ_TIMEOUT_MS))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} 8{}{}",
            self.port, self.baud_rate, self.parity, self.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.parity, Parity::Odd);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.read_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_read_timeout_clamped() {
        let config = SerialConfig {
            read_timeout_ms: 1,
            ..SerialConfig::default()
        };
        assert_eq!(config.read_timeout(), Duration::from_millis(5));
    }

    #[test]
    fn test_partial_deserialize() {
        let config: SerialConfig =
            serde_json::from_str(r#"{"port": "COM3", "parity": "even", "stop_bits": "two"}"#)
                .unwrap();
        assert_eq!(config.port, "COM3");
        assert_eq!(config.parity, Parity::Even);
        assert_eq!(config.stop_bits, StopBits::Two);
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.to_string(), "COM3 9600 8E2");
    }
}
