use crate::{
    Result,
    constants::{DEFAULT_ADDRESS, DEFAULT_NOZZLE},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pump address on the RS-485 bus (any value 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PumpAddress(u8);

impl PumpAddress {
    #[must_use]
    pub const fn new(address: u8) -> Self {
        PumpAddress(address)
    }

    /// Get the raw address byte.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Default for PumpAddress {
    fn default() -> Self {
        PumpAddress(DEFAULT_ADDRESS)
    }
}

impl fmt::Display for PumpAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl std::str::FromStr for PumpAddress {
    type Err = Error;

    /// Accepts decimal (`80`) or hex with a `0x` prefix (`0x50`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => s.parse::<u8>(),
        };
        parsed
            .map(PumpAddress)
            .map_err(|_| Error::InvalidAddress(format!("expected 0-255 or 0x00-0xFF, got {s:?}")))
    }
}

/// Nozzle number (1-15), carried in the low nibble of nozzle status bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct NozzleNumber(u8);

impl NozzleNumber {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 15;

    /// Create a new nozzle number with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidNozzle` if the number is outside 1-15.
    pub fn new(nozzle: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&nozzle) {
            return Err(Error::InvalidNozzle(format!(
                "nozzle must be {}-{}, got {nozzle}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(NozzleNumber(nozzle))
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Default for NozzleNumber {
    fn default() -> Self {
        NozzleNumber(DEFAULT_NOZZLE)
    }
}

impl TryFrom<u8> for NozzleNumber {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        NozzleNumber::new(value)
    }
}

impl From<NozzleNumber> for u8 {
    fn from(nozzle: NozzleNumber) -> u8 {
        nozzle.0
    }
}

impl fmt::Display for NozzleNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order of the two CRC bytes on the wire.
///
/// Field installations disagree on this, so it is a runtime setting applied
/// uniformly to outbound frames and inbound verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrcOrder {
    /// Low byte first (default).
    #[default]
    LoHi,
    /// High byte first.
    HiLo,
}

impl CrcOrder {
    /// Split a CRC value into its two wire bytes.
    #[must_use]
    pub const fn split(self, crc: u16) -> [u8; 2] {
        let [lo, hi] = crc.to_le_bytes();
        match self {
            CrcOrder::LoHi => [lo, hi],
            CrcOrder::HiLo => [hi, lo],
        }
    }

    /// Reassemble a CRC value from its two wire bytes.
    #[must_use]
    pub const fn join(self, bytes: [u8; 2]) -> u16 {
        match self {
            CrcOrder::LoHi => u16::from_le_bytes(bytes),
            CrcOrder::HiLo => u16::from_be_bytes(bytes),
        }
    }
}

impl fmt::Display for CrcOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrcOrder::LoHi => write!(f, "LO,HI"),
            CrcOrder::HiLo => write!(f, "HI,LO"),
        }
    }
}

impl std::str::FromStr for CrcOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lohi" | "lo,hi" | "lo-hi" => Ok(CrcOrder::LoHi),
            "hilo" | "hi,lo" | "hi-lo" => Ok(CrcOrder::HiLo),
            other => Err(Error::Config(format!(
                "unknown CRC order {other:?} (expected lohi or hilo)"
            ))),
        }
    }
}

/// Canonical pump state.
///
/// The physical pump is authoritative: every decoded status sets the state
/// directly, there are no rejected transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PumpState {
    NotProgrammed,
    #[default]
    Reset,
    Authorized,
    Filling,
    Suspended,
    FillingCompleted,
    MaxAmountVolume,
    SwitchedOff,
}

impl PumpState {
    /// States that close the sale window.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            PumpState::FillingCompleted
                | PumpState::MaxAmountVolume
                | PumpState::Reset
                | PumpState::SwitchedOff
                | PumpState::NotProgrammed
        )
    }

    /// Terminal states that also clear sale-scoped memory.
    #[must_use]
    pub const fn is_reset_class(&self) -> bool {
        matches!(
            self,
            PumpState::Reset | PumpState::SwitchedOff | PumpState::NotProgrammed
        )
    }

    /// States that open a sale window when entered from elsewhere.
    #[must_use]
    pub const fn opens_sale(&self) -> bool {
        matches!(self, PumpState::Authorized | PumpState::Filling)
    }

    /// States in which a sale is considered authorized (vehicle present).
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        matches!(
            self,
            PumpState::Authorized | PumpState::Filling | PumpState::Suspended
        )
    }

    /// Display color key for status indicators.
    #[must_use]
    pub const fn display_key(&self) -> &'static str {
        match self {
            PumpState::NotProgrammed => "red",
            PumpState::Reset => "gray",
            PumpState::Authorized => "orange",
            PumpState::Filling => "green",
            PumpState::Suspended => "yellow",
            PumpState::FillingCompleted => "blue",
            PumpState::MaxAmountVolume => "purple",
            PumpState::SwitchedOff => "black",
        }
    }

    /// Short operator-facing status message.
    #[must_use]
    pub const fn status_hint(&self) -> &'static str {
        match self {
            PumpState::NotProgrammed => "NOT PROGRAMMED",
            PumpState::Reset => "RESET",
            PumpState::Authorized | PumpState::FillingCompleted => "PUMP READY",
            PumpState::Filling => "FILLING IN PROGRESS",
            PumpState::Suspended => "FILLING PAUSED",
            PumpState::MaxAmountVolume => "LIMIT REACHED",
            PumpState::SwitchedOff => "SYSTEM OFF",
        }
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            PumpState::NotProgrammed => "NOT PROGRAMMED",
            PumpState::Reset => "RESET",
            PumpState::Authorized => "AUTHORIZED",
            PumpState::Filling => "FILLING",
            PumpState::Suspended => "SUSPENDED",
            PumpState::FillingCompleted => "FILLING COMPLETED",
            PumpState::MaxAmountVolume => "MAX AMOUNT/VOLUME",
            PumpState::SwitchedOff => "SWITCHED OFF",
        };
        f.write_str(label)
    }
}
