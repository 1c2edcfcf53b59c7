//! Command and response codes.
//!
//! - [`PumpCommand`]: the DCC byte carried by a generic command frame.
//! - [`ShortCode`]: the middle byte of a 3-byte minimal frame.
//! - [`ResponseKind`]: dispatch key derived from a long frame's command byte.

use pumplink_core::constants::{
    CMD_COMMAND, CMD_DIRECT_STATUS, CMD_EVENT, CMD_FILL_RECORD, CMD_SIM_NOZZLE, CMD_SIM_STATUS,
    CMD_SIM_TOTALS, CMD_SIM_VOLUME, CMD_STATUS_ALT, CMD_TOTALIZER, CMD_TOTALS, COMPOSITE_COMMANDS,
    MIN_CODE_ACK, MIN_CODE_BUSY, MIN_CODE_POLL, MIN_FRAME_PREFIX, TRAILER_BYTE,
};
use pumplink_core::{Error, PumpState, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pump command code (DCC) sent inside a CD1 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PumpCommand {
    ReturnStatus,
    ReturnFillInfo,
    Authorize,
    Stop,
    SwitchOff,
    Pause,
    Resume,
    /// Any other raw code.
    Other(u8),
}

impl PumpCommand {
    #[must_use]
    pub const fn from_u8(code: u8) -> Self {
        match code {
            0x00 => PumpCommand::ReturnStatus,
            0x04 => PumpCommand::ReturnFillInfo,
            0x06 => PumpCommand::Authorize,
            0x08 => PumpCommand::Stop,
            0x0A => PumpCommand::SwitchOff,
            0x0B => PumpCommand::Pause,
            0x0C => PumpCommand::Resume,
            other => PumpCommand::Other(other),
        }
    }

    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            PumpCommand::ReturnStatus => 0x00,
            PumpCommand::ReturnFillInfo => 0x04,
            PumpCommand::Authorize => 0x06,
            PumpCommand::Stop => 0x08,
            PumpCommand::SwitchOff => 0x0A,
            PumpCommand::Pause => 0x0B,
            PumpCommand::Resume => 0x0C,
            PumpCommand::Other(code) => *code,
        }
    }

    /// Pure queries, allowed before the handshake.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self, PumpCommand::ReturnStatus | PumpCommand::ReturnFillInfo)
    }

    /// Provisional display state after this command is sent.
    #[must_use]
    pub const fn intent(&self) -> Option<PumpState> {
        match self {
            PumpCommand::Authorize | PumpCommand::Resume => Some(PumpState::Authorized),
            PumpCommand::Pause => Some(PumpState::Suspended),
            PumpCommand::Stop => Some(PumpState::FillingCompleted),
            PumpCommand::SwitchOff => Some(PumpState::SwitchedOff),
            _ => None,
        }
    }
}

impl From<u8> for PumpCommand {
    fn from(code: u8) -> Self {
        PumpCommand::from_u8(code)
    }
}

impl fmt::Display for PumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PumpCommand::ReturnStatus => f.write_str("RETURN_STATUS"),
            PumpCommand::ReturnFillInfo => f.write_str("RETURN_FILL_INFO"),
            PumpCommand::Authorize => f.write_str("AUTHORIZE"),
            PumpCommand::Stop => f.write_str("STOP"),
            PumpCommand::SwitchOff => f.write_str("SWITCH_OFF"),
            PumpCommand::Pause => f.write_str("PAUSE"),
            PumpCommand::Resume => f.write_str("RESUME"),
            PumpCommand::Other(code) => write!(f, "DCC_0x{code:02X}"),
        }
    }
}

impl std::str::FromStr for PumpCommand {
    type Err = Error;

    /// Accepts operator names (`auth`, `stop`, ...) or a raw code (`0x0C`).
    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        let command = match name.as_str() {
            "status" | "return_status" => PumpCommand::ReturnStatus,
            "fillinfo" | "fill_info" | "return_fill_info" => PumpCommand::ReturnFillInfo,
            "auth" | "authorize" => PumpCommand::Authorize,
            "stop" => PumpCommand::Stop,
            "off" | "switch_off" | "switchoff" => PumpCommand::SwitchOff,
            "pause" | "suspend" => PumpCommand::Pause,
            "resume" => PumpCommand::Resume,
            other => {
                let hex = other.strip_prefix("0x").ok_or_else(|| {
                    Error::InvalidCommandCode(format!("unknown pump command {s:?}"))
                })?;
                let code = u8::from_str_radix(hex, 16)
                    .map_err(|_| Error::InvalidCommandCode(format!("invalid code {s:?}")))?;
                PumpCommand::from_u8(code)
            }
        };
        Ok(command)
    }
}

/// Code byte of a minimal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShortCode {
    /// `50 20 FA`
    Poll,
    /// `50 C0 FA`
    Ack,
    /// `50 70 FA`, the pump's keepalive answer to a poll.
    Busy,
    Unknown(u8),
}

impl ShortCode {
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        match self {
            ShortCode::Poll => MIN_CODE_POLL,
            ShortCode::Ack => MIN_CODE_ACK,
            ShortCode::Busy => MIN_CODE_BUSY,
            ShortCode::Unknown(code) => *code,
        }
    }

    /// Complete wire frame for this code.
    #[must_use]
    pub const fn frame(&self) -> [u8; 3] {
        [MIN_FRAME_PREFIX, self.as_u8(), TRAILER_BYTE]
    }
}

impl From<u8> for ShortCode {
    fn from(code: u8) -> Self {
        match code {
            MIN_CODE_POLL => ShortCode::Poll,
            MIN_CODE_ACK => ShortCode::Ack,
            MIN_CODE_BUSY => ShortCode::Busy,
            other => ShortCode::Unknown(other),
        }
    }
}

impl fmt::Display for ShortCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShortCode::Poll => f.write_str("MIN-POLL"),
            ShortCode::Ack => f.write_str("MIN-ACK"),
            ShortCode::Busy => f.write_str("MIN-BUSY"),
            ShortCode::Unknown(code) => write!(f, "MIN-UNKNOWN(0x{code:02X})"),
        }
    }
}

/// Sub-record layout of a composite frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    /// `0x38`: nozzle and trigger events.
    Event,
    /// `0x3D`: totalizer blocks.
    Totalizer,
    /// `0x3E`: filling record.
    FillRecord,
    /// `0x65`: total counters (DC101).
    Totals,
    /// Remaining `0x31`-`0x3F` commands: DC1/DC2/DC3 transactions.
    Transactions,
}

/// Dispatch key for a long frame, derived from its command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// `0x30` / `0xCD`: single status byte.
    StatusReply,
    /// `0x01`: direct pump status.
    DirectStatus,
    /// `0xD1`: simulator status.
    SimStatus,
    /// `0xD2`: simulator filled volume.
    SimVolume,
    /// `0xD3`: simulator totals.
    SimTotals,
    /// `0xD4`: simulator nozzle flag.
    SimNozzle,
    Composite(CompositeKind),
    Unknown(u8),
}

impl ResponseKind {
    #[must_use]
    pub fn from_command(command: u8) -> Self {
        match command {
            CMD_COMMAND | CMD_STATUS_ALT => ResponseKind::StatusReply,
            CMD_DIRECT_STATUS => ResponseKind::DirectStatus,
            CMD_SIM_STATUS => ResponseKind::SimStatus,
            CMD_SIM_VOLUME => ResponseKind::SimVolume,
            CMD_SIM_TOTALS => ResponseKind::SimTotals,
            CMD_SIM_NOZZLE => ResponseKind::SimNozzle,
            CMD_TOTALS => ResponseKind::Composite(CompositeKind::Totals),
            CMD_EVENT => ResponseKind::Composite(CompositeKind::Event),
            CMD_TOTALIZER => ResponseKind::Composite(CompositeKind::Totalizer),
            CMD_FILL_RECORD => ResponseKind::Composite(CompositeKind::FillRecord),
            c if COMPOSITE_COMMANDS.contains(&c) => {
                ResponseKind::Composite(CompositeKind::Transactions)
            }
            other => ResponseKind::Unknown(other),
        }
    }

    /// Whether a CRC-valid frame of this kind proves the pump is listening.
    ///
    /// Simulator data frames (`0xD2`-`0xD4`) do not count.
    #[must_use]
    pub const fn opens_handshake(&self) -> bool {
        matches!(
            self,
            ResponseKind::StatusReply
                | ResponseKind::DirectStatus
                | ResponseKind::SimStatus
                | ResponseKind::Composite(_)
        )
    }
}
