use bytes::Bytes;
use pumplink_core::constants::{
    CMD_COMMAND, CMD_TOTALS, CMD_TOTALS_REQUEST, ETX_BYTE, MAX_PRESET_LITERS, MIN_PRESET_LITERS,
    PRESET_DATA_LEN, TRANS_NOZZLE, TRAILER_BYTE,
};
use pumplink_core::{CrcOrder, Error, NozzleNumber, PumpAddress, Result};
use std::fmt;

use crate::bcd;
use crate::commands::{PumpCommand, ShortCode};
use crate::crc;

/// What an outbound frame asks the pump to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    /// CD1 generic command.
    Command(PumpCommand),
    /// CD3 preset volume, as sent (liters x 100).
    PresetVolume { centiliters: u32 },
    /// CD101 totals request.
    TotalsRequest,
    MinPoll,
    MinAck,
}

impl fmt::Display for OutboundKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutboundKind::Command(command) => write!(f, "CD1 {command}"),
            OutboundKind::PresetVolume { centiliters } => {
                write!(f, "CD3 PRESET {}.{:02} L", centiliters / 100, centiliters % 100)
            }
            OutboundKind::TotalsRequest => f.write_str("CD101 TOTALS"),
            OutboundKind::MinPoll => f.write_str("MIN-POLL"),
            OutboundKind::MinAck => f.write_str("MIN-ACK"),
        }
    }
}

/// Wire bytes ready for the transport, tagged with their meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub kind: OutboundKind,
    pub bytes: Bytes,
}

impl OutboundFrame {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encoder for outbound command frames.
///
/// Holds the addressing and CRC byte order shared by every frame sent to
/// one pump.
///
/// # Example
/// ```
/// use pumplink_core::PumpAddress;
/// use pumplink_protocol::{CommandBuilder, PumpCommand};
///
/// let builder = CommandBuilder::new(PumpAddress::default());
/// let frame = builder.command(PumpCommand::Authorize);
/// assert_eq!(frame.as_bytes(), &[0x50, 0x30, 0x01, 0x01, 0x06, 0x1F, 0x5E, 0x03, 0xFA]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandBuilder {
    address: PumpAddress,
    nozzle: NozzleNumber,
    crc_order: CrcOrder,
}

impl CommandBuilder {
    pub fn new(address: PumpAddress) -> Self {
        Self {
            address,
            nozzle: NozzleNumber::default(),
            crc_order: CrcOrder::default(),
        }
    }

    #[must_use]
    pub fn with_nozzle(mut self, nozzle: NozzleNumber) -> Self {
        self.nozzle = nozzle;
        self
    }

    #[must_use]
    pub fn with_crc_order(mut self, order: CrcOrder) -> Self {
        self.crc_order = order;
        self
    }

    pub fn set_crc_order(&mut self, order: CrcOrder) {
        self.crc_order = order;
    }

    #[must_use]
    pub fn crc_order(&self) -> CrcOrder {
        self.crc_order
    }

    #[must_use]
    pub fn address(&self) -> PumpAddress {
        self.address
    }

    #[must_use]
    pub fn nozzle(&self) -> NozzleNumber {
        self.nozzle
    }

    /// CD1: `[ADDR][0x30][NOZZLE][0x01][DCC]`.
    #[must_use]
    pub fn command(&self, command: PumpCommand) -> OutboundFrame {
        let body = [
            self.address.as_u8(),
            CMD_COMMAND,
            self.nozzle.as_u8(),
            0x01,
            command.as_u8(),
        ];
        self.seal(OutboundKind::Command(command), &body)
    }

    /// CD1 with a raw command code.
    #[must_use]
    pub fn generic(&self, code: u8) -> OutboundFrame {
        self.command(PumpCommand::from_u8(code))
    }

    /// CD3: `[ADDR][0x30][0x03][0x04][BCD4(liters x 100)]`.
    ///
    /// Liters are clamped to the accepted preset range first.
    ///
    /// # Errors
    /// Returns `Error::InvalidPreset` for NaN or infinite input.
    pub fn preset_volume(&self, liters: f64) -> Result<OutboundFrame> {
        let liters = clamp_preset(liters)?;
        let centiliters = (liters * 100.0).round() as i64;
        let mut body = vec![self.address.as_u8(), CMD_COMMAND, TRANS_NOZZLE, PRESET_DATA_LEN];
        body.extend_from_slice(&bcd::encode4(centiliters));
        let kind = OutboundKind::PresetVolume {
            centiliters: centiliters as u32,
        };
        Ok(self.seal(kind, &body))
    }

    /// CD101: `[ADDR][0x3C][0x65][0x01][NOZZLE]`.
    #[must_use]
    pub fn totals_request(&self) -> OutboundFrame {
        let body = [
            self.address.as_u8(),
            CMD_TOTALS_REQUEST,
            CMD_TOTALS,
            0x01,
            self.nozzle.as_u8(),
        ];
        self.seal(OutboundKind::TotalsRequest, &body)
    }

    #[must_use]
    pub fn min_poll(&self) -> OutboundFrame {
        OutboundFrame {
            kind: OutboundKind::MinPoll,
            bytes: Bytes::copy_from_slice(&ShortCode::Poll.frame()),
        }
    }

    #[must_use]
    pub fn min_ack(&self) -> OutboundFrame {
        OutboundFrame {
            kind: OutboundKind::MinAck,
            bytes: Bytes::copy_from_slice(&ShortCode::Ack.frame()),
        }
    }

    /// Append CRC, ETX and trailer to a frame body.
    fn seal(&self, kind: OutboundKind, body: &[u8]) -> OutboundFrame {
        let mut bytes = Vec::with_capacity(body.len() + 4);
        bytes.extend_from_slice(body);
        crc::append(&mut bytes, self.crc_order);
        bytes.push(ETX_BYTE);
        bytes.push(TRAILER_BYTE);
        OutboundFrame {
            kind,
            bytes: Bytes::from(bytes),
        }
    }
}

/// Clamp a preset to the accepted range.
///
/// # Errors
/// Returns `Error::InvalidPreset` for NaN or infinite input.
pub fn clamp_preset(liters: f64) -> Result<f64> {
    if !liters.is_finite() {
        return Err(Error::InvalidPreset(format!("{liters} is not a volume")));
    }
    Ok(liters.clamp(MIN_PRESET_LITERS, MAX_PRESET_LITERS))
}
