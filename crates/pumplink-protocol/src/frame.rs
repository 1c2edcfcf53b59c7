//! Frame representation for the RS-485 dispenser line.
//!
//! Two layers live here:
//! - [`RawFrame`]: bytes cut from the stream by the [`StreamParser`], tagged
//!   with the shape that matched. No interpretation.
//! - [`Frame`]: a raw frame split into its fields, with the CRC verified in
//!   the configured [`CrcOrder`].
//!
//! # Wire Layout
//!
//! ```text
//! Long:  [ADDR][CMD][B2][LEN][...data...][CRC_1][CRC_2][0x03][0xFA]
//! Short: [0x50][CODE][0xFA]
//! ```
//!
//! For the composite family (`0x31`-`0x3F`, `0x65`) the payload starts at
//! `B2` (the first sub-record's transaction byte). For every other command
//! `B2` is a nozzle/transaction byte, `LEN` a length byte, and the payload
//! starts after them.
//!
//! [`StreamParser`]: crate::StreamParser

use bytes::Bytes;
use pumplink_core::constants::{
    COMPOSITE_COMMANDS, CMD_TOTALS, LENGTH_TOLERANT_COMMANDS, LONG_FRAME_FOOTER_LEN,
    MIN_LONG_FRAME_LEN,
};
use pumplink_core::{CrcOrder, Error, Result};
use std::fmt;

use crate::commands::ShortCode;
use crate::crc;

/// Which delimiting rule produced a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameShape {
    /// Full frame closed by `ETX` + trailer.
    Long,
    /// 3-byte minimal frame `50 xx FA`.
    Short,
}

/// A delimited but uninterpreted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    shape: FrameShape,
    bytes: Bytes,
}

impl RawFrame {
    pub fn new(shape: FrameShape, bytes: impl Into<Bytes>) -> Self {
        Self {
            shape,
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex_line(&self.bytes))
    }
}

/// A 3-byte minimal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortFrame {
    code: ShortCode,
}

impl ShortFrame {
    #[must_use]
    pub fn code(&self) -> ShortCode {
        self.code
    }

    /// Wire bytes of this frame.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 3] {
        self.code.frame()
    }
}

/// A long frame split into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongFrame {
    bytes: Bytes,
    payload: Bytes,
    crc_received: u16,
    crc_computed: u16,
}

impl LongFrame {
    /// Split and verify a long frame.
    ///
    /// # Errors
    /// Returns `Error::FrameTooShort` if fewer than 8 bytes are given.
    pub fn parse(bytes: Bytes, order: CrcOrder) -> Result<Self> {
        let len = bytes.len();
        if len < MIN_LONG_FRAME_LEN {
            return Err(Error::FrameTooShort {
                len,
                min: MIN_LONG_FRAME_LEN,
            });
        }

        let body_end = len - LONG_FRAME_FOOTER_LEN;
        let command = bytes[1];
        let payload_start = if is_composite(command) { 2 } else { 4 };
        let payload = bytes.slice(payload_start..body_end);
        let crc_received = order.join([bytes[body_end], bytes[body_end + 1]]);
        let crc_computed = crc::crc16(&bytes[..body_end]);

        Ok(Self {
            bytes,
            payload,
            crc_received,
            crc_computed,
        })
    }

    #[must_use]
    pub fn address(&self) -> u8 {
        self.bytes[0]
    }

    #[must_use]
    pub fn command(&self) -> u8 {
        self.bytes[1]
    }

    /// Byte after the command (nozzle or transaction number).
    #[must_use]
    pub fn selector(&self) -> u8 {
        self.bytes[2]
    }

    /// Length byte as announced by the header.
    #[must_use]
    pub fn header_length(&self) -> u8 {
        self.bytes[3]
    }

    /// Payload as delimited by the frame size, not by the header.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn crc_received(&self) -> u16 {
        self.crc_received
    }

    #[must_use]
    pub fn crc_computed(&self) -> u16 {
        self.crc_computed
    }

    #[must_use]
    pub fn crc_ok(&self) -> bool {
        self.crc_received == self.crc_computed
    }

    /// Header/payload length disagreement worth reporting.
    ///
    /// Returns `(header, actual)` on mismatch. Commands `0x30`-`0x3F` are
    /// exempt: field devices misreport the length there while the CRC holds.
    #[must_use]
    pub fn length_mismatch(&self) -> Option<(u8, usize)> {
        let header = self.header_length();
        let actual = self.payload.len();
        if usize::from(header) == actual || LENGTH_TOLERANT_COMMANDS.contains(&self.command()) {
            None
        } else {
            Some((header, actual))
        }
    }
}

/// A typed frame ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Short(ShortFrame),
    Long(LongFrame),
}

impl Frame {
    /// Interpret a raw frame, verifying the CRC of long frames.
    ///
    /// # Errors
    /// Returns `Error::FrameTooShort` for a long frame under 8 bytes and
    /// `Error::InvalidFrame` for a short frame that is not 3 bytes.
    pub fn from_raw(raw: RawFrame, order: CrcOrder) -> Result<Self> {
        match raw.shape() {
            FrameShape::Short => {
                let bytes = raw.as_bytes();
                if bytes.len() != 3 {
                    return Err(Error::InvalidFrame(format!(
                        "minimal frame must be 3 bytes, got {}",
                        bytes.len()
                    )));
                }
                Ok(Frame::Short(ShortFrame {
                    code: ShortCode::from(bytes[1]),
                }))
            }
            FrameShape::Long => LongFrame::parse(raw.into_bytes(), order).map(Frame::Long),
        }
    }

    /// CRC verdict; `None` for short frames, which carry no CRC.
    #[must_use]
    pub fn crc_ok(&self) -> Option<bool> {
        match self {
            Frame::Short(_) => None,
            Frame::Long(long) => Some(long.crc_ok()),
        }
    }
}

/// Payload of these commands is a sequence of sub-records.
#[must_use]
pub fn is_composite(command: u8) -> bool {
    COMPOSITE_COMMANDS.contains(&command) || command == CMD_TOTALS
}

/// Uppercase hex with no separators, as used in traces.
#[must_use]
pub fn hex_line(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Parse captured hex text such as `"50 30 01 01 04 9E 9F 03 FA"`.
///
/// Whitespace, `:` and `-` separators are ignored.
///
/// # Errors
/// Returns `Error::InvalidHex` on odd digit counts or non-hex characters.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(Error::InvalidHex(format!(
            "odd number of hex digits ({})",
            digits.len()
        )));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair)
                .map_err(|_| Error::InvalidHex("non-ASCII input".to_string()))?;
            u8::from_str_radix(pair, 16)
                .map_err(|_| Error::InvalidHex(format!("invalid hex byte {pair:?}")))
        })
        .collect()
}
