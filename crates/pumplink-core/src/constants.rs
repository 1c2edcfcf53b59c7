//! Core constants for the RS-485 fuel-dispenser protocol.
//!
//! This module defines the protocol-level constants shared by every crate in
//! the workspace: frame delimiters, minimal-frame codes, command bytes, pump
//! command codes (DCC), and operational limits.
//!
//! # Frame Shapes
//!
//! The line carries two incompatible frame shapes:
//!
//! ```text
//! Long:  [ADDR][CMD][...payload...][CRC_1][CRC_2][ETX=0x03][TRAIL=0xFA]
//! Short: [0x50][CODE][TRAIL=0xFA]
//! ```
//!
//! The trailer byte closes both shapes. Only long frames carry a CRC and an
//! ETX byte; short frames are 3-byte keepalives (poll, ack, busy).
//!
//! # Usage
//!
//! ```
//! use pumplink_core::constants::*;
//!
//! let poll = [MIN_FRAME_PREFIX, MIN_CODE_POLL, TRAILER_BYTE];
//! assert_eq!(poll, [0x50, 0x20, 0xFA]);
//! assert!(COMPOSITE_COMMANDS.contains(&0x3E));
//! ```

use std::ops::RangeInclusive;

// ============================================================================
// Frame Delimiters
// ============================================================================

/// End of text marker (ETX) that precedes the trailer in long frames.
pub const ETX_BYTE: u8 = 0x03;

/// Trailer byte closing every frame, long or short.
pub const TRAILER_BYTE: u8 = 0xFA;

/// First byte of every short (minimal) frame.
pub const MIN_FRAME_PREFIX: u8 = 0x50;

/// Exact length of a short frame.
pub const SHORT_FRAME_LEN: usize = 3;

/// Minimum candidate length accepted by the stream parser as a long frame.
pub const MIN_LONG_CANDIDATE_LEN: usize = 7;

/// Minimum length of a decodable long frame.
///
/// Address, command, two header bytes, two CRC bytes, ETX and trailer.
pub const MIN_LONG_FRAME_LEN: usize = 8;

/// Bytes after the payload in a long frame: two CRC bytes, ETX, trailer.
pub const LONG_FRAME_FOOTER_LEN: usize = 4;

// ============================================================================
// Integrity
// ============================================================================

/// Reflected CRC16 polynomial (LSB-first form of 0x8005).
pub const CRC_POLY: u16 = 0xA001;

// ============================================================================
// Short Frame Codes
// ============================================================================

/// Minimal poll (`50 20 FA`), sent by the controller as heartbeat.
pub const MIN_CODE_POLL: u8 = 0x20;

/// Minimal acknowledge (`50 C0 FA`).
pub const MIN_CODE_ACK: u8 = 0xC0;

/// Minimal busy keepalive (`50 70 FA`), the pump's answer to a poll.
pub const MIN_CODE_BUSY: u8 = 0x70;

// ============================================================================
// Command Bytes
// ============================================================================

/// Outbound command frame (CD1, CD3) and single-byte status reply.
pub const CMD_COMMAND: u8 = 0x30;

/// Alternate single-byte status reply.
pub const CMD_STATUS_ALT: u8 = 0xCD;

/// Direct pump status (DC1 with a one-byte payload).
pub const CMD_DIRECT_STATUS: u8 = 0x01;

/// Outbound totals request (CD101).
pub const CMD_TOTALS_REQUEST: u8 = 0x3C;

/// Totals response family and the CD101 transaction number.
pub const CMD_TOTALS: u8 = 0x65;

/// Simulator status frame.
pub const CMD_SIM_STATUS: u8 = 0xD1;

/// Simulator filled-volume frame.
pub const CMD_SIM_VOLUME: u8 = 0xD2;

/// Simulator totals frame.
pub const CMD_SIM_TOTALS: u8 = 0xD3;

/// Simulator nozzle flag frame.
pub const CMD_SIM_NOZZLE: u8 = 0xD4;

/// Composite event frame (nozzle and trigger events).
pub const CMD_EVENT: u8 = 0x38;

/// Composite totalizer frame.
pub const CMD_TOTALIZER: u8 = 0x3D;

/// Composite filling record frame.
pub const CMD_FILL_RECORD: u8 = 0x3E;

/// Command bytes whose payload is a sequence of sub-records.
pub const COMPOSITE_COMMANDS: RangeInclusive<u8> = 0x31..=0x3F;

/// Command bytes whose header length byte is known to be misreported.
pub const LENGTH_TOLERANT_COMMANDS: RangeInclusive<u8> = 0x30..=0x3F;

// ============================================================================
// Sub-record Transactions
// ============================================================================

/// Pump status sub-record (DC1).
pub const TRANS_STATUS: u8 = 0x01;

/// Filled volume and amount sub-record (DC2).
pub const TRANS_VOLUME: u8 = 0x02;

/// Nozzle and price sub-record (DC3); totals sub-record under `0x65` (DC101).
/// Also the CD3 preset-volume transaction number.
pub const TRANS_NOZZLE: u8 = 0x03;

/// Length of the CD3 preset-volume data field.
pub const PRESET_DATA_LEN: u8 = 0x04;

// ============================================================================
// Defaults and Limits
// ============================================================================

/// Default pump address observed in field installations.
pub const DEFAULT_ADDRESS: u8 = 0x50;

/// Default nozzle number.
pub const DEFAULT_NOZZLE: u8 = 0x01;

/// Default baud rate of the RS-485 link.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout of the transport in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;

/// Lower bound for the transport read timeout in milliseconds.
pub const MIN_READ_TIMEOUT_MS: u64 = 5;

/// Default write timeout of the transport in milliseconds.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 500;

/// Default liveness poll period in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Lower bound for the liveness poll period in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Smallest preset volume accepted, in liters.
pub const MIN_PRESET_LITERS: f64 = 0.1;

/// Largest preset volume accepted, in liters.
pub const MAX_PRESET_LITERS: f64 = 250.0;

/// Largest value representable by a 4-byte BCD field.
pub const BCD4_MAX: u32 = 99_999_999;
