//! Response decoding and dispatch.
//!
//! [`decode`] turns a [`Frame`] into typed [`Record`]s plus any
//! [`DecodeWarning`]s. Dispatch is keyed on [`ResponseKind`]; composite
//! frames are walked sub-record by sub-record.
//!
//! Decoding never fails. A frame that cannot be interpreted still produces
//! a [`Decoded`] value carrying warnings, so every frame on the line stays
//! visible to the caller.
//!
//! # CRC Failures
//!
//! A long frame with a bad CRC yields a single [`DecodeWarning::CrcMismatch`]
//! and no records: numeric fields from a corrupted frame are not trusted.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use pumplink_core::{CrcOrder, PumpState};
//! use pumplink_protocol::decoder::{self, Record, StatusOrigin};
//! use pumplink_protocol::{Frame, FrameShape, RawFrame};
//!
//! let raw = RawFrame::new(
//!     FrameShape::Long,
//!     Bytes::from_static(&[0x50, 0x30, 0x01, 0x01, 0x04, 0x9E, 0x9F, 0x03, 0xFA]),
//! );
//! let frame = Frame::from_raw(raw, CrcOrder::LoHi).unwrap();
//! let decoded = decoder::decode(&frame);
//!
//! assert!(decoded.opens_handshake());
//! assert_eq!(
//!     decoded.records,
//!     vec![Record::Status { state: PumpState::Filling, origin: StatusOrigin::StatusReply }]
//! );
//! ```

use pumplink_core::PumpState;
use pumplink_core::constants::{CMD_TOTALS, TRANS_NOZZLE, TRANS_STATUS, TRANS_VOLUME};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bcd;
use crate::commands::{CompositeKind, ResponseKind, ShortCode};
use crate::frame::{Frame, LongFrame};
use crate::subrecord::{self, SubRecord, WalkFault};

/// Which table a status code was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusOrigin {
    /// `0x30` / `0xCD` single-byte reply.
    StatusReply,
    /// `0x01` direct status.
    Direct,
    /// `0xD1` simulator status.
    Simulator,
    /// `trans=0x01` inside a composite frame.
    Transaction,
}

/// Native unit of a volume sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeScale {
    /// `0xD2` frames report milliliters.
    Milliliters,
    /// `trans=0x02` records report liters x 100.
    Centiliters,
}

/// A filled-volume sample taken during a sale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeSample {
    pub liters: f64,
    pub amount: f64,
    /// Volume in the sample's native unit.
    pub raw_volume: u32,
    pub scale: VolumeScale,
}

impl VolumeSample {
    /// Whether this sample has reached a preset target given in milliliters.
    ///
    /// Compared in the sample's native unit so no float rounding is involved.
    #[must_use]
    pub fn reaches(&self, target_ml: u32) -> bool {
        match self.scale {
            VolumeScale::Milliliters => self.raw_volume >= target_ml,
            VolumeScale::Centiliters => self.raw_volume >= target_ml / 10,
        }
    }
}

/// Nozzle state as reported by the pump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NozzleReport {
    pub nozzle: Option<u8>,
    /// `true` when the nozzle is lifted out of its holster.
    pub out: bool,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TotalsSource {
    /// `0xD3` simulator totals.
    Simulator,
    /// `0x3D` totalizer block.
    Totalizer,
    /// `0x65` total counters (DC101).
    Counters,
}

/// Cumulative totals read from the pump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TotalsReport {
    pub source: TotalsSource,
    pub nozzle: Option<u8>,
    pub volume_liters: f64,
    pub amount: Option<f64>,
    /// The two alternate volume totals carried by DC101.
    pub alt_volumes: Option<[f64; 2]>,
}

/// Final figures of a fill, reported after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub liters: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PumpEventCode {
    NozzleOut,
    NozzleIn,
    TriggerOn,
    TriggerOff,
    Unknown(u8),
}

impl From<u8> for PumpEventCode {
    fn from(code: u8) -> Self {
        match code {
            0x10 => PumpEventCode::NozzleOut,
            0x11 => PumpEventCode::NozzleIn,
            0x21 => PumpEventCode::TriggerOn,
            0x20 => PumpEventCode::TriggerOff,
            other => PumpEventCode::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpEvent {
    pub code: PumpEventCode,
    pub extra: u8,
}

/// One piece of information extracted from a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Short(ShortCode),
    Status {
        state: PumpState,
        origin: StatusOrigin,
    },
    Volume(VolumeSample),
    Nozzle(NozzleReport),
    Totals(TotalsReport),
    FillRecord(FillRecord),
    PumpEvent(PumpEvent),
}

/// Non-fatal anomaly found while decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    #[error("frame too short: {len} bytes (minimum {min})")]
    FrameTooShort { len: usize, min: usize },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("CRC mismatch on cmd 0x{command:02X}: received 0x{received:04X}, computed 0x{computed:04X}")]
    CrcMismatch {
        command: u8,
        received: u16,
        computed: u16,
    },

    #[error("bad LEN on cmd 0x{command:02X}: header={header} actual={actual}")]
    LengthMismatch {
        command: u8,
        header: u8,
        actual: usize,
    },

    #[error("cmd 0x{command:02X} expects a {expected}-byte payload, got {actual}")]
    PayloadLength {
        command: u8,
        expected: usize,
        actual: usize,
    },

    #[error("unknown status code 0x{code:02X} in cmd 0x{command:02X}")]
    UnknownStatus { command: u8, code: u8 },

    #[error("cmd 0x{command:02X}: {fault}")]
    SubRecord { command: u8, fault: WalkFault },

    #[error("unhandled cmd 0x{command:02X}")]
    UnknownCommand { command: u8 },
}

/// Everything learned from one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    /// Dispatch key of a long frame.
    pub kind: Option<ResponseKind>,
    /// CRC verdict of a long frame.
    pub crc_ok: Option<bool>,
    pub records: Vec<Record>,
    pub warnings: Vec<DecodeWarning>,
}

impl Decoded {
    /// A CRC-valid, status-bearing long frame.
    #[must_use]
    pub fn opens_handshake(&self) -> bool {
        self.crc_ok == Some(true) && self.kind.is_some_and(|kind| kind.opens_handshake())
    }

    /// A CRC-valid long frame, eligible for auto-acknowledgement.
    #[must_use]
    pub fn is_valid_long(&self) -> bool {
        self.crc_ok == Some(true)
    }

    fn record(&mut self, record: Record) {
        self.records.push(record);
    }

    fn warn(&mut self, warning: DecodeWarning) {
        self.warnings.push(warning);
    }
}

/// Decode a frame into records and warnings.
#[must_use]
pub fn decode(frame: &Frame) -> Decoded {
    match frame {
        Frame::Short(short) => Decoded {
            records: vec![Record::Short(short.code())],
            ..Decoded::default()
        },
        Frame::Long(long) => decode_long(long),
    }
}

fn decode_long(frame: &LongFrame) -> Decoded {
    let command = frame.command();
    let kind = ResponseKind::from_command(command);
    let mut out = Decoded {
        kind: Some(kind),
        crc_ok: Some(frame.crc_ok()),
        ..Decoded::default()
    };

    if let Some((header, actual)) = frame.length_mismatch() {
        out.warn(DecodeWarning::LengthMismatch {
            command,
            header,
            actual,
        });
    }

    if !frame.crc_ok() {
        out.warn(DecodeWarning::CrcMismatch {
            command,
            received: frame.crc_received(),
            computed: frame.crc_computed(),
        });
        return out;
    }

    let payload = frame.payload();
    match kind {
        ResponseKind::StatusReply => decode_status_reply(command, payload, &mut out),
        ResponseKind::DirectStatus => {
            if let Some(code) = single_byte(command, payload, &mut out) {
                push_status(command, code, StatusOrigin::Direct, &mut out);
            }
        }
        ResponseKind::SimStatus => {
            if let Some(code) = single_byte(command, payload, &mut out) {
                push_status(command, code, StatusOrigin::Simulator, &mut out);
            }
        }
        ResponseKind::SimVolume => decode_sim_volume(command, payload, &mut out),
        ResponseKind::SimTotals => decode_sim_totals(command, payload, &mut out),
        ResponseKind::SimNozzle => {
            if let Some(flag) = single_byte(command, payload, &mut out) {
                out.record(Record::Nozzle(NozzleReport {
                    nozzle: None,
                    out: flag != 0,
                    unit_price: None,
                }));
            }
        }
        ResponseKind::Composite(composite) => decode_composite(command, composite, payload, &mut out),
        ResponseKind::Unknown(_) => out.warn(DecodeWarning::UnknownCommand { command }),
    }
    out
}

/// `0x30`/`0xCD`: a one-byte payload is a status code; anything else is a
/// command echo carrying no state.
fn decode_status_reply(command: u8, payload: &[u8], out: &mut Decoded) {
    let [code] = payload else {
        tracing::trace!(command, len = payload.len(), "command response without status byte");
        return;
    };
    match status_reply_state(*code) {
        StatusReplyCode::State(state) => out.record(Record::Status {
            state,
            origin: StatusOrigin::StatusReply,
        }),
        StatusReplyCode::NozzleOut => out.record(Record::Nozzle(NozzleReport {
            nozzle: None,
            out: true,
            unit_price: None,
        })),
        StatusReplyCode::Unknown => out.warn(DecodeWarning::UnknownStatus {
            command,
            code: *code,
        }),
    }
}

enum StatusReplyCode {
    State(PumpState),
    NozzleOut,
    Unknown,
}

fn status_reply_state(code: u8) -> StatusReplyCode {
    match code {
        0x00 => StatusReplyCode::State(PumpState::NotProgrammed),
        0x01 => StatusReplyCode::State(PumpState::Reset),
        0x02 => StatusReplyCode::State(PumpState::Authorized),
        0x03 => StatusReplyCode::NozzleOut,
        0x04 => StatusReplyCode::State(PumpState::Filling),
        0x05 => StatusReplyCode::State(PumpState::FillingCompleted),
        0x06 => StatusReplyCode::State(PumpState::MaxAmountVolume),
        _ => StatusReplyCode::Unknown,
    }
}

/// Extended table shared by `0x01` frames and `trans=0x01` records.
fn direct_status_state(code: u8) -> Option<PumpState> {
    match code {
        0x00 => Some(PumpState::NotProgrammed),
        0x01 => Some(PumpState::Reset),
        0x02 => Some(PumpState::Authorized),
        0x04 => Some(PumpState::Filling),
        0x05 => Some(PumpState::FillingCompleted),
        0x06 => Some(PumpState::MaxAmountVolume),
        0x07 => Some(PumpState::SwitchedOff),
        0x0B => Some(PumpState::Suspended),
        _ => None,
    }
}

fn simulator_status_state(code: u8) -> Option<PumpState> {
    match code {
        0x00 => Some(PumpState::Reset),
        0x01 => Some(PumpState::Authorized),
        0x02 => Some(PumpState::Filling),
        0x03 => Some(PumpState::Suspended),
        0x04 => Some(PumpState::FillingCompleted),
        _ => None,
    }
}

fn push_status(command: u8, code: u8, origin: StatusOrigin, out: &mut Decoded) {
    let state = match origin {
        StatusOrigin::Simulator => simulator_status_state(code),
        _ => direct_status_state(code),
    };
    match state {
        Some(state) => out.record(Record::Status { state, origin }),
        None => out.warn(DecodeWarning::UnknownStatus { command, code }),
    }
}

fn single_byte(command: u8, payload: &[u8], out: &mut Decoded) -> Option<u8> {
    match payload {
        [byte] => Some(*byte),
        _ => {
            out.warn(DecodeWarning::PayloadLength {
                command,
                expected: 1,
                actual: payload.len(),
            });
            None
        }
    }
}

fn eight_bytes(command: u8, payload: &[u8], out: &mut Decoded) -> Option<(u32, u32)> {
    if payload.len() != 8 {
        out.warn(DecodeWarning::PayloadLength {
            command,
            expected: 8,
            actual: payload.len(),
        });
        return None;
    }
    Some((bcd::read4(payload, 0)?, bcd::read4(payload, 4)?))
}

/// `0xD2`: volume field holds milliliters x 100, price in cents.
fn decode_sim_volume(command: u8, payload: &[u8], out: &mut Decoded) {
    if let Some((volume_raw, price)) = eight_bytes(command, payload, out) {
        let ml = volume_raw / 100;
        out.record(Record::Volume(VolumeSample {
            liters: f64::from(ml) / 1000.0,
            amount: f64::from(price) / 100.0,
            raw_volume: ml,
            scale: VolumeScale::Milliliters,
        }));
    }
}

/// `0xD3`: totals in milliliters and cents.
fn decode_sim_totals(command: u8, payload: &[u8], out: &mut Decoded) {
    if let Some((ml, price)) = eight_bytes(command, payload, out) {
        out.record(Record::Totals(TotalsReport {
            source: TotalsSource::Simulator,
            nozzle: None,
            volume_liters: f64::from(ml) / 1000.0,
            amount: Some(f64::from(price) / 100.0),
            alt_volumes: None,
        }));
    }
}

fn decode_composite(command: u8, kind: CompositeKind, payload: &[u8], out: &mut Decoded) {
    let walk = subrecord::walk(payload);
    for record in &walk.records {
        match kind {
            CompositeKind::FillRecord => decode_fill_record(record, out),
            CompositeKind::Totalizer => decode_totalizer(record, out),
            CompositeKind::Event => decode_event(record, out),
            CompositeKind::Totals | CompositeKind::Transactions => {
                decode_transaction(command, record, out);
            }
        }
    }
    if let Some(fault) = walk.fault {
        out.warn(DecodeWarning::SubRecord { command, fault });
    }
}

fn decode_fill_record(record: &SubRecord<'_>, out: &mut Decoded) {
    if let (Some(volume), Some(amount)) = (bcd::read4(record.data, 0), bcd::read4(record.data, 4)) {
        out.record(Record::FillRecord(FillRecord {
            liters: f64::from(volume) / 100.0,
            amount: f64::from(amount) / 100.0,
        }));
    }
}

fn decode_totalizer(record: &SubRecord<'_>, out: &mut Decoded) {
    if let (Some(volume), Some(amount)) = (bcd::read4(record.data, 0), bcd::read4(record.data, 4)) {
        out.record(Record::Totals(TotalsReport {
            source: TotalsSource::Totalizer,
            nozzle: None,
            volume_liters: f64::from(volume) / 100.0,
            amount: Some(f64::from(amount) / 100.0),
            alt_volumes: None,
        }));
    }
}

fn decode_event(record: &SubRecord<'_>, out: &mut Decoded) {
    let code = record.data.first().copied().unwrap_or(0x00);
    let extra = record.data.get(1).copied().unwrap_or(0x00);
    out.record(Record::PumpEvent(PumpEvent {
        code: PumpEventCode::from(code),
        extra,
    }));
}

fn decode_transaction(command: u8, record: &SubRecord<'_>, out: &mut Decoded) {
    let data = record.data;
    match (record.trans, command == CMD_TOTALS) {
        (TRANS_STATUS, _) if !data.is_empty() => {
            push_status(command, data[0], StatusOrigin::Transaction, out);
        }
        (TRANS_VOLUME, _) if data.len() >= 8 => {
            if let (Some(volume), Some(amount)) = (bcd::read4(data, 0), bcd::read4(data, 4)) {
                out.record(Record::Volume(VolumeSample {
                    liters: f64::from(volume) / 100.0,
                    amount: f64::from(amount) / 100.0,
                    raw_volume: volume,
                    scale: VolumeScale::Centiliters,
                }));
            }
        }
        (TRANS_NOZZLE, false) if data.len() >= 4 => {
            let price = bcd::decode4([0x00, data[0], data[1], data[2]]);
            let nozio = data[3];
            out.record(Record::Nozzle(NozzleReport {
                nozzle: Some(nozio & 0x0F),
                out: nozio & 0x10 != 0,
                unit_price: Some(f64::from(price) / 1000.0),
            }));
        }
        (TRANS_NOZZLE, true) if data.len() >= 16 => {
            if let (Some(total), Some(alt1), Some(alt2)) =
                (bcd::read5(data, 1), bcd::read5(data, 6), bcd::read5(data, 11))
            {
                out.record(Record::Totals(TotalsReport {
                    source: TotalsSource::Counters,
                    nozzle: Some(data[0]),
                    volume_liters: total as f64 / 100.0,
                    amount: None,
                    alt_volumes: Some([alt1 as f64 / 100.0, alt2 as f64 / 100.0]),
                }));
            }
        }
        (trans, _) => {
            tracing::trace!(command, trans, len = data.len(), "sub-record without decoder");
        }
    }
}
