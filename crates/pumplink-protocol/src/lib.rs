pub mod bcd;
pub mod builder;
pub mod codec;
pub mod commands;
pub mod crc;
pub mod decoder;
pub mod frame;
pub mod stream_parser;
pub mod subrecord;

pub use builder::{CommandBuilder, OutboundFrame, OutboundKind, clamp_preset};
pub use codec::PumpCodec;
pub use commands::{CompositeKind, PumpCommand, ResponseKind, ShortCode};
pub use decoder::{
    DecodeWarning, Decoded, FillRecord, NozzleReport, PumpEvent, PumpEventCode, Record,
    StatusOrigin, TotalsReport, TotalsSource, VolumeSample, VolumeScale, decode,
};
pub use frame::{Frame, FrameShape, LongFrame, RawFrame, ShortFrame, hex_line, parse_hex};
pub use stream_parser::{DrainFrames, MAX_BUFFER_SIZE, StreamParser};
