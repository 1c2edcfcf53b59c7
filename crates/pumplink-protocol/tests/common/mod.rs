//! Frame builders shared by the integration tests.
//!
//! Helpers produce complete wire frames with a valid CRC so tests can
//! describe traffic by meaning instead of by hand-computed bytes.

#![allow(dead_code)]

use pumplink_core::CrcOrder;
use pumplink_protocol::{Frame, RawFrame, StreamParser, crc};

pub const ADDRESS: u8 = 0x50;

/// Seal a frame body with CRC, ETX and trailer.
pub fn seal(body: &[u8], order: CrcOrder) -> Vec<u8> {
    let mut bytes = body.to_vec();
    crc::append(&mut bytes, order);
    bytes.extend_from_slice(&[0x03, 0xFA]);
    bytes
}

/// `0x30` status reply carrying one status code.
pub fn status_reply(code: u8) -> Vec<u8> {
    seal(&[ADDRESS, 0x30, 0x01, 0x01, code], CrcOrder::LoHi)
}

/// `0xD2` volume sample; `ml` in milliliters, `cents` in currency cents.
pub fn sim_volume(ml: u32, cents: u32) -> Vec<u8> {
    let mut body = vec![ADDRESS, 0xD2, 0x01, 0x08];
    body.extend_from_slice(&pumplink_protocol::bcd::encode4(i64::from(ml) * 100));
    body.extend_from_slice(&pumplink_protocol::bcd::encode4(i64::from(cents)));
    seal(&body, CrcOrder::LoHi)
}

/// Composite frame built from `(trans, data)` sub-records.
pub fn composite(command: u8, records: &[(u8, &[u8])]) -> Vec<u8> {
    let mut body = vec![ADDRESS, command];
    for (trans, data) in records {
        body.push(*trans);
        body.push(data.len() as u8);
        body.extend_from_slice(data);
    }
    seal(&body, CrcOrder::LoHi)
}

/// Feed `stream` in the given chunk sizes and collect the frames.
pub fn parse_chunked(stream: &[u8], chunks: &[usize]) -> Vec<RawFrame> {
    let mut parser = StreamParser::new();
    let mut frames = Vec::new();
    let mut rest = stream;
    let mut sizes = chunks.iter().copied().cycle();
    while !rest.is_empty() {
        let size = sizes.next().unwrap_or(1).clamp(1, rest.len());
        let (head, tail) = rest.split_at(size);
        parser.feed(head);
        frames.extend(parser.drain_frames());
        rest = tail;
    }
    frames
}

/// Parse a single complete frame.
pub fn parse_one(bytes: &[u8]) -> Frame {
    let mut parser = StreamParser::new();
    parser.feed(bytes);
    let raw = parser.next_frame().expect("no frame delimited");
    assert_eq!(parser.buffered_len(), 0, "bytes left after frame");
    Frame::from_raw(raw, CrcOrder::LoHi).expect("frame did not parse")
}
