//! Line traffic builders and engine helpers for scenario tests.

#![allow(dead_code)]

use pumplink_core::CrcOrder;
use pumplink_engine::{Engine, EngineConfig, EngineEvent, MemoryCounterStore};
use pumplink_protocol::{OutboundKind, PumpCommand, bcd, crc};

pub const MIN_POLL: [u8; 3] = [0x50, 0x20, 0xFA];
pub const MIN_BUSY: [u8; 3] = [0x50, 0x70, 0xFA];

pub fn seal(body: &[u8]) -> Vec<u8> {
    let mut bytes = body.to_vec();
    crc::append(&mut bytes, CrcOrder::LoHi);
    bytes.extend_from_slice(&[0x03, 0xFA]);
    bytes
}

pub fn status_reply(code: u8) -> Vec<u8> {
    seal(&[0x50, 0x30, 0x01, 0x01, code])
}

pub fn direct_status(code: u8) -> Vec<u8> {
    seal(&[0x50, 0x01, 0x01, 0x01, code])
}

/// `0xD2` sample in milliliters.
pub fn sim_volume(ml: u32, cents: u32) -> Vec<u8> {
    let mut body = vec![0x50, 0xD2, 0x01, 0x08];
    body.extend_from_slice(&bcd::encode4(i64::from(ml) * 100));
    body.extend_from_slice(&bcd::encode4(i64::from(cents)));
    seal(&body)
}

/// `trans=0x02` sample inside a DC2 frame, volume in centiliters.
pub fn dc2_volume(centiliters: u32, cents: u32) -> Vec<u8> {
    let mut body = vec![0x50, 0x35, 0x02, 0x08];
    body.extend_from_slice(&bcd::encode4(i64::from(centiliters)));
    body.extend_from_slice(&bcd::encode4(i64::from(cents)));
    seal(&body)
}

/// `trans=0x03` nozzle report inside a DC3 frame.
pub fn dc3_nozzle(nozzle: u8, out: bool) -> Vec<u8> {
    let flag = if out { 0x10 } else { 0x00 };
    seal(&[0x50, 0x36, 0x03, 0x04, 0x00, 0x12, 0x34, nozzle | flag])
}

pub fn engine() -> Engine<MemoryCounterStore> {
    Engine::new(&EngineConfig::default(), MemoryCounterStore::default())
}

/// Engine that already saw a status reply, with queues drained.
pub fn engine_after_handshake(code: u8) -> Engine<MemoryCounterStore> {
    let mut engine = engine();
    engine.feed(&status_reply(code));
    engine.drain_events();
    engine.drain_outbound();
    engine
}

/// Kinds of the queued outbound frames, draining them.
pub fn sent(engine: &mut Engine<MemoryCounterStore>) -> Vec<OutboundKind> {
    engine
        .drain_outbound()
        .into_iter()
        .map(|frame| frame.kind)
        .collect()
}

pub fn count_command(kinds: &[OutboundKind], command: PumpCommand) -> usize {
    kinds
        .iter()
        .filter(|kind| **kind == OutboundKind::Command(command))
        .count()
}

/// Events without frame traces.
pub fn events(engine: &mut Engine<MemoryCounterStore>) -> Vec<EngineEvent> {
    engine
        .drain_events()
        .into_iter()
        .filter(|event| !matches!(event, EngineEvent::FrameTrace { .. }))
        .collect()
}
