//! End-to-end engine behavior driven by line bytes.

mod common;

use common::*;
use pumplink_core::{CrcOrder, PumpState};
use pumplink_engine::{
    CommandError, CounterStore, CounterStoreError, Engine, EngineConfig, EngineEvent, LinkState,
    MemoryCounterStore, PersistentCounters, RefusalReason, Warning,
};
use pumplink_protocol::{DecodeWarning, OutboundKind, PumpCommand, StatusOrigin};
use rstest::rstest;
use std::time::Duration;

#[test]
fn test_poll_then_busy_is_not_acked() {
    let mut engine = engine();
    let mut stream = MIN_POLL.to_vec();
    stream.extend_from_slice(&MIN_BUSY);
    engine.feed(&stream);

    assert!(engine.drain_outbound().is_empty());
    assert!(!engine.handshake().is_open());
}

#[test]
fn test_filling_status_acquires_handshake_once() {
    let mut engine = engine();
    engine.feed(&status_reply(0x04));
    engine.feed(&status_reply(0x04));

    let events = events(&mut engine);
    let handshakes = events
        .iter()
        .filter(|e| **e == EngineEvent::HandshakeAcquired)
        .count();
    assert_eq!(handshakes, 1);
    assert!(events.contains(&EngineEvent::StatusChanged {
        from: PumpState::Reset,
        to: PumpState::Filling,
        origin: StatusOrigin::StatusReply,
    }));
    assert_eq!(engine.state(), PumpState::Filling);

    // one ack per valid long frame
    assert_eq!(sent(&mut engine), vec![OutboundKind::MinAck, OutboundKind::MinAck]);
}

#[test]
fn test_auto_ack_can_be_disabled() {
    let mut engine = engine();
    engine.set_auto_ack(false);
    engine.feed(&status_reply(0x01));
    assert!(engine.drain_outbound().is_empty());
    assert!(engine.handshake().is_open());
}

#[rstest]
#[case::simulator_ml(sim_volume(8000, 4000), sim_volume(8100, 4050))]
#[case::dc2_centiliters(dc2_volume(800, 4000), dc2_volume(810, 4050))]
fn test_preset_fill_stops_exactly_once(#[case] at_target: Vec<u8>, #[case] past_target: Vec<u8>) {
    let mut engine = engine_after_handshake(0x01);

    engine.start_fill(Some(8.0)).unwrap();
    assert_eq!(
        sent(&mut engine),
        vec![OutboundKind::PresetVolume { centiliters: 800 }]
    );

    // AUTHORIZE waits for the next busy, and goes out only once
    engine.feed(&MIN_BUSY);
    engine.feed(&MIN_BUSY);
    assert_eq!(count_command(&sent(&mut engine), PumpCommand::Authorize), 1);

    engine.feed(&status_reply(0x02));
    engine.feed(&status_reply(0x04));
    engine.feed(&at_target);
    engine.feed(&past_target);
    engine.feed(&at_target);

    let kinds = sent(&mut engine);
    assert_eq!(count_command(&kinds, PumpCommand::Stop), 1);
    let auto_stops = events(&mut engine)
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::AutoStop { .. }))
        .count();
    assert_eq!(auto_stops, 1);
}

#[test]
fn test_sample_below_target_does_not_stop() {
    let mut engine = engine_after_handshake(0x02);
    engine.start_fill(Some(8.0)).unwrap();
    engine.feed(&status_reply(0x04));
    engine.feed(&sim_volume(7990, 3995));
    assert_eq!(count_command(&sent(&mut engine), PumpCommand::Stop), 0);
}

fn presets(kinds: &[OutboundKind]) -> Vec<OutboundKind> {
    kinds
        .iter()
        .copied()
        .filter(|kind| matches!(kind, OutboundKind::PresetVolume { .. }))
        .collect()
}

#[test]
fn test_preset_sent_once_per_sale() {
    let mut engine = engine_after_handshake(0x01);
    engine.start_fill(Some(5.0)).unwrap();
    engine.feed(&MIN_BUSY);
    engine.feed(&status_reply(0x02));
    assert!(engine.sale().is_active());

    engine.start_fill(Some(6.0)).unwrap();
    assert_eq!(
        presets(&sent(&mut engine)),
        vec![OutboundKind::PresetVolume { centiliters: 500 }]
    );
    // the newer target is armed
    assert_eq!(engine.sale().preset_target_ml(), Some(6000));
}

#[test]
fn test_preset_volume_command_sent_once_per_sale() {
    let mut engine = engine_after_handshake(0x02);
    assert!(engine.sale().is_active());

    engine.send_preset_volume(5.0).unwrap();
    engine.send_preset_volume(5.0).unwrap();
    assert_eq!(presets(&sent(&mut engine)).len(), 1);

    // a new window takes a new preset
    engine.feed(&status_reply(0x05));
    engine.feed(&status_reply(0x02));
    engine.send_preset_volume(7.0).unwrap();
    assert_eq!(
        presets(&sent(&mut engine)),
        vec![OutboundKind::PresetVolume { centiliters: 700 }]
    );
}

#[test]
fn test_fill_retry_after_refused_authorize_resends_preset() {
    let mut engine = engine_after_handshake(0x01);
    engine.start_fill(Some(5.0)).unwrap();
    engine.feed(&MIN_BUSY);
    // the pump stays in Reset
    engine.feed(&status_reply(0x01));
    assert!(
        events(&mut engine)
            .iter()
            .any(|e| matches!(e, EngineEvent::AuthorizationFailed { .. }))
    );
    sent(&mut engine);

    engine.start_fill(Some(10.0)).unwrap();
    assert_eq!(
        presets(&sent(&mut engine)),
        vec![OutboundKind::PresetVolume { centiliters: 1000 }]
    );
    assert_eq!(engine.sale().preset_target_ml(), Some(10_000));
}

#[test]
fn test_free_fill_defers_authorize_without_preset() {
    let mut engine = engine_after_handshake(0x01);
    engine.start_fill(None).unwrap();
    assert!(engine.drain_outbound().is_empty());
    assert_eq!(engine.sale().preset_target_ml(), None);

    engine.feed(&MIN_BUSY);
    assert_eq!(
        sent(&mut engine),
        vec![OutboundKind::Command(PumpCommand::Authorize)]
    );
}

#[test]
fn test_completed_sale_bumps_counters_once() {
    let mut engine = engine_after_handshake(0x01);
    engine.feed(&status_reply(0x02));
    engine.feed(&status_reply(0x04));
    engine.feed(&sim_volume(8000, 4000));
    engine.feed(&status_reply(0x05));

    let expected = PersistentCounters {
        vehicle_count: 1,
        total_liters: 8.0,
    };
    assert_eq!(engine.counters(), expected);
    assert_eq!(engine.store().counters(), expected);
    assert!(events(&mut engine).contains(&EngineEvent::SaleCompleted {
        liters: 8.0,
        amount: 40.0,
        counters: expected,
    }));

    // repeated and follow-up terminal statuses without a new sale
    engine.feed(&status_reply(0x05));
    engine.feed(&status_reply(0x01));
    engine.feed(&status_reply(0x06));

    assert_eq!(engine.counters(), expected);
    assert_eq!(engine.store().saves(), 1);
}

#[test]
fn test_sale_without_sample_is_reported() {
    let mut engine = engine_after_handshake(0x01);
    engine.feed(&status_reply(0x02));
    engine.feed(&status_reply(0x05));

    assert!(events(&mut engine).contains(&EngineEvent::SaleWithoutSample {
        state: PumpState::FillingCompleted
    }));
    assert_eq!(engine.counters(), PersistentCounters::default());
}

#[test]
fn test_suspend_does_not_reopen_sale() {
    let mut engine = engine_after_handshake(0x01);
    engine.feed(&status_reply(0x02));
    engine.feed(&status_reply(0x04));
    engine.feed(&sim_volume(3000, 1500));
    engine.feed(&direct_status(0x0B));
    engine.feed(&direct_status(0x04));
    engine.feed(&sim_volume(4500, 2250));
    engine.feed(&status_reply(0x05));

    let events = events(&mut engine);
    let opened = events
        .iter()
        .filter(|e| **e == EngineEvent::SaleOpened)
        .count();
    assert_eq!(opened, 1);
    assert_eq!(engine.counters().total_liters, 4.5);
}

#[test]
fn test_last_fill_kept_until_reset() {
    let mut engine = engine_after_handshake(0x01);
    engine.feed(&status_reply(0x04));
    engine.feed(&sim_volume(2500, 1250));
    engine.feed(&status_reply(0x05));
    assert_eq!(engine.sale().last_fill(), (2.5, 12.5));

    engine.feed(&status_reply(0x01));
    assert_eq!(engine.sale().last_fill(), (0.0, 0.0));
}

#[test]
fn test_fill_record_does_not_count_as_sample() {
    let mut engine = engine_after_handshake(0x01);
    engine.feed(&status_reply(0x04));
    engine.feed(&seal(&[
        0x50, 0x3E, 0x01, 0x08, 0x00, 0x00, 0x12, 0x50, 0x00, 0x00, 0x62, 0x50,
    ]));
    engine.feed(&status_reply(0x05));

    assert_eq!(engine.counters(), PersistentCounters::default());
    assert_eq!(engine.sale().last_fill(), (12.5, 62.5));
}

#[test]
fn test_state_changing_command_refused_before_handshake() {
    let mut engine = engine();

    let result = engine.send_command(PumpCommand::Authorize);
    assert!(matches!(
        result,
        Err(CommandError::Refused(refusal)) if refusal.reason == RefusalReason::HandshakePending
    ));
    assert!(engine.drain_outbound().is_empty());
    assert!(matches!(events(&mut engine)[..], [EngineEvent::Refused(_)]));

    // read-only queries pass
    engine.send_command(PumpCommand::ReturnStatus).unwrap();
    engine.send_totals_request().unwrap();
    engine.send_min_poll().unwrap();
    assert_eq!(engine.drain_outbound().len(), 3);

    assert!(engine.start_fill(Some(5.0)).is_err());
    assert!(engine.send_preset_volume(5.0).is_err());
}

#[test]
fn test_resume_refused_while_nozzle_stowed() {
    let mut engine = engine_after_handshake(0x04);

    let result = engine.send_command(PumpCommand::Resume);
    assert!(matches!(
        result,
        Err(CommandError::Refused(refusal)) if refusal.reason == RefusalReason::NozzleStowed
    ));

    engine.feed(&dc3_nozzle(1, true));
    assert!(engine.nozzle_out());
    engine.drain_outbound();
    engine.send_command(PumpCommand::Resume).unwrap();
    assert_eq!(
        sent(&mut engine),
        vec![OutboundKind::Command(PumpCommand::Resume)]
    );
}

#[test]
fn test_intent_hint_after_command() {
    let mut engine = engine_after_handshake(0x01);
    engine.send_command(PumpCommand::Authorize).unwrap();

    assert_eq!(engine.display_state(), PumpState::Authorized);
    assert_eq!(engine.state(), PumpState::Reset);
    assert!(events(&mut engine).contains(&EngineEvent::IntentApplied(PumpState::Authorized)));

    // the pump's answer wins
    engine.feed(&status_reply(0x01));
    assert_eq!(engine.display_state(), PumpState::Reset);
}

#[test]
fn test_authorization_failure_reported_once() {
    let mut engine = engine_after_handshake(0x01);
    engine.send_command(PumpCommand::Authorize).unwrap();
    engine.drain_events();

    engine.feed(&status_reply(0x01));
    engine.feed(&status_reply(0x01));

    let failures = events(&mut engine)
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::AuthorizationFailed { .. }))
        .count();
    assert_eq!(failures, 1);
    assert!(!engine.sale().any_authorize_pending());
}

#[test]
fn test_stop_clears_pending_authorize() {
    let mut engine = engine_after_handshake(0x01);
    engine.start_fill(None).unwrap();
    engine.send_command(PumpCommand::Stop).unwrap();
    engine.drain_outbound();

    engine.feed(&MIN_BUSY);
    assert!(engine.drain_outbound().is_empty());
}

#[test]
fn test_crc_failure_has_no_side_effects() {
    let mut engine = engine();
    let mut frame = status_reply(0x04);
    frame[5] ^= 0xFF;
    engine.feed(&frame);

    assert_eq!(engine.state(), PumpState::Reset);
    assert!(!engine.handshake().is_open());
    assert!(engine.drain_outbound().is_empty());

    let all = engine.drain_events();
    assert!(matches!(
        all[0],
        EngineEvent::FrameTrace {
            crc_ok: Some(false),
            ..
        }
    ));
    assert!(matches!(
        all[1],
        EngineEvent::Warning(Warning::Decode(DecodeWarning::CrcMismatch { command: 0x30, .. }))
    ));
}

#[test]
fn test_crc_order_switch() {
    let mut engine = engine();
    engine.set_crc_order(CrcOrder::HiLo);
    engine.feed(&status_reply(0x04));
    assert!(!engine.handshake().is_open());

    let mut swapped = status_reply(0x04);
    swapped.swap(5, 6);
    engine.feed(&swapped);
    assert!(engine.handshake().is_open());

    engine.drain_outbound();
    engine.send_command(PumpCommand::Authorize).unwrap();
    let frame = engine.drain_outbound().remove(0);
    assert_eq!(
        frame.as_bytes(),
        &[0x50, 0x30, 0x01, 0x01, 0x06, 0x5E, 0x1F, 0x03, 0xFA]
    );
}

#[test]
fn test_heartbeat_polls_in_terminal_state() {
    let mut engine = engine_after_handshake(0x05);
    assert!(!engine.heartbeat_tick());

    engine.set_auto_poll(true, Duration::from_millis(200));
    assert!(engine.heartbeat_tick());
    assert!(engine.heartbeat_tick());
    assert_eq!(sent(&mut engine), vec![OutboundKind::MinPoll, OutboundKind::MinPoll]);
    assert_eq!(engine.heartbeat().interval(), Duration::from_millis(200));
}

#[test]
fn test_close_is_idempotent_and_soft() {
    let mut engine = engine();
    engine.set_auto_poll(true, Duration::from_millis(500));
    engine.close();
    engine.close();

    let closes = events(&mut engine)
        .into_iter()
        .filter(|e| *e == EngineEvent::LinkClosed)
        .count();
    assert_eq!(closes, 1);

    engine.feed(&status_reply(0x04));
    assert!(!engine.handshake().is_open());
    assert_eq!(events(&mut engine), vec![EngineEvent::Warning(Warning::LinkClosed)]);

    assert!(!engine.heartbeat_tick());
    assert!(matches!(
        engine.send_min_poll(),
        Err(CommandError::Refused(refusal)) if refusal.reason == RefusalReason::LinkDown
    ));

    engine.reopen();
    assert!(engine.heartbeat_tick());
    engine.feed(&status_reply(0x04));
    assert!(engine.handshake().is_open());
}

#[test]
fn test_transport_fault_blocks_sends_until_reopen() {
    let mut engine = engine_after_handshake(0x01);
    engine.transport_fault("port vanished");
    assert!(events(&mut engine).contains(&EngineEvent::TransportFault("port vanished".into())));
    assert!(engine.send_command(PumpCommand::ReturnStatus).is_err());

    engine.reopen();
    engine.send_command(PumpCommand::ReturnStatus).unwrap();
}

#[test]
fn test_transport_fault_stops_automatic_sends() {
    let mut engine = engine_after_handshake(0x01);
    engine.start_fill(Some(8.0)).unwrap();
    sent(&mut engine);
    engine.transport_fault("write failed");
    events(&mut engine);

    engine.feed(&MIN_BUSY);
    engine.feed(&status_reply(0x04));
    assert_eq!(engine.link(), LinkState::Faulted);
    assert!(engine.drain_outbound().is_empty());
    assert!(
        events(&mut engine).contains(&EngineEvent::Warning(Warning::NotSent(OutboundKind::MinAck)))
    );
}

#[test]
fn test_auto_stop_waits_for_reopen() {
    let mut engine = engine_after_handshake(0x02);
    engine.start_fill(Some(2.0)).unwrap();
    engine.feed(&status_reply(0x04));
    sent(&mut engine);

    engine.transport_fault("write failed");
    engine.feed(&sim_volume(2000, 1000));
    assert!(engine.drain_outbound().is_empty());
    assert!(!engine.sale().stop_sent());
    assert!(
        !events(&mut engine)
            .iter()
            .any(|e| matches!(e, EngineEvent::AutoStop { .. }))
    );

    engine.reopen();
    engine.feed(&status_reply(0x04));
    engine.feed(&sim_volume(2050, 1025));
    assert_eq!(count_command(&sent(&mut engine), PumpCommand::Stop), 1);
}

#[test]
fn test_reopen_forgets_pump_state() {
    let mut engine = engine_after_handshake(0x04);
    engine.transport_fault("port vanished");
    engine.reopen();

    assert_eq!(engine.state(), PumpState::Reset);
    assert!(!engine.handshake().is_open());
    assert!(events(&mut engine).contains(&EngineEvent::LinkOpened));
    assert!(matches!(
        engine.send_command(PumpCommand::Authorize),
        Err(CommandError::Refused(refusal)) if refusal.reason == RefusalReason::HandshakePending
    ));
}

struct FailingStore;

impl CounterStore for FailingStore {
    fn load(&mut self) -> Result<PersistentCounters, CounterStoreError> {
        Ok(PersistentCounters {
            vehicle_count: 10,
            total_liters: 100.0,
        })
    }

    fn save(&mut self, _: &PersistentCounters) -> Result<(), CounterStoreError> {
        Err(CounterStoreError::Io {
            path: "counters.json".into(),
            source: std::io::Error::other("disk full"),
        })
    }
}

#[test]
fn test_counter_save_failure_still_advances() {
    let mut engine = Engine::new(&EngineConfig::default(), FailingStore);
    engine.feed(&status_reply(0x04));
    engine.feed(&sim_volume(1000, 500));
    engine.feed(&status_reply(0x05));

    assert_eq!(engine.counters().vehicle_count, 11);
    let events = engine.drain_events();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, EngineEvent::Warning(Warning::CounterStore(_))))
    );
    assert!(
        events
            .iter()
            .any(|e| matches!(e, EngineEvent::SaleCompleted { .. }))
    );
}

#[test]
fn test_counters_loaded_at_start() {
    let store = MemoryCounterStore::new(PersistentCounters {
        vehicle_count: 4,
        total_liters: 20.0,
    });
    let engine = Engine::new(&EngineConfig::default(), store);
    assert_eq!(engine.counters().vehicle_count, 4);
}
