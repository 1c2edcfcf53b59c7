//! Session tests against a simulated pump over `tokio::io::duplex`.

mod common;

use common::*;
use pumplink_core::PumpState;
use pumplink_engine::{CommandError, EngineConfig, EngineEvent, RefusalReason};
use pumplink_protocol::PumpCommand;
use pumplink_transport::{SessionCommand, TransportError};
use std::time::Duration;

#[tokio::test]
async fn test_status_reply_is_acked() {
    let mut harness = Harness::start(EngineConfig::default());
    harness.handshake(0x04).await;

    let engine = harness.finish().await;
    assert_eq!(engine.state(), PumpState::Filling);
}

#[tokio::test]
async fn test_command_refused_before_handshake() {
    let mut harness = Harness::start(EngineConfig::default());

    let result = harness
        .handle
        .execute(SessionCommand::Command(PumpCommand::Authorize))
        .await;
    assert!(matches!(
        result,
        Err(TransportError::Command(CommandError::Refused(refusal)))
            if refusal.reason == RefusalReason::HandshakePending
    ));

    // read-only query still goes out
    harness
        .handle
        .execute(SessionCommand::Command(PumpCommand::ReturnStatus))
        .await
        .unwrap();
    assert_eq!(
        harness.expect(9).await,
        [0x50, 0x30, 0x01, 0x01, 0x00, 0x9F, 0x5C, 0x03, 0xFA]
    );
    harness.finish().await;
}

#[tokio::test]
async fn test_authorize_written_after_handshake() {
    let mut harness = Harness::start(EngineConfig::default());
    harness.handshake(0x01).await;

    harness
        .handle
        .execute(SessionCommand::Command(PumpCommand::Authorize))
        .await
        .unwrap();
    assert_eq!(
        harness.expect(9).await,
        [0x50, 0x30, 0x01, 0x01, 0x06, 0x1F, 0x5E, 0x03, 0xFA]
    );
    harness
        .event(|e| *e == EngineEvent::IntentApplied(PumpState::Authorized))
        .await;
    harness.finish().await;
}

#[tokio::test]
async fn test_preset_fill_end_to_end() {
    let mut harness = Harness::start(EngineConfig::default());
    harness.handshake(0x01).await;

    harness
        .handle
        .execute(SessionCommand::StartFill(Some(8.0)))
        .await
        .unwrap();
    assert_eq!(
        harness.expect(12).await,
        [0x50, 0x30, 0x03, 0x04, 0x00, 0x00, 0x08, 0x00, 0xC3, 0x0C, 0x03, 0xFA]
    );

    // AUTHORIZE follows the next busy keepalive
    harness.send(&BUSY).await;
    assert_eq!(harness.expect(9).await[4], 0x06);

    harness.send(&status_reply(0x04)).await;
    assert_eq!(harness.expect(3).await, ACK);

    // 8.000 L, 40.00
    harness
        .send(&seal(&[
            0x50, 0xD2, 0x01, 0x08, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00,
        ]))
        .await;
    assert_eq!(harness.expect(3).await, ACK);
    assert_eq!(
        harness.expect(9).await,
        [0x50, 0x30, 0x01, 0x01, 0x08, 0x9E, 0x9A, 0x03, 0xFA]
    );
    harness
        .event(|e| matches!(e, EngineEvent::AutoStop { .. }))
        .await;

    harness.send(&status_reply(0x05)).await;
    let completed = harness
        .event(|e| matches!(e, EngineEvent::SaleCompleted { .. }))
        .await;
    assert!(matches!(
        completed,
        EngineEvent::SaleCompleted { liters, .. } if liters == 8.0
    ));

    let engine = harness.finish().await;
    assert_eq!(engine.counters().vehicle_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_poll_heartbeat() {
    let config = EngineConfig {
        auto_poll: true,
        poll_interval_ms: 100,
        ..EngineConfig::default()
    };
    let mut harness = Harness::start(config);

    assert_eq!(harness.expect(3).await, POLL);
    assert_eq!(harness.expect(3).await, POLL);

    harness
        .handle
        .execute(SessionCommand::SetAutoPoll {
            enabled: false,
            interval: Duration::from_millis(100),
        })
        .await
        .unwrap();
    let engine = harness.finish().await;
    assert!(!engine.heartbeat().is_enabled());
}

#[tokio::test]
async fn test_peer_close_faults_link() {
    let mut harness = Harness::start(EngineConfig::default());
    harness.handshake(0x01).await;

    drop(std::mem::replace(&mut harness.pump, tokio::io::duplex(8).0));
    harness
        .event(|e| matches!(e, EngineEvent::TransportFault(_)))
        .await;

    let result = harness.handle.execute(SessionCommand::MinPoll).await;
    assert!(matches!(
        result,
        Err(TransportError::Command(CommandError::Refused(refusal)))
            if refusal.reason == RefusalReason::LinkDown
    ));
    harness.finish().await;
}

#[tokio::test]
async fn test_close_ends_session() {
    let harness = Harness::start(EngineConfig::default());
    let handle = harness.handle.clone();
    let mut events = harness.finish_events().await;

    assert!(handle.is_closed());
    assert!(matches!(
        handle.execute(SessionCommand::MinPoll).await,
        Err(TransportError::SessionClosed)
    ));
    // closing twice is harmless
    handle.close().await;

    let mut closed = 0;
    while let Some(event) = events.recv().await {
        if event == EngineEvent::LinkClosed {
            closed += 1;
        }
    }
    assert_eq!(closed, 1);
}

#[tokio::test]
async fn test_reopen_after_peer_close() {
    let mut harness = Harness::start_reopenable(EngineConfig::default());
    harness.handshake(0x01).await;

    drop(std::mem::replace(&mut harness.pump, tokio::io::duplex(8).0));
    harness
        .event(|e| matches!(e, EngineEvent::TransportFault(_)))
        .await;

    harness.reopen().await;
    harness.event(|e| *e == EngineEvent::LinkOpened).await;

    // the handshake starts over on the new line
    let result = harness
        .handle
        .execute(SessionCommand::Command(PumpCommand::Authorize))
        .await;
    assert!(matches!(
        result,
        Err(TransportError::Command(CommandError::Refused(refusal)))
            if refusal.reason == RefusalReason::HandshakePending
    ));

    harness.handshake(0x01).await;
    harness
        .handle
        .execute(SessionCommand::Command(PumpCommand::Authorize))
        .await
        .unwrap();
    assert_eq!(
        harness.expect(9).await,
        [0x50, 0x30, 0x01, 0x01, 0x06, 0x1F, 0x5E, 0x03, 0xFA]
    );
    harness.finish().await;
}

#[tokio::test]
async fn test_reopen_without_connector_is_refused() {
    let harness = Harness::start(EngineConfig::default());
    assert!(matches!(
        harness.handle.reopen().await,
        Err(TransportError::NoConnector)
    ));
    harness.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_reopen_restarts_heartbeat() {
    let config = EngineConfig {
        auto_poll: true,
        poll_interval_ms: 100,
        ..EngineConfig::default()
    };
    let mut harness = Harness::start_reopenable(config);
    assert_eq!(harness.expect(3).await, POLL);

    harness.reopen().await;
    assert_eq!(harness.expect(3).await, POLL);
    harness.finish().await;
}
