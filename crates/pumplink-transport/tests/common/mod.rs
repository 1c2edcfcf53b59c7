//! Simulated pump on the far end of an in-memory line.

#![allow(dead_code)]

use pumplink_core::CrcOrder;
use pumplink_engine::{Engine, EngineConfig, EngineEvent, MemoryCounterStore};
use pumplink_protocol::crc;
use pumplink_transport::{
    ConnectFuture, Connector, Session, SessionHandle, StreamWriter, TransportError, connect_stream,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const ACK: [u8; 3] = [0x50, 0xC0, 0xFA];
pub const POLL: [u8; 3] = [0x50, 0x20, 0xFA];
pub const BUSY: [u8; 3] = [0x50, 0x70, 0xFA];

pub fn seal(body: &[u8]) -> Vec<u8> {
    let mut bytes = body.to_vec();
    crc::append(&mut bytes, CrcOrder::LoHi);
    bytes.extend_from_slice(&[0x03, 0xFA]);
    bytes
}

pub fn status_reply(code: u8) -> Vec<u8> {
    seal(&[0x50, 0x30, 0x01, 0x01, code])
}

pub struct Harness {
    pub pump: DuplexStream,
    pub handle: SessionHandle,
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
    pub task: JoinHandle<Engine<MemoryCounterStore>>,
    /// Pump ends of lines opened by the connector.
    pub reopened: Option<mpsc::UnboundedReceiver<DuplexStream>>,
}

impl Harness {
    pub fn start(config: EngineConfig) -> Self {
        let (line, pump) = tokio::io::duplex(1024);
        let engine = Engine::new(&config, MemoryCounterStore::default());
        let (session, handle, events) = Session::new(engine, connect_stream(line));
        Self {
            pump,
            handle,
            events,
            task: tokio::spawn(session.run()),
            reopened: None,
        }
    }

    /// Like [`Harness::start`], with a connector that opens new in-memory
    /// lines on reopen.
    pub fn start_reopenable(config: EngineConfig) -> Self {
        let (line, pump) = tokio::io::duplex(1024);
        let (pumps_tx, pumps_rx) = mpsc::unbounded_channel();
        let connector: Connector<StreamWriter<DuplexStream>> =
            Box::new(move || -> ConnectFuture<StreamWriter<DuplexStream>> {
                let (line, pump) = tokio::io::duplex(1024);
                let _ = pumps_tx.send(pump);
                Box::pin(async move { Ok::<_, TransportError>(connect_stream(line)) })
            });

        let engine = Engine::new(&config, MemoryCounterStore::default());
        let (session, handle, events) = Session::new(engine, connect_stream(line));
        Self {
            pump,
            handle,
            events,
            task: tokio::spawn(session.with_connector(connector).run()),
            reopened: Some(pumps_rx),
        }
    }

    /// Reopen the session and switch to the new pump end.
    pub async fn reopen(&mut self) {
        self.handle.reopen().await.unwrap();
        let pumps = self.reopened.as_mut().expect("session has no connector");
        self.pump = pumps.recv().await.expect("connector opened no line");
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.pump.write_all(bytes).await.unwrap();
    }

    /// Read exactly `len` bytes written by the session.
    pub async fn expect(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(Duration::from_secs(2), self.pump.read_exact(&mut buf))
            .await
            .expect("session wrote nothing")
            .unwrap();
        buf
    }

    /// Wait for the first event matching `pred`.
    pub async fn event(&mut self, pred: impl Fn(&EngineEvent) -> bool) -> EngineEvent {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = self.events.recv().await.expect("event stream ended");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("event not seen")
    }

    /// Send a status reply and consume the ack.
    pub async fn handshake(&mut self, code: u8) {
        self.send(&status_reply(code)).await;
        assert_eq!(self.expect(3).await, ACK);
        self.event(|e| *e == EngineEvent::HandshakeAcquired).await;
    }

    pub async fn finish(self) -> Engine<MemoryCounterStore> {
        self.handle.close().await;
        self.task.await.unwrap()
    }

    /// Close, wait for the session to end and return the remaining events.
    pub async fn finish_events(self) -> mpsc::UnboundedReceiver<EngineEvent> {
        self.handle.close().await;
        self.task.await.unwrap();
        self.events
    }
}
