//! Serial port link.
//!
//! The port is opened once and cloned: the reader thread owns one handle
//! (timed blocking reads), the session writes through the other. Writes
//! run on the blocking pool so a slow line never stalls the runtime.

use bytes::BytesMut;
use pumplink_protocol::{OutboundFrame, PumpCodec};
use serialport::{DataBits, FlowControl, SerialPort, SerialPortInfo};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, trace, warn};

use crate::config::{Parity, SerialConfig, StopBits};
use crate::error::{Result, TransportError};
use crate::link::{FrameWriter, INBOUND_QUEUE_SIZE, Link, LinkInput, ReaderHandle};

const READ_CHUNK: usize = 256;

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(stop_bits: StopBits) -> Self {
        match stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Write half of a serial link. The port is lent to a blocking task for
/// each frame and handed back when the write completes.
pub struct SerialWriter<P = Box<dyn SerialPort>> {
    port: Option<P>,
}

impl<P: Write + Send + 'static> SerialWriter<P> {
    pub fn new(port: P) -> Self {
        Self { port: Some(port) }
    }
}

impl<P: Write + Send + 'static> FrameWriter for SerialWriter<P> {
    async fn write_frame(&mut self, frame: &OutboundFrame) -> Result<()> {
        let mut port = self.port.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "serial writer lost its port")
        })?;
        let bytes = frame.bytes.clone();
        let (port, written) = tokio::task::spawn_blocking(move || {
            let written = port.write_all(&bytes).and_then(|()| port.flush());
            (port, written)
        })
        .await
        .map_err(io::Error::other)?;
        self.port = Some(port);
        written?;
        Ok(())
    }
}

/// Open the port and start its reader thread.
///
/// # Errors
/// Returns `TransportError::Open` if the port cannot be opened or cloned,
/// `TransportError::Io` if the reader thread cannot be spawned.
pub fn open_serial(config: &SerialConfig) -> Result<Link<SerialWriter>> {
    let open_error = |source| TransportError::Open {
        port: config.port.clone(),
        source,
    };

    let reader = serialport::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(config.parity.into())
        .stop_bits(config.stop_bits.into())
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout())
        .open()
        .map_err(open_error)?;

    let mut writer = reader.try_clone().map_err(open_error)?;
    writer
        .set_timeout(config.write_timeout())
        .map_err(open_error)?;

    let (tx, rx) = mpsc::channel(INBOUND_QUEUE_SIZE);
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let join = std::thread::Builder::new()
        .name("pumplink-reader".to_string())
        .spawn(move || read_loop(reader, &tx, &flag))?;

    info!(%config, "serial port open");
    Ok(Link::new(
        SerialWriter::new(writer),
        rx,
        ReaderHandle::thread(stop, join),
    ))
}

/// Ports known to the OS, for port pickers.
///
/// # Errors
/// Returns the enumeration error as `TransportError::Io`.
pub fn available_ports() -> Result<Vec<SerialPortInfo>> {
    serialport::available_ports().map_err(|err| TransportError::Io(io::Error::other(err)))
}

fn read_loop(mut port: Box<dyn SerialPort>, tx: &mpsc::Sender<LinkInput>, stop: &AtomicBool) {
    let mut codec = PumpCodec::new();
    let mut buffer = BytesMut::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    while !stop.load(Ordering::SeqCst) {
        match port.read(&mut chunk) {
            Ok(0) => {}
            Ok(n) => {
                trace!(bytes = n, "serial read");
                buffer.extend_from_slice(&chunk[..n]);
                loop {
                    match codec.decode(&mut buffer) {
                        Ok(Some(frame)) => {
                            if tx.blocking_send(LinkInput::Frame(frame)).is_err() {
                                debug!("session gone, serial reader exiting");
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => warn!(error = %err, "frame dropped"),
                    }
                }
            }
            Err(err) if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
            Err(err) => {
                error!(error = %err, "serial read failed");
                let _ = tx.blocking_send(LinkInput::Fault(err.to_string()));
                return;
            }
        }
    }
    debug!("serial reader stopped");
}
