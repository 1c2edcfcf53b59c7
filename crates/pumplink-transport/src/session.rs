//! The processing activity.
//!
//! A [`Session`] owns the [`Engine`] and multiplexes three inputs with
//! `tokio::select!`: frames from the reader, requests from
//! [`SessionHandle`]s and the heartbeat timer. After each input it writes
//! whatever the engine queued and forwards the engine's events.
//!
//! A session built [`Session::with_connector`] can replace a failed line
//! through [`SessionHandle::reopen`]: the old link is released first, then
//! the connector opens a new one and the heartbeat timer restarts.
//!
//! # Example
//!
//! ```no_run
//! use pumplink_engine::{Engine, EngineConfig, MemoryCounterStore};
//! use pumplink_protocol::PumpCommand;
//! use pumplink_transport::{Session, SessionCommand, connect_stream};
//!
//! # async fn example(line: tokio::io::DuplexStream) -> pumplink_transport::Result<()> {
//! let engine = Engine::new(&EngineConfig::default(), MemoryCounterStore::default());
//! let (session, handle, mut events) = Session::new(engine, connect_stream(line));
//! let task = tokio::spawn(session.run());
//!
//! handle.execute(SessionCommand::Command(PumpCommand::ReturnStatus)).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event}");
//! }
//!
//! handle.close().await;
//! let engine = task.await.unwrap();
//! println!("final state {}", engine.state());
//! # Ok(())
//! # }
//! ```

use futures::future::BoxFuture;
use pumplink_core::CrcOrder;
use pumplink_engine::{CommandError, CounterStore, Engine, EngineEvent};
use pumplink_protocol::PumpCommand;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::link::{FrameWriter, Link, LinkInput};

const CONTROL_QUEUE_SIZE: usize = 16;

/// Pending result of a [`Connector`].
pub type ConnectFuture<W> = BoxFuture<'static, Result<Link<W>>>;

/// Opens a fresh link for [`SessionHandle::reopen`].
pub type Connector<W> = Box<dyn FnMut() -> ConnectFuture<W> + Send>;

/// Operations a consumer can ask of a running session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    Command(PumpCommand),
    Generic(u8),
    /// Preset (or free) fill with AUTHORIZE on the next busy.
    StartFill(Option<f64>),
    PresetVolume(f64),
    TotalsRequest,
    MinPoll,
    MinAck,
    SetCrcOrder(CrcOrder),
    SetAutoAck(bool),
    SetAutoPoll { enabled: bool, interval: Duration },
}

struct Request {
    command: SessionCommand,
    reply: oneshot::Sender<std::result::Result<(), CommandError>>,
}

enum Control {
    Execute(Request),
    Reopen(oneshot::Sender<Result<()>>),
    Close,
}

/// Cloneable handle to a running [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    control: mpsc::Sender<Control>,
}

impl SessionHandle {
    /// Run a command on the session and wait for the engine's verdict.
    ///
    /// # Errors
    /// `TransportError::Command` when the engine refused the command,
    /// `TransportError::SessionClosed` when the session has ended.
    pub async fn execute(&self, command: SessionCommand) -> Result<()> {
        let (reply, verdict) = oneshot::channel();
        self.control
            .send(Control::Execute(Request { command, reply }))
            .await
            .map_err(|_| TransportError::SessionClosed)?;
        verdict.await.map_err(|_| TransportError::SessionClosed)??;
        Ok(())
    }

    /// Replace the line and start over: the handshake must be reacquired.
    ///
    /// # Errors
    /// `TransportError::NoConnector` for a session built without one, the
    /// connector's error when the new line cannot be opened (the engine
    /// then stays faulted), `TransportError::SessionClosed` when the
    /// session has ended.
    pub async fn reopen(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.control
            .send(Control::Reopen(reply))
            .await
            .map_err(|_| TransportError::SessionClosed)?;
        done.await.map_err(|_| TransportError::SessionClosed)?
    }

    /// Ask the session to close. Closing an ended session is a no-op.
    pub async fn close(&self) {
        let _ = self.control.send(Control::Close).await;
    }

    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Control::Execute(request) => write!(f, "Execute({:?})", request.command),
            Control::Reopen(_) => f.write_str("Reopen"),
            Control::Close => f.write_str("Close"),
        }
    }
}

pub struct Session<S: CounterStore, W: FrameWriter> {
    engine: Engine<S>,
    /// `None` after a reopen whose connector failed.
    link: Option<Link<W>>,
    connector: Option<Connector<W>>,
    control: mpsc::Receiver<Control>,
    events: mpsc::UnboundedSender<EngineEvent>,
    reader_done: bool,
}

impl<S, W> Session<S, W>
where
    S: CounterStore,
    W: FrameWriter,
{
    /// Wire an engine to a link. Events arrive on the returned receiver
    /// until the session ends.
    pub fn new(
        engine: Engine<S>,
        link: Link<W>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<EngineEvent>) {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_SIZE);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            engine,
            link: Some(link),
            connector: None,
            control: control_rx,
            events: events_tx,
            reader_done: false,
        };
        (
            session,
            SessionHandle {
                control: control_tx,
            },
            events_rx,
        )
    }

    /// Allow [`SessionHandle::reopen`], opening new links with `connector`.
    #[must_use]
    pub fn with_connector(mut self, connector: Connector<W>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Process until closed, then hand the engine back.
    ///
    /// The session ends on [`SessionHandle::close`] or when every handle
    /// is dropped. A line fault does not end it: the engine refuses sends
    /// and reports the fault as an event until the link is reopened.
    pub async fn run(mut self) -> Engine<S> {
        info!("session started");
        let mut heartbeat = heartbeat_timer(self.engine.heartbeat().interval());

        loop {
            let mut reply = None;
            tokio::select! {
                input = next_input(self.link.as_mut()), if !self.reader_done => self.on_input(input),
                control = self.control.recv() => match control {
                    Some(Control::Execute(request)) => {
                        debug!(command = ?request.command, "session command");
                        let verdict = self.execute(request.command, &mut heartbeat);
                        reply = Some((request.reply, verdict));
                    }
                    Some(Control::Reopen(done)) => {
                        let result = self.reopen(&mut heartbeat).await;
                        self.forward_events();
                        let _ = done.send(result);
                    }
                    Some(Control::Close) | None => break,
                },
                _ = heartbeat.tick() => {
                    self.engine.heartbeat_tick();
                }
            }

            self.flush().await;
            if let Some((reply, verdict)) = reply {
                let _ = reply.send(verdict);
            }
        }

        self.engine.close();
        if let Some(link) = self.link.as_mut() {
            link.reader.stop();
        }
        self.forward_events();
        info!("session ended");
        self.engine
    }

    fn on_input(&mut self, input: Option<LinkInput>) {
        match input {
            Some(LinkInput::Frame(frame)) => self.engine.process_frame(frame),
            Some(LinkInput::Fault(message)) => {
                self.reader_done = true;
                self.engine.transport_fault(message);
            }
            Some(LinkInput::Eof) | None => {
                self.reader_done = true;
                self.engine.transport_fault("line closed by peer");
            }
        }
    }

    async fn reopen(&mut self, heartbeat: &mut Interval) -> Result<()> {
        let Some(connector) = self.connector.as_mut() else {
            return Err(TransportError::NoConnector);
        };
        // the old line is released before a new one is opened on the same port
        if let Some(old) = self.link.take() {
            let Link { writer, reader, .. } = old;
            drop(writer);
            reader.shutdown().await;
        }
        self.reader_done = true;

        match connector().await {
            Ok(link) => {
                self.link = Some(link);
                self.reader_done = false;
                self.engine.reopen();
                *heartbeat = heartbeat_timer(self.engine.heartbeat().interval());
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "reopen failed");
                self.engine.transport_fault(format!("reopen failed: {err}"));
                Err(err)
            }
        }
    }

    fn execute(
        &mut self,
        command: SessionCommand,
        heartbeat: &mut Interval,
    ) -> std::result::Result<(), CommandError> {
        let engine = &mut self.engine;
        match command {
            SessionCommand::Command(command) => engine.send_command(command),
            SessionCommand::Generic(code) => engine.send_generic(code),
            SessionCommand::StartFill(preset) => engine.start_fill(preset),
            SessionCommand::PresetVolume(liters) => engine.send_preset_volume(liters),
            SessionCommand::TotalsRequest => engine.send_totals_request(),
            SessionCommand::MinPoll => engine.send_min_poll(),
            SessionCommand::MinAck => engine.send_min_ack(),
            SessionCommand::SetCrcOrder(order) => {
                engine.set_crc_order(order);
                Ok(())
            }
            SessionCommand::SetAutoAck(enabled) => {
                engine.set_auto_ack(enabled);
                Ok(())
            }
            SessionCommand::SetAutoPoll { enabled, interval } => {
                engine.set_auto_poll(enabled, interval);
                *heartbeat = heartbeat_timer(engine.heartbeat().interval());
                Ok(())
            }
        }
    }

    /// Write queued frames in order. A failed write faults the engine and
    /// drops the rest.
    async fn flush(&mut self) {
        let frames = self.engine.drain_outbound();
        if let Some(link) = self.link.as_mut() {
            for frame in frames {
                if let Err(err) = link.writer.write_frame(&frame).await {
                    self.engine.transport_fault(err.to_string());
                    break;
                }
            }
        }
        self.forward_events();
    }

    fn forward_events(&mut self) {
        for event in self.engine.drain_events() {
            // a consumer that stopped listening does not stop the session
            let _ = self.events.send(event);
        }
    }
}

async fn next_input<W>(link: Option<&mut Link<W>>) -> Option<LinkInput> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

/// Timer whose first tick is one period away.
fn heartbeat_timer(period: Duration) -> Interval {
    let mut timer = time::interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}
