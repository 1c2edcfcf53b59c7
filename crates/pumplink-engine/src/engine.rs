//! Sans-IO protocol engine.
//!
//! [`Engine`] owns all protocol state for one pump: the state machine,
//! handshake gate, sale window and counters. It never touches a port.
//! Input arrives as bytes ([`Engine::feed`]) or delimited frames
//! ([`Engine::process_frame`]); output leaves through two queues:
//!
//! - [`Engine::drain_outbound`]: frames to write to the line, in order.
//! - [`Engine::drain_events`]: [`EngineEvent`]s for the consumer.
//!
//! Side effects triggered while decoding (auto-ack, auto-stop, deferred
//! authorize) are queued on the same outbound path as caller commands, so a
//! single driver serializes everything that reaches the wire. Nothing is
//! queued while the link is faulted or closed.
//!
//! # Example
//!
//! ```
//! use pumplink_core::PumpState;
//! use pumplink_engine::{Engine, EngineConfig, EngineEvent, MemoryCounterStore};
//!
//! let mut engine = Engine::new(&EngineConfig::default(), MemoryCounterStore::default());
//!
//! // FILLING status reply from the pump
//! engine.feed(&[0x50, 0x30, 0x01, 0x01, 0x04, 0x9E, 0x9F, 0x03, 0xFA]);
//!
//! assert_eq!(engine.state(), PumpState::Filling);
//! assert!(engine.handshake().is_open());
//! let events = engine.drain_events();
//! assert!(events.contains(&EngineEvent::HandshakeAcquired));
//!
//! // auto-ack queued for the valid long frame
//! let outbound = engine.drain_outbound();
//! assert_eq!(outbound[0].as_bytes(), &[0x50, 0xC0, 0xFA]);
//! ```

use pumplink_core::{CrcOrder, PumpState};
use pumplink_protocol::{
    CommandBuilder, Frame, NozzleReport, OutboundFrame, OutboundKind, PumpCommand, PumpEvent,
    PumpEventCode, RawFrame, Record, ShortCode, StatusOrigin, StreamParser, VolumeSample,
    clamp_preset, decode, hex_line,
};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use crate::config::EngineConfig;
use crate::counters::{CounterStore, PersistentCounters};
use crate::events::{Direction, EngineEvent, Refusal, RefusalReason, Warning};
use crate::handshake::{HandshakeState, Heartbeat};
use crate::sale::{SaleOutcome, SaleWindow, liters_to_ml};
use crate::state_machine::PumpStateMachine;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Refused(Refusal),

    #[error(transparent)]
    Protocol(#[from] pumplink_core::Error),
}

/// Whether the engine may exchange frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Open,
    /// A transport error was reported; sends are refused until reopened.
    Faulted,
    Closed,
}

pub struct Engine<S: CounterStore> {
    builder: CommandBuilder,
    parser: StreamParser,
    machine: PumpStateMachine,
    handshake: HandshakeState,
    heartbeat: Heartbeat,
    sale: SaleWindow,
    counters: PersistentCounters,
    store: S,
    nozzle_out: bool,
    auto_ack: bool,
    link: LinkState,
    outbox: VecDeque<OutboundFrame>,
    events: VecDeque<EngineEvent>,
}

impl<S: CounterStore> Engine<S> {
    /// Create an engine with the link open, loading counters from `store`.
    ///
    /// A store that fails to load leaves the counters at zero and queues a
    /// warning event.
    pub fn new(config: &EngineConfig, mut store: S) -> Self {
        let mut events = VecDeque::new();
        let counters = match store.load() {
            Ok(counters) => counters,
            Err(err) => {
                warn!(error = %err, "could not load counters, starting from zero");
                events.push_back(EngineEvent::Warning(Warning::CounterStore(err.to_string())));
                PersistentCounters::default()
            }
        };
        info!(
            vehicles = counters.vehicle_count,
            total_liters = counters.total_liters,
            address = %config.address,
            "engine started"
        );

        Self {
            builder: CommandBuilder::new(config.address)
                .with_nozzle(config.nozzle)
                .with_crc_order(config.crc_order),
            parser: StreamParser::new(),
            machine: PumpStateMachine::new(),
            handshake: HandshakeState::new(),
            heartbeat: Heartbeat::new(config.auto_poll, config.poll_interval()),
            sale: SaleWindow::new(),
            counters,
            store,
            nozzle_out: false,
            auto_ack: config.auto_ack,
            link: LinkState::Open,
            outbox: VecDeque::new(),
            events,
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Delimit and process raw bytes from the line.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.link == LinkState::Closed {
            self.warn_closed();
            return;
        }
        self.parser.feed(bytes);
        while let Some(raw) = self.parser.next_frame() {
            self.process_frame(raw);
        }
    }

    /// Process one delimited frame.
    pub fn process_frame(&mut self, raw: RawFrame) {
        if self.link == LinkState::Closed {
            self.warn_closed();
            return;
        }

        let frame = match Frame::from_raw(raw.clone(), self.builder.crc_order()) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(frame = %raw, error = %err, "frame rejected");
                self.trace(Direction::Rx, raw.into_bytes(), None);
                self.emit(EngineEvent::Warning(Warning::Frame(err.to_string())));
                return;
            }
        };

        let decoded = decode(&frame);
        self.trace(Direction::Rx, raw.into_bytes(), decoded.crc_ok);

        for warning in decoded.warnings.iter().cloned() {
            warn!(%warning, "decode warning");
            self.emit(EngineEvent::Warning(Warning::Decode(warning)));
        }

        if decoded.opens_handshake() && self.handshake.observe() {
            info!("handshake acquired");
            self.emit(EngineEvent::HandshakeAcquired);
        }

        if self.auto_ack && decoded.is_valid_long() {
            self.queue(self.builder.min_ack());
        }

        for record in decoded.records {
            self.apply_record(record);
        }
    }

    fn apply_record(&mut self, record: Record) {
        debug!(?record, "decoded");
        match record {
            Record::Short(ShortCode::Busy) => {
                if self.sale.take_deferred_authorize() {
                    info!("busy after preset, sending deferred AUTHORIZE");
                    self.transmit_command(PumpCommand::Authorize);
                }
            }
            Record::Short(_) => {}
            Record::Status { state, origin } => self.apply_status(state, origin),
            Record::Volume(sample) => self.apply_sample(sample),
            Record::Nozzle(report) => self.apply_nozzle(report),
            Record::Totals(totals) => self.emit(EngineEvent::Totals(totals)),
            Record::FillRecord(fill) => {
                self.sale.record_fill(&fill);
                self.emit(EngineEvent::FillRecord(fill));
            }
            Record::PumpEvent(event) => self.apply_pump_event(event),
        }
    }

    fn apply_status(&mut self, state: PumpState, origin: StatusOrigin) {
        let transition = self.machine.apply(state);
        if transition.is_change() {
            info!(from = %transition.from, to = %state, ?origin, "pump status");
            self.emit(EngineEvent::StatusChanged {
                from: transition.from,
                to: state,
                origin,
            });
        }

        if matches!(state, PumpState::Reset | PumpState::NotProgrammed)
            && self.sale.any_authorize_pending()
            && !transition.from.opens_sale()
        {
            warn!(%state, "pump did not accept AUTHORIZE");
            self.sale.clear_pending();
            self.emit(EngineEvent::AuthorizationFailed { state });
        }

        if origin == StatusOrigin::Direct
            && matches!(
                state,
                PumpState::Filling
                    | PumpState::FillingCompleted
                    | PumpState::MaxAmountVolume
                    | PumpState::SwitchedOff
                    | PumpState::Reset
            )
        {
            self.sale.clear_authorize_pending();
        }

        if state.opens_sale() && !self.sale.is_active() {
            self.sale.open();
            info!(%state, "sale opened");
            self.emit(EngineEvent::SaleOpened);
        }

        if transition.entered_terminal() {
            match self.sale.close(state.is_reset_class()) {
                Some(SaleOutcome::Completed { liters, amount }) => {
                    self.complete_sale(liters, amount);
                }
                Some(SaleOutcome::NoSample) => {
                    warn!(%state, "sale ended without a volume sample, counters unchanged");
                    self.emit(EngineEvent::SaleWithoutSample { state });
                }
                Some(SaleOutcome::AlreadyCounted) => {
                    debug!(%state, "sale already counted");
                }
                None => {}
            }
        }
    }

    fn complete_sale(&mut self, liters: f64, amount: f64) {
        self.counters.bump(liters);
        if let Err(err) = self.store.save(&self.counters) {
            error!(error = %err, "counter save failed");
            self.emit(EngineEvent::Warning(Warning::CounterStore(err.to_string())));
        }
        info!(
            liters,
            amount,
            vehicles = self.counters.vehicle_count,
            total_liters = self.counters.total_liters,
            "sale completed"
        );
        self.emit(EngineEvent::SaleCompleted {
            liters,
            amount,
            counters: self.counters,
        });
    }

    fn apply_sample(&mut self, sample: VolumeSample) {
        let reached = self.sale.record_sample(&sample);
        self.emit(EngineEvent::VolumeSample(sample));

        if reached {
            let target_liters = self
                .sale
                .preset_target_ml()
                .map_or(0.0, |ml| f64::from(ml) / 1000.0);
            if self.transmit_command(PumpCommand::Stop) {
                info!(liters = sample.liters, target_liters, "preset reached, STOP sent");
                self.emit(EngineEvent::AutoStop {
                    liters: sample.liters,
                    target_liters,
                });
            } else {
                self.sale.retry_stop();
            }
        }
    }

    fn apply_nozzle(&mut self, report: NozzleReport) {
        let changed = self.nozzle_out != report.out;
        self.nozzle_out = report.out;
        if changed || report.unit_price.is_some() {
            self.emit(EngineEvent::Nozzle(report));
        }
    }

    fn apply_pump_event(&mut self, event: PumpEvent) {
        match event.code {
            PumpEventCode::NozzleOut => self.nozzle_out = true,
            PumpEventCode::NozzleIn => self.nozzle_out = false,
            _ => {}
        }
        self.emit(EngineEvent::PumpEvent(event));
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Send a CD1 command, subject to the safety gates.
    ///
    /// # Errors
    /// Returns `CommandError::Refused` (and queues a refusal event) when the
    /// link is down, the handshake is pending for a state-changing command,
    /// or RESUME is sent with the nozzle stowed.
    pub fn send_command(&mut self, command: PumpCommand) -> Result<(), CommandError> {
        let kind = OutboundKind::Command(command);
        self.check_link(kind)?;
        if !command.is_read_only() {
            self.check_handshake(kind)?;
        }
        if command == PumpCommand::Resume && !self.nozzle_out {
            return Err(self.refuse(kind, RefusalReason::NozzleStowed));
        }
        self.transmit_command(command);
        Ok(())
    }

    /// Send a CD1 command with a raw code.
    ///
    /// # Errors
    /// See [`Engine::send_command`].
    pub fn send_generic(&mut self, code: u8) -> Result<(), CommandError> {
        self.send_command(PumpCommand::from_u8(code))
    }

    /// Send a CD3 preset frame on its own. Inside an active sale window
    /// only the first preset goes out; later ones are skipped.
    ///
    /// # Errors
    /// Refused before the handshake or with the link down;
    /// `CommandError::Protocol` for a non-finite volume.
    pub fn send_preset_volume(&mut self, liters: f64) -> Result<(), CommandError> {
        let frame = self.builder.preset_volume(liters)?;
        self.check_link(frame.kind)?;
        self.check_handshake(frame.kind)?;
        if self.sale.mark_preset_sent() {
            self.queue(frame);
        } else {
            debug!(liters, "preset already sent in this sale");
        }
        Ok(())
    }

    /// Start a fill: with a preset, arm auto-stop and send the preset frame
    /// (once per sale); without one, disarm any preset. Either way
    /// AUTHORIZE is deferred to the next Busy keepalive.
    ///
    /// # Errors
    /// Refused before the handshake or with the link down;
    /// `CommandError::Protocol` for a non-finite volume.
    pub fn start_fill(&mut self, preset_liters: Option<f64>) -> Result<(), CommandError> {
        let kind = OutboundKind::Command(PumpCommand::Authorize);
        self.check_link(kind)?;
        self.check_handshake(kind)?;

        match preset_liters {
            Some(liters) => {
                let liters = clamp_preset(liters)?;
                self.sale.arm_preset(liters_to_ml(liters));
                if self.sale.mark_preset_sent() {
                    let frame = self.builder.preset_volume(liters)?;
                    self.queue(frame);
                } else {
                    debug!("preset already sent in this sale");
                }
                info!(liters, "preset armed, AUTHORIZE deferred to next busy");
            }
            None => {
                self.sale.disarm_preset();
                info!("free fill, AUTHORIZE deferred to next busy");
            }
        }
        self.sale.defer_authorize();
        Ok(())
    }

    /// # Errors
    /// Refused with the link down.
    pub fn send_totals_request(&mut self) -> Result<(), CommandError> {
        let frame = self.builder.totals_request();
        self.check_link(frame.kind)?;
        self.queue(frame);
        Ok(())
    }

    /// # Errors
    /// Refused with the link down.
    pub fn send_min_poll(&mut self) -> Result<(), CommandError> {
        let frame = self.builder.min_poll();
        self.check_link(frame.kind)?;
        self.queue(frame);
        Ok(())
    }

    /// # Errors
    /// Refused with the link down.
    pub fn send_min_ack(&mut self) -> Result<(), CommandError> {
        let frame = self.builder.min_ack();
        self.check_link(frame.kind)?;
        self.queue(frame);
        Ok(())
    }

    /// Queue a CD1 frame with its bookkeeping and intent hint. Only the
    /// link is checked; returns `false` when the frame was not queued.
    fn transmit_command(&mut self, command: PumpCommand) -> bool {
        if !self.queue(self.builder.command(command)) {
            return false;
        }
        match command {
            PumpCommand::Authorize => self.sale.mark_authorize_sent(),
            PumpCommand::Stop | PumpCommand::SwitchOff => self.sale.clear_pending(),
            _ => {}
        }

        if self.handshake.is_open()
            && let Some(intent) = command.intent()
        {
            self.machine.apply_intent(intent);
            self.emit(EngineEvent::IntentApplied(intent));
        }
        true
    }

    fn check_link(&mut self, kind: OutboundKind) -> Result<(), CommandError> {
        match self.link {
            LinkState::Open => Ok(()),
            LinkState::Faulted | LinkState::Closed => Err(self.refuse(kind, RefusalReason::LinkDown)),
        }
    }

    fn check_handshake(&mut self, kind: OutboundKind) -> Result<(), CommandError> {
        if self.handshake.is_open() {
            Ok(())
        } else {
            Err(self.refuse(kind, RefusalReason::HandshakePending))
        }
    }

    fn refuse(&mut self, command: OutboundKind, reason: RefusalReason) -> CommandError {
        let refusal = Refusal { command, reason };
        warn!(%refusal, "command refused");
        self.emit(EngineEvent::Refused(refusal));
        CommandError::Refused(refusal)
    }

    // ========================================================================
    // Settings and lifecycle
    // ========================================================================

    pub fn set_crc_order(&mut self, order: CrcOrder) {
        info!(%order, "CRC byte order");
        self.builder.set_crc_order(order);
    }

    pub fn set_auto_ack(&mut self, enabled: bool) {
        self.auto_ack = enabled;
    }

    /// Enable or disable the liveness poll and set its period.
    pub fn set_auto_poll(&mut self, enabled: bool, interval: Duration) {
        self.heartbeat.configure(enabled, interval);
        info!(enabled, interval_ms = self.heartbeat.interval().as_millis() as u64, "auto poll");
    }

    /// One heartbeat period elapsed. Queues a poll and returns `true` if
    /// auto-poll is on and the link is open, whatever the pump state.
    pub fn heartbeat_tick(&mut self) -> bool {
        if self.link != LinkState::Open || !self.heartbeat.is_enabled() {
            return false;
        }
        if self.heartbeat.tick() {
            debug!(
                ticks = self.heartbeat.ticks(),
                state = %self.machine.confirmed(),
                handshake = self.handshake.is_open(),
                "heartbeat"
            );
        }
        self.queue(self.builder.min_poll());
        true
    }

    /// Report a transport error. Nothing is sent until [`Engine::reopen`];
    /// a fill waiting for the next Busy is dropped.
    pub fn transport_fault(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(%message, "transport fault");
        if self.link == LinkState::Open {
            self.link = LinkState::Faulted;
        }
        if self.sale.take_deferred_authorize() {
            warn!("deferred AUTHORIZE dropped");
        }
        self.outbox.clear();
        self.emit(EngineEvent::TransportFault(message));
    }

    /// Close the link. Idempotent.
    ///
    /// The handshake gate closes and buffered input and output are dropped;
    /// later input is reported and ignored.
    pub fn close(&mut self) {
        if self.link == LinkState::Closed {
            return;
        }
        self.link = LinkState::Closed;
        self.handshake.reset();
        self.parser.clear();
        self.outbox.clear();
        info!("link closed");
        self.emit(EngineEvent::LinkClosed);
    }

    /// Start over on a new or recovered line. The handshake must be
    /// reacquired and the pump state is unknown until its next status.
    /// Counters, the sale window and settings are kept.
    pub fn reopen(&mut self) {
        self.link = LinkState::Open;
        self.handshake.reset();
        self.machine.reset();
        self.parser.clear();
        self.outbox.clear();
        info!("link reopened");
        self.emit(EngineEvent::LinkOpened);
    }

    // ========================================================================
    // Output and queries
    // ========================================================================

    pub fn drain_outbound(&mut self) -> Vec<OutboundFrame> {
        self.outbox.drain(..).collect()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    /// Last state reported by the pump.
    pub fn state(&self) -> PumpState {
        self.machine.confirmed()
    }

    pub fn display_state(&self) -> PumpState {
        self.machine.display()
    }

    pub fn state_machine(&self) -> &PumpStateMachine {
        &self.machine
    }

    pub fn handshake(&self) -> &HandshakeState {
        &self.handshake
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    pub fn sale(&self) -> &SaleWindow {
        &self.sale
    }

    pub fn counters(&self) -> PersistentCounters {
        self.counters
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn nozzle_out(&self) -> bool {
        self.nozzle_out
    }

    pub fn auto_ack(&self) -> bool {
        self.auto_ack
    }

    pub fn crc_order(&self) -> CrcOrder {
        self.builder.crc_order()
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    /// Returns `false`, with a warning event, when the link is not open.
    fn queue(&mut self, frame: OutboundFrame) -> bool {
        if self.link != LinkState::Open {
            warn!(kind = %frame.kind, link = ?self.link, "link down, frame not sent");
            self.emit(EngineEvent::Warning(Warning::NotSent(frame.kind)));
            return false;
        }
        trace!(kind = %frame.kind, frame = %hex_line(frame.as_bytes()), "tx");
        self.trace(Direction::Tx, frame.bytes.clone(), None);
        self.outbox.push_back(frame);
        true
    }

    fn trace(&mut self, direction: Direction, bytes: bytes::Bytes, crc_ok: Option<bool>) {
        if direction == Direction::Rx {
            trace!(frame = %hex_line(&bytes), ?crc_ok, "rx");
        }
        self.emit(EngineEvent::FrameTrace {
            direction,
            bytes,
            crc_ok,
        });
    }

    fn emit(&mut self, event: EngineEvent) {
        self.events.push_back(event);
    }

    fn warn_closed(&mut self) {
        debug!("input after close ignored");
        self.emit(EngineEvent::Warning(Warning::LinkClosed));
    }
}
