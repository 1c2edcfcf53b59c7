//! Events emitted by the engine for its consumer (GUI, CLI, tests).

use bytes::Bytes;
use pumplink_core::PumpState;
use pumplink_protocol::{
    DecodeWarning, FillRecord, NozzleReport, OutboundKind, PumpEvent, StatusOrigin, TotalsReport,
    VolumeSample, hex_line,
};
use std::fmt;

use crate::counters::PersistentCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Rx => f.write_str("RX"),
            Direction::Tx => f.write_str("TX"),
        }
    }
}

/// Why a command was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    /// State-changing command before the pump answered a status.
    HandshakePending,
    /// RESUME while the nozzle is in its holster.
    NozzleStowed,
    /// The link is closed or faulted.
    LinkDown,
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RefusalReason::HandshakePending => f.write_str("no handshake with the pump yet"),
            RefusalReason::NozzleStowed => f.write_str("nozzle is stowed"),
            RefusalReason::LinkDown => f.write_str("link is down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refusal {
    pub command: OutboundKind,
    pub reason: RefusalReason,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} refused: {}", self.command, self.reason)
    }
}

/// Non-fatal diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    Decode(DecodeWarning),
    /// A delimited frame could not be split into fields.
    Frame(String),
    /// Counters advanced in memory but could not be written.
    CounterStore(String),
    /// Input arrived after the link was closed.
    LinkClosed,
    /// A frame the engine produced on its own was dropped with the link down.
    NotSent(OutboundKind),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::Decode(warning) => write!(f, "{warning}"),
            Warning::Frame(message) => write!(f, "frame rejected: {message}"),
            Warning::CounterStore(message) => write!(f, "counters not saved: {message}"),
            Warning::LinkClosed => f.write_str("link closed, input ignored"),
            Warning::NotSent(kind) => write!(f, "{kind} not sent, link is down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Raw frame seen or queued; `crc_ok` is `None` for minimal frames.
    FrameTrace {
        direction: Direction,
        bytes: Bytes,
        crc_ok: Option<bool>,
    },
    HandshakeAcquired,
    StatusChanged {
        from: PumpState,
        to: PumpState,
        origin: StatusOrigin,
    },
    /// Provisional display state after a command.
    IntentApplied(PumpState),
    VolumeSample(VolumeSample),
    Nozzle(NozzleReport),
    Totals(TotalsReport),
    FillRecord(FillRecord),
    PumpEvent(PumpEvent),
    SaleOpened,
    SaleCompleted {
        liters: f64,
        amount: f64,
        counters: PersistentCounters,
    },
    SaleWithoutSample {
        state: PumpState,
    },
    /// The pump fell back to an idle state while an AUTHORIZE was pending.
    AuthorizationFailed {
        state: PumpState,
    },
    /// Preset reached; STOP queued.
    AutoStop {
        liters: f64,
        target_liters: f64,
    },
    Refused(Refusal),
    Warning(Warning),
    TransportFault(String),
    LinkClosed,
    LinkOpened,
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineEvent::FrameTrace {
                direction,
                bytes,
                crc_ok,
            } => {
                write!(f, "{direction} {}", hex_line(bytes))?;
                match crc_ok {
                    Some(true) => f.write_str(" crc=ok"),
                    Some(false) => f.write_str(" crc=BAD"),
                    None => Ok(()),
                }
            }
            EngineEvent::HandshakeAcquired => f.write_str("handshake acquired"),
            EngineEvent::StatusChanged { from, to, .. } => write!(f, "status {from} -> {to}"),
            EngineEvent::IntentApplied(state) => write!(f, "display {state} (pending pump)"),
            EngineEvent::VolumeSample(sample) => {
                write!(f, "volume {:.2} L amount {:.2}", sample.liters, sample.amount)
            }
            EngineEvent::Nozzle(report) => {
                write!(f, "nozzle {}", if report.out { "OUT" } else { "IN" })?;
                if let Some(nozzle) = report.nozzle {
                    write!(f, " #{nozzle}")?;
                }
                if let Some(price) = report.unit_price {
                    write!(f, " price {price:.3}")?;
                }
                Ok(())
            }
            EngineEvent::Totals(totals) => {
                write!(f, "totals {:.2} L", totals.volume_liters)?;
                if let Some(amount) = totals.amount {
                    write!(f, " amount {amount:.2}")?;
                }
                Ok(())
            }
            EngineEvent::FillRecord(fill) => {
                write!(f, "fill record {:.2} L amount {:.2}", fill.liters, fill.amount)
            }
            EngineEvent::PumpEvent(event) => {
                write!(f, "pump event {:?} extra=0x{:02X}", event.code, event.extra)
            }
            EngineEvent::SaleOpened => f.write_str("sale opened"),
            EngineEvent::SaleCompleted {
                liters,
                amount,
                counters,
            } => write!(
                f,
                "sale completed {liters:.2} L amount {amount:.2} (vehicles {}, total {:.2} L)",
                counters.vehicle_count, counters.total_liters
            ),
            EngineEvent::SaleWithoutSample { state } => {
                write!(f, "sale ended in {state} without a volume sample")
            }
            EngineEvent::AuthorizationFailed { state } => {
                write!(f, "authorization failed, pump in {state}")
            }
            EngineEvent::AutoStop {
                liters,
                target_liters,
            } => write!(f, "preset {target_liters:.2} L reached at {liters:.2} L, STOP"),
            EngineEvent::Refused(refusal) => write!(f, "{refusal}"),
            EngineEvent::Warning(warning) => write!(f, "warning: {warning}"),
            EngineEvent::TransportFault(message) => write!(f, "transport fault: {message}"),
            EngineEvent::LinkClosed => f.write_str("link closed"),
            EngineEvent::LinkOpened => f.write_str("link opened"),
        }
    }
}
