//! Protocol engine for a single dispenser.
//!
//! Everything between decoded frames and outbound commands lives here:
//! pump state, handshake gate, sale/preset tracking and the persisted sale
//! counters. The crate does no I/O of its own apart from the optional JSON
//! counter file.

pub mod config;
pub mod counters;
pub mod engine;
pub mod events;
pub mod handshake;
pub mod sale;
pub mod state_machine;

pub use config::EngineConfig;
pub use counters::{
    CounterStore, CounterStoreError, JsonFileCounterStore, MemoryCounterStore, PersistentCounters,
};
pub use engine::{CommandError, Engine, LinkState};
pub use events::{Direction, EngineEvent, Refusal, RefusalReason, Warning};
pub use handshake::{HandshakeState, Heartbeat};
pub use sale::{SaleOutcome, SaleWindow};
pub use state_machine::{PumpStateMachine, StateTransition};
