//! Line transport and the processing session for one pump.
//!
//! Two activities run per link:
//!
//! ```text
//! serial port / async stream
//!     │
//!     └─> reader (thread or task) ──PumpCodec──> mpsc<LinkInput>
//!                                                   │
//!                  SessionHandle ──commands──> Session ──> Engine
//!                                                   │
//!                                  FrameWriter <────┘ (outbound queue)
//! ```
//!
//! The reader only delimits frames. All engine state is owned by the
//! [`Session`] task, which also drives the heartbeat timer, so decoding,
//! auto-ack, auto-stop and heartbeat polls are written in one order. A
//! session with a [`Connector`] can swap in a new link after a fault.

mod config;
mod error;
mod link;
#[cfg(feature = "serial")]
mod serial;
mod session;
mod stream;

pub use config::{Parity, SerialConfig, StopBits};
pub use error::{Result, TransportError};
pub use link::{FrameWriter, Link, LinkInput, ReaderHandle};
#[cfg(feature = "serial")]
pub use serial::{SerialWriter, available_ports, open_serial};
pub use session::{ConnectFuture, Connector, Session, SessionCommand, SessionHandle};
pub use stream::{StreamWriter, connect_stream};
