use pumplink_engine::CommandError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[cfg(feature = "serial")]
    #[error("cannot open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] pumplink_core::Error),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("session is closed")]
    SessionClosed,

    #[error("session cannot reopen its link")]
    NoConnector,
}
