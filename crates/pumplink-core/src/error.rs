use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Framing errors
    #[error("Frame too short: {len} bytes (minimum {min})")]
    FrameTooShort { len: usize, min: usize },

    #[error("Frame too large: {size} bytes (maximum {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    // Encoding errors
    #[error("Invalid command code: {0}")]
    InvalidCommandCode(String),

    #[error("Invalid pump address: {0}")]
    InvalidAddress(String),

    #[error("Invalid nozzle number: {0}")]
    InvalidNozzle(String),

    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
