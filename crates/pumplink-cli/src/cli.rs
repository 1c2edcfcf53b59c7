use clap::{Args, Parser, Subcommand, ValueEnum};
use pumplink_core::{CrcOrder, PumpAddress};
use pumplink_transport::{Parity, StopBits};
use std::path::PathBuf;

/// Dispenser line controller.
#[derive(Parser, Debug)]
#[command(name = "pumplink", version)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the line and accept commands on stdin.
    Run(RunArgs),
    /// Print the frame for a command as hex.
    Encode(EncodeArgs),
    /// Decode captured frames given as hex (arguments or stdin lines).
    Decode(DecodeArgs),
    /// List serial ports.
    Ports,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Serial port, e.g. /dev/ttyUSB0 or COM3.
    #[arg(short, long)]
    pub port: Option<String>,

    /// Connect to a TCP serial bridge instead of a local port.
    #[arg(long, conflicts_with = "port")]
    pub tcp: Option<String>,

    #[arg(short, long)]
    pub baud: Option<u32>,

    #[arg(long, value_enum)]
    pub parity: Option<ParityArg>,

    #[arg(long, value_enum)]
    pub stop_bits: Option<StopBitsArg>,

    /// Pump address, decimal or 0x-prefixed hex.
    #[arg(long)]
    pub address: Option<PumpAddress>,

    #[arg(long)]
    pub nozzle: Option<u8>,

    /// CRC byte order: lohi or hilo.
    #[arg(long)]
    pub crc: Option<CrcOrder>,

    /// Poll the pump on every heartbeat tick.
    #[arg(long)]
    pub auto_poll: bool,

    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Do not ack valid frames automatically.
    #[arg(long)]
    pub no_auto_ack: bool,

    /// Counter file (default counters.json).
    #[arg(long)]
    pub counters: Option<PathBuf>,

    /// Print every RX/TX frame.
    #[arg(long)]
    pub trace: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Command words, e.g. `auth` or `preset 8.5`.
    #[arg(required = true, num_args = 1..)]
    pub words: Vec<String>,

    #[arg(long)]
    pub crc: Option<CrcOrder>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes; separators are ignored. Reads stdin when empty.
    pub hex: Vec<String>,

    #[arg(long)]
    pub crc: Option<CrcOrder>,

    /// One JSON object per record.
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

impl From<ParityArg> for Parity {
    fn from(parity: ParityArg) -> Self {
        match parity {
            ParityArg::None => Parity::None,
            ParityArg::Even => Parity::Even,
            ParityArg::Odd => Parity::Odd,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StopBitsArg {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

impl From<StopBitsArg> for StopBits {
    fn from(stop_bits: StopBitsArg) -> Self {
        match stop_bits {
            StopBitsArg::One => StopBits::One,
            StopBitsArg::Two => StopBits::Two,
        }
    }
}
