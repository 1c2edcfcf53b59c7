//! Operator line commands (stdin in `run`, arguments in `encode`).

use pumplink_core::CrcOrder;
use pumplink_protocol::PumpCommand;
use pumplink_transport::SessionCommand;
use std::time::Duration;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  auth | stop | pause | resume | off    pump commands
  status | info                         status / filling information request
  cmd <code>                            raw command code (decimal or 0x..)
  fill                                  free fill, AUTHORIZE on next busy
  preset <liters>                       preset fill, auto-stop at target
  cd3 <liters>                          preset-volume frame only
  totals | poll | ack                   totals request, minimal poll / ack
  crc lohi|hilo                         CRC byte order
  autoack on|off                        automatic ack of valid frames
  autopoll on|off [ms]                  heartbeat poll
  reopen                                reconnect the line after a fault
  help | quit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineCommand {
    Session(SessionCommand),
    Reopen,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LineError {
    #[error("empty line")]
    Empty,

    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),

    #[error("{command} needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },

    #[error("invalid {what}: {value:?}")]
    InvalidArgument { what: &'static str, value: String },
}

pub fn parse_line(line: &str) -> Result<LineCommand, LineError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(LineError::Empty);
    };
    let arg = words.next();

    let session = |command| -> Result<LineCommand, LineError> { Ok(LineCommand::Session(command)) };
    let pump = |command| session(SessionCommand::Command(command));

    match head.to_ascii_lowercase().as_str() {
        "auth" | "authorize" => pump(PumpCommand::Authorize),
        "stop" => pump(PumpCommand::Stop),
        "pause" => pump(PumpCommand::Pause),
        "resume" => pump(PumpCommand::Resume),
        "off" => pump(PumpCommand::SwitchOff),
        "status" => pump(PumpCommand::ReturnStatus),
        "info" => pump(PumpCommand::ReturnFillInfo),
        "cmd" => {
            let code = required(arg, "cmd", "a command code")?;
            session(SessionCommand::Generic(parse_code(code)?))
        }
        "fill" => session(SessionCommand::StartFill(None)),
        "preset" => {
            let liters = parse_liters(required(arg, "preset", "a volume in liters")?)?;
            session(SessionCommand::StartFill(Some(liters)))
        }
        "cd3" => {
            let liters = parse_liters(required(arg, "cd3", "a volume in liters")?)?;
            session(SessionCommand::PresetVolume(liters))
        }
        "totals" => session(SessionCommand::TotalsRequest),
        "poll" => session(SessionCommand::MinPoll),
        "ack" => session(SessionCommand::MinAck),
        "crc" => {
            let value = required(arg, "crc", "lohi or hilo")?;
            let order = value.parse::<CrcOrder>().map_err(|_| invalid("CRC order", value))?;
            session(SessionCommand::SetCrcOrder(order))
        }
        "autoack" => {
            let enabled = parse_switch(required(arg, "autoack", "on or off")?)?;
            session(SessionCommand::SetAutoAck(enabled))
        }
        "autopoll" => {
            let enabled = parse_switch(required(arg, "autopoll", "on or off")?)?;
            let interval = match words.next() {
                Some(ms) => ms.parse::<u64>().map_err(|_| invalid("interval", ms))?,
                None => pumplink_core::constants::DEFAULT_POLL_INTERVAL_MS,
            };
            session(SessionCommand::SetAutoPoll {
                enabled,
                interval: Duration::from_millis(interval),
            })
        }
        "reopen" => Ok(LineCommand::Reopen),
        "help" | "?" => Ok(LineCommand::Help),
        "quit" | "exit" => Ok(LineCommand::Quit),
        _ => Err(LineError::Unknown(head.to_string())),
    }
}

fn required<'a>(
    arg: Option<&'a str>,
    command: &'static str,
    what: &'static str,
) -> Result<&'a str, LineError> {
    arg.ok_or(LineError::MissingArgument { command, what })
}

fn invalid(what: &'static str, value: &str) -> LineError {
    LineError::InvalidArgument {
        what,
        value: value.to_string(),
    }
}

fn parse_code(value: &str) -> Result<u8, LineError> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| invalid("command code", value))
}

/// Accepts a decimal comma as well as a point.
fn parse_liters(value: &str) -> Result<f64, LineError> {
    value
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|liters| liters.is_finite())
        .ok_or_else(|| invalid("volume", value))
}

fn parse_switch(value: &str) -> Result<bool, LineError> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => Err(invalid("switch", value)),
    }
}
