//! Subcommands that never open a line.

use anyhow::{Context, Result, bail};
use pumplink_protocol::{
    CommandBuilder, Frame, OutboundFrame, StreamParser, decode as decode_frame, hex_line,
    parse_hex,
};
use pumplink_transport::{SessionCommand, available_ports};
use std::io::{self, BufRead};

use crate::cli::{DecodeArgs, EncodeArgs};
use crate::config::AppConfig;
use crate::line::{LineCommand, parse_line};

/// Build the frame for one command line and render it as hex.
pub fn encode(config: &AppConfig, args: &EncodeArgs) -> Result<String> {
    let builder = CommandBuilder::new(config.engine.address)
        .with_nozzle(config.engine.nozzle)
        .with_crc_order(args.crc.unwrap_or(config.engine.crc_order));

    let line = args.words.join(" ");
    let LineCommand::Session(command) = parse_line(&line)? else {
        bail!("{line:?} does not produce a frame");
    };
    let frame = frame_for(&builder, command)?;
    Ok(format!("{}  {}", hex_line(frame.as_bytes()), frame.kind))
}

fn frame_for(builder: &CommandBuilder, command: SessionCommand) -> Result<OutboundFrame> {
    Ok(match command {
        SessionCommand::Command(command) => builder.command(command),
        SessionCommand::Generic(code) => builder.generic(code),
        SessionCommand::StartFill(Some(liters)) | SessionCommand::PresetVolume(liters) => {
            builder.preset_volume(liters)?
        }
        SessionCommand::TotalsRequest => builder.totals_request(),
        SessionCommand::MinPoll => builder.min_poll(),
        SessionCommand::MinAck => builder.min_ack(),
        other => bail!("{other:?} is a session setting, not a frame"),
    })
}

/// Decode hex captures: arguments if given, otherwise stdin lines.
pub fn decode(config: &AppConfig, args: &DecodeArgs) -> Result<()> {
    let order = args.crc.unwrap_or(config.engine.crc_order);
    let mut parser = StreamParser::new();

    let inputs: Vec<String> = if args.hex.is_empty() {
        io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<_>>()
            .context("cannot read stdin")?
    } else {
        args.hex.clone()
    };

    for input in &inputs {
        let bytes = parse_hex(input).with_context(|| format!("bad capture {input:?}"))?;
        parser.feed(&bytes);
        while let Some(raw) = parser.next_frame() {
            let hex = raw.to_string();
            let frame = match Frame::from_raw(raw, order) {
                Ok(frame) => frame,
                Err(err) => {
                    println!("{hex}  rejected: {err}");
                    continue;
                }
            };
            let decoded = decode_frame(&frame);
            let crc = match decoded.crc_ok {
                Some(true) => " crc=ok",
                Some(false) => " crc=BAD",
                None => "",
            };
            match decoded.kind {
                Some(kind) => println!("{hex}{crc}  {kind:?}"),
                None => println!("{hex}{crc}"),
            }
            for record in &decoded.records {
                if args.json {
                    println!("  {}", serde_json::to_string(record)?);
                } else {
                    println!("  {record:?}");
                }
            }
            for warning in &decoded.warnings {
                println!("  warning: {warning}");
            }
        }
    }

    if parser.buffered_len() > 0 {
        println!("({} trailing bytes without a complete frame)", parser.buffered_len());
    }
    Ok(())
}

pub fn list_ports() -> Result<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        println!("{}  {:?}", port.port_name, port.port_type);
    }
    Ok(())
}
