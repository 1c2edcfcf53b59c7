//! Tokio codec for the dispenser line.
//!
//! [`PumpCodec`] wraps the [`StreamParser`] so a serial port (or any
//! `AsyncRead + AsyncWrite`) can be driven through `tokio_util`'s
//! `FramedRead`/`FramedWrite`:
//!
//! ```text
//! bytes -> Decoder -> RawFrame
//! OutboundFrame -> Encoder -> bytes
//! ```
//!
//! Decoding yields [`RawFrame`]s rather than typed frames: the CRC byte
//! order is a runtime setting owned by the engine, and a frame with a bad
//! CRC must still reach it to be reported.
//!
//! # Usage
//!
//! ```rust,no_run
//! use futures::{SinkExt, StreamExt};
//! use pumplink_core::PumpAddress;
//! use pumplink_protocol::{CommandBuilder, PumpCodec, PumpCommand};
//! use tokio_util::codec::Framed;
//!
//! # async fn example(port: tokio::io::DuplexStream) -> pumplink_core::Result<()> {
//! let mut framed = Framed::new(port, PumpCodec::new());
//! let builder = CommandBuilder::new(PumpAddress::default());
//!
//! framed.send(builder.command(PumpCommand::ReturnStatus)).await?;
//! if let Some(frame) = framed.next().await {
//!     println!("received {}", frame?);
//! }
//! # Ok(())
//! # }
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::builder::OutboundFrame;
use crate::frame::RawFrame;
use crate::stream_parser::StreamParser;
use pumplink_core::{Error, Result};

/// Default maximum frame size in bytes.
///
/// The longest frames on this line (totals blocks) are well under 64 bytes.
const DEFAULT_MAX_FRAME_SIZE: usize = 256;

#[derive(Debug)]
pub struct PumpCodec {
    parser: StreamParser,

    /// Frames exceeding this size are rejected in both directions.
    max_frame_size: usize,
}

impl PumpCodec {
    pub fn new() -> Self {
        Self {
            parser: StreamParser::new(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            parser: StreamParser::new(),
            max_frame_size,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Bytes held by the parser waiting for a trailer.
    pub fn buffered_len(&self) -> usize {
        self.parser.buffered_len()
    }
}

impl Default for PumpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PumpCodec {
    type Item = RawFrame;
    type Error = Error;

    /// # Errors
    /// Returns `Error::FrameTooLarge` if a delimited frame exceeds
    /// `max_frame_size`. The oversized frame is dropped; decoding can
    /// continue with the next call.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            // all bytes now live in the parser's buffer
            self.parser.feed(src);
            src.clear();
        }

        match self.parser.next_frame() {
            Some(frame) if frame.len() > self.max_frame_size => Err(Error::FrameTooLarge {
                size: frame.len(),
                max_size: self.max_frame_size,
            }),
            other => Ok(other),
        }
    }
}

impl Encoder<OutboundFrame> for PumpCodec {
    type Error = Error;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> Result<()> {
        if item.bytes.len() > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: item.bytes.len(),
                max_size: self.max_frame_size,
            });
        }
        dst.extend_from_slice(&item.bytes);
        Ok(())
    }
}
