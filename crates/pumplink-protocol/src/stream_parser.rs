//! Stream parser for the two frame shapes seen on the dispenser line.
//!
//! Bytes arrive from a half-duplex serial link in arbitrary chunks. The
//! parser accumulates them and cuts frames at trailer bytes (`0xFA`).
//!
//! # Frame Delimiting
//!
//! The trailer byte closes both frame shapes, so a trailer alone does not
//! prove a frame ended. For each trailer position, in order, the prefix up
//! to and including it is a candidate:
//!
//! ```text
//! Long  candidate: ETX (0x03) somewhere before the trailer, length >= 7
//! Short candidate: exactly 3 bytes, first byte 0x50
//! ```
//!
//! The long shape is tested first. The first candidate that matches is cut
//! from the buffer and queued. When no candidate matches, the buffer is left
//! untouched: the trailer was line noise, a CRC byte, or part of a frame
//! still arriving.
//!
//! Every decision depends only on the bytes seen so far, so splitting the
//! same stream into different chunks yields the same frames.
//!
//! # Usage
//!
//! ```
//! use pumplink_protocol::{FrameShape, StreamParser};
//!
//! let mut parser = StreamParser::new();
//!
//! parser.feed(&[0x50, 0x20]);
//! assert!(parser.next_frame().is_none());
//!
//! parser.feed(&[0xFA, 0x50, 0x70, 0xFA]);
//! assert_eq!(parser.frames_available(), 2);
//!
//! let poll = parser.next_frame().unwrap();
//! assert_eq!(poll.shape(), FrameShape::Short);
//! assert_eq!(poll.as_bytes(), &[0x50, 0x20, 0xFA]);
//! ```

use bytes::BytesMut;
use pumplink_core::constants::{
    ETX_BYTE, MIN_FRAME_PREFIX, MIN_LONG_CANDIDATE_LEN, SHORT_FRAME_LEN, TRAILER_BYTE,
};
use std::collections::VecDeque;

use crate::frame::{FrameShape, RawFrame};

/// Upper bound on undelimited bytes kept in the buffer.
///
/// Frames on this line are a few dozen bytes. A buffer this large means the
/// head of the stream can never complete a frame, so it is discarded.
pub const MAX_BUFFER_SIZE: usize = 4 * 1024;

/// Initial buffer capacity for incoming serial data.
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Initial capacity for the frame queue.
const INITIAL_FRAME_QUEUE_CAPACITY: usize = 4;

/// Stateful stream parser producing [`RawFrame`]s.
#[derive(Debug)]
pub struct StreamParser {
    /// Bytes not yet cut into frames.
    buffer: BytesMut,

    /// Complete frames ready for extraction.
    frames: VecDeque<RawFrame>,

    /// Number of buffers discarded for exceeding [`MAX_BUFFER_SIZE`].
    overflows: u64,
}

impl StreamParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            frames: VecDeque::with_capacity(INITIAL_FRAME_QUEUE_CAPACITY),
            overflows: 0,
        }
    }

    /// Append bytes from the transport and extract every complete frame.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        while self.try_extract_frame() {}

        if self.buffer.len() > MAX_BUFFER_SIZE {
            tracing::warn!(
                discarded = self.buffer.len(),
                "no frame delimited within {MAX_BUFFER_SIZE} bytes, discarding buffer"
            );
            self.buffer.clear();
            self.overflows += 1;
        }
    }

    /// Next complete frame, if any.
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        self.frames.pop_front()
    }

    /// Number of frames ready for extraction.
    pub fn frames_available(&self) -> usize {
        self.frames.len()
    }

    /// Bytes waiting for a trailer that completes a shape.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Times the buffer was discarded for growing past [`MAX_BUFFER_SIZE`].
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    /// Discard buffered bytes and queued frames.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.frames.clear();
    }

    /// Iterator draining the currently queued frames.
    ///
    /// Does not parse more data; call [`feed()`] first.
    ///
    /// [`feed()`]: StreamParser::feed
    pub fn drain_frames(&mut self) -> DrainFrames<'_> {
        DrainFrames { parser: self }
    }

    /// Cut the first matching candidate from the buffer.
    ///
    /// Returns `true` if a frame was queued.
    fn try_extract_frame(&mut self) -> bool {
        let matched = self
            .buffer
            .iter()
            .enumerate()
            .filter(|&(_, &byte)| byte == TRAILER_BYTE)
            .find_map(|(pos, _)| classify(&self.buffer[..=pos]).map(|shape| (pos, shape)));

        match matched {
            Some((pos, shape)) => {
                let bytes = self.buffer.split_to(pos + 1).freeze();
                self.frames.push_back(RawFrame::new(shape, bytes));
                true
            }
            None => false,
        }
    }
}

/// Shape of a candidate ending in a trailer byte, if any.
fn classify(candidate: &[u8]) -> Option<FrameShape> {
    let body = &candidate[..candidate.len() - 1];
    if candidate.len() >= MIN_LONG_CANDIDATE_LEN && body.contains(&ETX_BYTE) {
        return Some(FrameShape::Long);
    }
    if candidate.len() == SHORT_FRAME_LEN && candidate[0] == MIN_FRAME_PREFIX {
        return Some(FrameShape::Short);
    }
    None
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over queued frames, see [`StreamParser::drain_frames`].
#[derive(Debug)]
pub struct DrainFrames<'a> {
    parser: &'a mut StreamParser,
}

impl Iterator for DrainFrames<'_> {
    type Item = RawFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.parser.frames_available();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DrainFrames<'_> {}
