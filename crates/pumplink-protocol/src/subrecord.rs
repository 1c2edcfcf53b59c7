//! Sub-record walk over composite payloads.
//!
//! A composite payload is a sequence of `(trans, length, data)` triples:
//!
//! ```text
//! [TRANS][LNG][DATA x LNG][TRANS][LNG][DATA x LNG]...
//! ```
//!
//! The walk stops at the first record whose declared length runs past the
//! payload end. A single leftover byte (too short for a header) is reported
//! as trailing data.

use std::fmt;

/// One `(trans, length, data)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRecord<'a> {
    pub trans: u8,
    pub data: &'a [u8],
}

impl SubRecord<'_> {
    /// Declared length; always equal to `data.len()`.
    #[must_use]
    pub fn length(&self) -> u8 {
        // data was sliced using the one-byte length field
        self.data.len() as u8
    }
}

/// Why a walk ended before consuming the whole payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkFault {
    /// A record declared more data than the payload holds.
    Overrun {
        trans: u8,
        length: u8,
        offset: usize,
        available: usize,
    },
    /// Bytes left over that cannot form a record header.
    Trailing { count: usize },
}

impl fmt::Display for WalkFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalkFault::Overrun {
                trans,
                length,
                offset,
                available,
            } => write!(
                f,
                "sub-record trans=0x{trans:02X} len={length} at offset {offset} overruns payload of {available} bytes"
            ),
            WalkFault::Trailing { count } => {
                write!(f, "{count} trailing byte(s) after last sub-record")
            }
        }
    }
}

/// Result of walking a composite payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubRecordWalk<'a> {
    pub records: Vec<SubRecord<'a>>,
    pub fault: Option<WalkFault>,
}

/// Split `payload` into sub-records.
#[must_use]
pub fn walk(payload: &[u8]) -> SubRecordWalk<'_> {
    let n = payload.len();
    let mut records = Vec::new();
    let mut i = 0;

    while i + 2 <= n {
        let trans = payload[i];
        let length = payload[i + 1];
        let end = i + 2 + usize::from(length);
        if end > n {
            return SubRecordWalk {
                records,
                fault: Some(WalkFault::Overrun {
                    trans,
                    length,
                    offset: i,
                    available: n,
                }),
            };
        }
        records.push(SubRecord {
            trans,
            data: &payload[i + 2..end],
        });
        i = end;
    }

    let fault = (i != n).then_some(WalkFault::Trailing { count: n - i });
    SubRecordWalk { records, fault }
}
