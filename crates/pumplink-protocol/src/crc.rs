//! CRC16 used by long frames.
//!
//! Reflected polynomial `0xA001`, processed LSB-first, initial value `0x0000`
//! and no final XOR. This is the catalogued CRC-16/ARC algorithm, computed
//! bit-serially without a lookup table.
//!
//! The checksum covers every byte of a long frame before the two CRC bytes
//! (address, command, header and payload). How the two bytes are laid out on
//! the wire is decided by [`CrcOrder`].
//!
//! # Example
//!
//! ```
//! use pumplink_core::CrcOrder;
//! use pumplink_protocol::crc;
//!
//! // Field capture of a totals request: 51 3C 65 01 02 | 61 D2 | 03 FA
//! let value = crc::crc16(&[0x51, 0x3C, 0x65, 0x01, 0x02]);
//! assert_eq!(value, 0xD261);
//! assert_eq!(CrcOrder::LoHi.split(value), [0x61, 0xD2]);
//! ```

use pumplink_core::CrcOrder;
use pumplink_core::constants::CRC_POLY;

/// Compute the CRC over `bytes` starting from `init`.
#[must_use]
pub const fn compute(bytes: &[u8], init: u16) -> u16 {
    let mut crc = init;
    let mut i = 0;
    while i < bytes.len() {
        crc ^= bytes[i] as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        i += 1;
    }
    crc
}

/// Compute the CRC with the protocol's initial value of zero.
#[must_use]
pub const fn crc16(bytes: &[u8]) -> u16 {
    compute(bytes, 0x0000)
}

/// Append the CRC of everything already in `buf`, in wire order.
pub fn append(buf: &mut Vec<u8>, order: CrcOrder) {
    let value = crc16(buf);
    buf.extend_from_slice(&order.split(value));
}
