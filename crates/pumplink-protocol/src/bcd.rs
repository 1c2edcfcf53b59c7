//! Packed BCD fields.
//!
//! Each byte carries two decimal digits, high nibble first. Nibbles above 9
//! decode as digit 0 instead of failing, so a noisy field yields a wrong
//! number rather than aborting the frame.

use pumplink_core::constants::BCD4_MAX;

fn decode_digits(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &byte| {
        let hi = (byte >> 4) & 0x0F;
        let lo = byte & 0x0F;
        let hi = if hi < 10 { hi } else { 0 };
        let lo = if lo < 10 { lo } else { 0 };
        acc * 100 + u64::from(hi) * 10 + u64::from(lo)
    })
}

/// Decode an 8-digit field.
#[must_use]
pub fn decode4(bytes: [u8; 4]) -> u32 {
    // 8 digits always fit in u32
    decode_digits(&bytes) as u32
}

/// Decode a 10-digit field.
#[must_use]
pub fn decode5(bytes: [u8; 5]) -> u64 {
    decode_digits(&bytes)
}

/// Encode `value` as 8 digits, clamped to `0..=99_999_999`.
#[must_use]
pub fn encode4(value: i64) -> [u8; 4] {
    let mut rest = value.clamp(0, i64::from(BCD4_MAX)) as u32;
    let mut out = [0u8; 4];
    for slot in out.iter_mut().rev() {
        let lo = (rest % 10) as u8;
        rest /= 10;
        let hi = (rest % 10) as u8;
        rest /= 10;
        *slot = (hi << 4) | lo;
    }
    out
}

/// Decode a 4-byte field from `data` at `offset`, if long enough.
pub(crate) fn read4(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(decode4([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a 5-byte field from `data` at `offset`, if long enough.
pub(crate) fn read5(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 5)?;
    Some(decode5([bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]))
}
