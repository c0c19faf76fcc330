//! Yaz0-style sliding window codec (comp_type 2, 3 and 4).
//!
//! Payload layout:
//! ```text
//! u32 decoded_size (BE)
//! repeat: u32 mask (BE), then 32 units selected MSB first
//!   bit set   → one literal byte
//!   bit clear → u16 `LDDD`: distance D+1 (12 bits), length L+2 (4 bits);
//!               L == 0 means a third byte follows and length = byte + 0x12
//! ```
//! A back-reference that reaches before the start of the output yields
//! zero bytes.

use super::Decoded;
use crate::bytes::{be16_at, be32_at, byte_at};

/// Search window behind the current position.
pub const WINDOW: usize = 0x1000;
/// Longest run a single unit can encode.
pub const MAX_RUN: usize = 0xFF + 0x12;
/// Runs at least this long use the three-byte form.
const LONG_RUN: usize = 0x12;
/// Shortest run worth a back-reference.
const MIN_RUN: usize = 3;

pub fn decode(src: &[u8], raw_size: usize) -> Decoded {
    let mut pos  = 4usize; // embedded decoded size, already known from the block header
    let mut out  = Vec::with_capacity(raw_size);
    let mut mask = 0u32;
    let mut bits = 0u32;

    while out.len() < raw_size {
        if bits == 0 {
            mask = be32_at(src, pos);
            pos += 4;
            bits = 32;
        }
        if mask & 0x8000_0000 != 0 {
            out.push(byte_at(src, pos));
            pos += 1;
        } else {
            let word = usize::from(be16_at(src, pos));
            pos += 2;
            let distance = (word & 0xFFF) + 1;
            let len = match word >> 12 {
                0 => {
                    let extra = usize::from(byte_at(src, pos));
                    pos += 1;
                    extra + LONG_RUN
                }
                n => n + 2,
            };
            for _ in 0..len {
                if out.len() == raw_size {
                    break;
                }
                let b = if distance > out.len() { 0 } else { out[out.len() - distance] };
                out.push(b);
            }
        }
        mask <<= 1;
        bits -= 1;
    }

    Decoded { data: out, consumed: pos }
}

// ── Encoder ──────────────────────────────────────────────────────────────────

/// Longest match for `pos` within the preceding window, as `(len, at)`.
/// Two-byte matches are reported as length 1; they never pay off.
fn longest_match(src: &[u8], pos: usize) -> (usize, usize) {
    let start = pos.saturating_sub(WINDOW);
    let limit = (src.len() - pos.min(src.len())).min(MAX_RUN);
    let mut best_len = 1;
    let mut best_at  = 0;

    for i in start..pos {
        let mut j = 0;
        while j < limit && src[i + j] == src[pos + j] {
            j += 1;
        }
        if j > best_len {
            best_len = j;
            best_at  = i;
            if j == limit {
                break;
            }
        }
    }
    if best_len == 2 {
        best_len = 1;
    }
    (best_len, best_at)
}

/// Match finder with one step of lookahead: when the next position has a
/// match at least two bytes longer, the current byte goes out as a literal
/// and the better match is used on the following call.
#[derive(Default)]
struct Lookahead {
    pending: Option<(usize, usize)>,
}

impl Lookahead {
    fn next(&mut self, src: &[u8], pos: usize) -> (usize, usize) {
        if let Some(found) = self.pending.take() {
            return found;
        }
        let (len, at) = longest_match(src, pos);
        if len >= MIN_RUN {
            let (next_len, next_at) = longest_match(src, pos + 1);
            if next_len >= len + 2 {
                self.pending = Some((next_len, next_at));
                return (1, at);
            }
        }
        (len, at)
    }
}

pub fn encode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() + src.len() / 8 + 8);
    out.extend_from_slice(&(src.len() as u32).to_be_bytes());

    let mut finder = Lookahead::default();
    let mut group  = Vec::with_capacity(32 * 3);
    let mut mask   = 0u32;
    let mut units  = 0u32;
    let mut pos    = 0usize;

    while pos < src.len() {
        let (len, at) = finder.next(src, pos);
        if len < MIN_RUN {
            group.push(src[pos]);
            mask |= 0x8000_0000 >> units;
            pos += 1;
        } else {
            let distance = pos - at - 1;
            if len >= LONG_RUN {
                let len = len.min(MAX_RUN);
                group.push((distance >> 8) as u8);
                group.push(distance as u8);
                group.push((len - LONG_RUN) as u8);
                pos += len;
            } else {
                group.push((((len - 2) << 4) | (distance >> 8)) as u8);
                group.push(distance as u8);
                pos += len;
            }
        }
        units += 1;
        if units == 32 {
            out.extend_from_slice(&mask.to_be_bytes());
            out.append(&mut group);
            mask  = 0;
            units = 0;
        }
    }
    if units > 0 {
        out.extend_from_slice(&mask.to_be_bytes());
        out.append(&mut group);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_reference_before_start_is_zero() {
        // size word, mask with first unit a reference, distance 5 len 3.
        let payload = [0, 0, 0, 3, 0x00, 0, 0, 0, 0x10, 0x04];
        let out = decode(&payload, 3);
        assert_eq!(out.data, vec![0, 0, 0]);
        assert_eq!(out.consumed, 10);
    }

    #[test]
    fn long_run_uses_three_bytes() {
        let data = vec![0x42u8; 0x12 + 1];
        let packed = encode(&data);
        // size + mask + literal + 3-byte reference
        assert_eq!(packed.len(), 4 + 4 + 1 + 3);
        assert_eq!(packed[8], 0x42);
        assert_eq!(&packed[9..12], &[0x00, 0x00, 0x00]);
        assert_eq!(decode(&packed, data.len()).data, data);
    }

    #[test]
    fn short_run_uses_two_bytes() {
        let mut data = vec![1u8, 2, 3, 4];
        data.extend_from_slice(&[1, 2, 3, 4]);
        let packed = encode(&data);
        // four literals then (len 4 → nibble 2, distance 3)
        assert_eq!(&packed[4..8], &0xF000_0000u32.to_be_bytes());
        assert_eq!(&packed[12..14], &[0x20, 0x03]);
        assert_eq!(decode(&packed, data.len()).data, data);
    }

    #[test]
    fn runs_longer_than_one_unit() {
        let data = vec![9u8; MAX_RUN * 3 + 5];
        let packed = encode(&data);
        let out = decode(&packed, data.len());
        assert_eq!(out.data, data);
        assert_eq!(out.consumed, packed.len());
    }

    #[test]
    fn empty_input_carries_size_word_only() {
        let packed = encode(&[]);
        assert_eq!(packed, vec![0, 0, 0, 0]);
        assert_eq!(decode(&packed, 0).consumed, 4);
    }
}
