//! Byte run-length codec (comp_type 5).
//!
//! Records:
//! ```text
//! n < 0x80 : n, value        → value repeated n times
//! n ≥ 0x80 : n, bytes[n-0x80] → bytes copied verbatim
//! ```

use super::Decoded;
use crate::bytes::byte_at;

/// Longest run either record kind can describe.
pub const MAX_RUN: usize = 0x7F;
const LITERAL: u8 = 0x80;

pub fn decode(src: &[u8], raw_size: usize) -> Decoded {
    let mut out = Vec::with_capacity(raw_size);
    let mut pos = 0usize;

    while out.len() < raw_size {
        let before = out.len();
        let n = byte_at(src, pos);
        pos += 1;
        if n < LITERAL {
            let value = byte_at(src, pos);
            pos += 1;
            let take = usize::from(n).min(raw_size - out.len());
            out.resize(out.len() + take, value);
        } else {
            for _ in 0..(n - LITERAL) {
                if out.len() == raw_size {
                    break;
                }
                out.push(byte_at(src, pos));
                pos += 1;
            }
        }
        // Only empty records remain once the input is exhausted.
        if out.len() == before && pos >= src.len() {
            out.resize(raw_size, 0);
        }
    }

    Decoded { data: out, consumed: pos }
}

/// Repeat records for runs of two or more equal bytes, literal records for
/// stretches of differing bytes.  The final byte goes out as a one-byte
/// literal unless a repeat record already covered it.
pub fn encode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() + src.len() / MAX_RUN + 2);
    let Some(last) = src.len().checked_sub(1) else {
        return out;
    };

    let mut pos = 0usize;
    while pos < last {
        if src[pos] == src[pos + 1] {
            let mut run = 2;
            while run < MAX_RUN && pos + run < src.len() && src[pos + run] == src[pos] {
                run += 1;
            }
            out.push(run as u8);
            out.push(src[pos]);
            pos += run;
        } else {
            let mut run = 1;
            while run < MAX_RUN && pos + run < last && src[pos + run] != src[pos + run + 1] {
                run += 1;
            }
            out.push(LITERAL | run as u8);
            out.extend_from_slice(&src[pos..pos + run]);
            pos += run;
        }
    }
    if pos == last {
        out.push(LITERAL | 1);
        out.push(src[last]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_hundred_repeats() {
        let data = vec![0xAAu8; 200];
        let packed = encode(&data);
        assert_eq!(packed, vec![0x7F, 0xAA, 0x49, 0xAA]);
        assert_eq!(decode(&packed, 200).data, data);
    }

    #[test]
    fn trailing_byte_is_a_literal() {
        assert_eq!(encode(&[7]), vec![0x81, 7]);
        assert_eq!(encode(&[1, 2, 3]), vec![0x82, 1, 2, 0x81, 3]);
        assert_eq!(encode(&[1, 2, 2]), vec![0x81, 1, 0x02, 2]);
    }

    #[test]
    fn literal_runs_split_at_limit() {
        let data: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let packed = encode(&data);
        assert_eq!(packed[0], 0x80 | 0x7F);
        assert_eq!(decode(&packed, data.len()).data, data);
    }

    #[test]
    fn exhausted_input_zero_fills() {
        let out = decode(&[0x02, 0x09], 5);
        assert_eq!(out.data, vec![9, 9, 0, 0, 0]);
    }

    #[test]
    fn empty() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[], 0).data.is_empty());
    }
}
