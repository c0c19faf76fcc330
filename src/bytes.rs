//! Lenient big-endian reads over a byte slice.
//!
//! Every read past the end of the slice yields zero bytes instead of
//! failing.  Truncated ROM images are decoded this way on purpose; callers
//! that need hard bounds check them against the slice length themselves.

use byteorder::{BigEndian, ByteOrder};

#[inline]
pub fn byte_at(src: &[u8], offset: usize) -> u8 {
    src.get(offset).copied().unwrap_or(0)
}

#[inline]
pub fn be16_at(src: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&window::<2>(src, offset))
}

#[inline]
pub fn be32_at(src: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&window::<4>(src, offset))
}

/// Copy `len` bytes starting at `offset`, zero-filling whatever lies past
/// the end of `src`.
pub fn range_at(src: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if offset < src.len() {
        let avail = (src.len() - offset).min(len);
        out[..avail].copy_from_slice(&src[offset..offset + avail]);
    }
    out
}

/// The tail of `src` from `offset`, empty when `offset` is past the end.
#[inline]
pub fn tail(src: &[u8], offset: usize) -> &[u8] {
    src.get(offset..).unwrap_or(&[])
}

fn window<const N: usize>(src: &[u8], offset: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    for (i, b) in buf.iter_mut().enumerate() {
        *b = byte_at(src, offset.saturating_add(i));
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_past_end_are_zero() {
        let data = [0x12, 0x34, 0x56];
        assert_eq!(be16_at(&data, 0), 0x1234);
        assert_eq!(be32_at(&data, 0), 0x1234_5600);
        assert_eq!(be32_at(&data, 10), 0);
        assert_eq!(byte_at(&data, usize::MAX), 0);
    }

    #[test]
    fn range_zero_fills() {
        let data = [1, 2, 3];
        assert_eq!(range_at(&data, 1, 4), vec![2, 3, 0, 0]);
        assert_eq!(range_at(&data, 8, 2), vec![0, 0]);
        assert!(tail(&data, 5).is_empty());
    }
}
