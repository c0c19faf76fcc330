//! LZSS with a 1 KiB ring buffer (comp_type 1).
//!
//! Stream layout: a flag byte announces the next eight units, least
//! significant bit first.  A set bit is a literal byte; a clear bit is a
//! two-byte back-reference `[pos_lo, (pos_hi << 6) | (len - 3)]` into the
//! ring buffer, where `pos` is a 10-bit absolute ring position.
//!
//! The ring starts zeroed with its write cursor at `WINDOW_START`, so a
//! reference may point at bytes the stream never wrote.

use super::Decoded;
use crate::bytes::byte_at;

/// Ring buffer size.
pub const WINDOW_SIZE: usize = 1024;
/// Longest encodable match (`0x3F + THRESHOLD + 1`).
pub const MAX_MATCH: usize = 66;
/// Matches of this length or shorter are sent as literals.
pub const THRESHOLD: usize = 2;
/// Initial write cursor of the ring.
pub const WINDOW_START: usize = WINDOW_SIZE - MAX_MATCH;

/// Index meaning "no node".
const NIL: usize = WINDOW_SIZE;

pub fn decode(src: &[u8], raw_size: usize) -> Decoded {
    let mut window = [0u8; WINDOW_SIZE];
    let mut cursor = WINDOW_START;
    let mut out    = Vec::with_capacity(raw_size);
    let mut pos    = 0usize;
    let mut flags  = 0u16;

    while out.len() < raw_size {
        flags >>= 1;
        if flags & 0x100 == 0 {
            flags = 0xFF00 | u16::from(byte_at(src, pos));
            pos += 1;
        }
        if flags & 1 != 0 {
            let b = byte_at(src, pos);
            pos += 1;
            out.push(b);
            window[cursor] = b;
            cursor = (cursor + 1) % WINDOW_SIZE;
        } else {
            let lo = usize::from(byte_at(src, pos));
            let hi = usize::from(byte_at(src, pos + 1));
            pos += 2;
            let from = ((hi & 0xC0) << 2) | lo;
            let len  = (hi & 0x3F) + THRESHOLD + 1;
            for i in 0..len {
                if out.len() == raw_size {
                    break;
                }
                let b = window[(from + i) % WINDOW_SIZE];
                out.push(b);
                window[cursor] = b;
                cursor = (cursor + 1) % WINDOW_SIZE;
            }
        }
    }

    Decoded { data: out, consumed: pos }
}

// ── Encoder ──────────────────────────────────────────────────────────────────

/// Ring buffer plus binary search trees over every string in it.
///
/// Nodes are ring positions.  `rson[WINDOW_SIZE + 1 + c]` is the root of
/// the tree holding strings that start with byte `c`.
struct MatchTree {
    text: Vec<u8>,
    lson: Vec<usize>,
    rson: Vec<usize>,
    dad:  Vec<usize>,
    match_position: usize,
    match_length:   usize,
}

impl MatchTree {
    fn new() -> Self {
        Self {
            text: vec![0; WINDOW_SIZE + MAX_MATCH - 1],
            lson: vec![NIL; WINDOW_SIZE + 1],
            rson: vec![NIL; WINDOW_SIZE + 257],
            dad:  vec![NIL; WINDOW_SIZE + 1],
            match_position: 0,
            match_length:   0,
        }
    }

    /// Insert the string at `r` and record the longest match found on the
    /// way down.  A full-length match replaces the older node.
    fn insert(&mut self, r: usize) {
        let mut cmp: i32 = 1;
        let mut p = WINDOW_SIZE + 1 + usize::from(self.text[r]);
        self.rson[r] = NIL;
        self.lson[r] = NIL;
        self.match_length = 0;

        loop {
            if cmp >= 0 {
                if self.rson[p] != NIL {
                    p = self.rson[p];
                } else {
                    self.rson[p] = r;
                    self.dad[r] = p;
                    return;
                }
            } else if self.lson[p] != NIL {
                p = self.lson[p];
            } else {
                self.lson[p] = r;
                self.dad[r] = p;
                return;
            }

            let mut i = 1;
            while i < MAX_MATCH {
                cmp = i32::from(self.text[r + i]) - i32::from(self.text[p + i]);
                if cmp != 0 {
                    break;
                }
                i += 1;
            }
            if i > self.match_length {
                self.match_position = p;
                self.match_length = i;
                if i >= MAX_MATCH {
                    break;
                }
            }
        }

        self.dad[r]  = self.dad[p];
        self.lson[r] = self.lson[p];
        self.rson[r] = self.rson[p];
        let (left, right) = (self.lson[p], self.rson[p]);
        self.dad[left]  = r;
        self.dad[right] = r;
        self.replace_child(self.dad[p], p, r);
        self.dad[p] = NIL;
    }

    fn delete(&mut self, p: usize) {
        if self.dad[p] == NIL {
            return;
        }
        let q = if self.rson[p] == NIL {
            self.lson[p]
        } else if self.lson[p] == NIL {
            self.rson[p]
        } else {
            let mut q = self.lson[p];
            if self.rson[q] != NIL {
                while self.rson[q] != NIL {
                    q = self.rson[q];
                }
                let (parent, left) = (self.dad[q], self.lson[q]);
                self.rson[parent] = left;
                self.dad[left]    = parent;
                self.lson[q]      = self.lson[p];
                let moved = self.lson[p];
                self.dad[moved] = q;
            }
            self.rson[q] = self.rson[p];
            let moved = self.rson[p];
            self.dad[moved] = q;
            q
        };
        self.dad[q] = self.dad[p];
        self.replace_child(self.dad[p], p, q);
        self.dad[p] = NIL;
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if self.rson[parent] == old {
            self.rson[parent] = new;
        } else {
            self.lson[parent] = new;
        }
    }
}

/// Greedy LZSS over the match tree.  Produces a stream `decode` reads back.
pub fn encode(src: &[u8]) -> Vec<u8> {
    let mut out  = Vec::with_capacity(src.len() / 2 + 16);
    let mut tree = MatchTree::new();

    // code[0] holds the flags of up to eight units stored in code[1..].
    let mut code     = [0u8; 17];
    let mut code_len = 1usize;
    let mut mask     = 1u8;

    let mut s = 0usize;
    let mut r = WINDOW_START;
    let mut src_pos = 0usize;

    let mut len = 0usize;
    while len < MAX_MATCH && src_pos < src.len() {
        tree.text[r + len] = src[src_pos];
        src_pos += 1;
        len += 1;
    }
    if len == 0 {
        return out;
    }
    for i in 1..=MAX_MATCH {
        tree.insert(r - i);
    }
    tree.insert(r);

    loop {
        if tree.match_length > len {
            tree.match_length = len;
        }
        if tree.match_length <= THRESHOLD {
            tree.match_length = 1;
            code[0] |= mask;
            code[code_len] = tree.text[r];
            code_len += 1;
        } else {
            let position = tree.match_position;
            code[code_len]     = position as u8;
            code[code_len + 1] = (((position >> 2) & 0xC0) | (tree.match_length - (THRESHOLD + 1))) as u8;
            code_len += 2;
        }

        mask <<= 1;
        if mask == 0 {
            out.extend_from_slice(&code[..code_len]);
            code[0]  = 0;
            code_len = 1;
            mask     = 1;
        }

        let last_match_length = tree.match_length;
        let mut i = 0;
        while i < last_match_length && src_pos < src.len() {
            tree.delete(s);
            let c = src[src_pos];
            src_pos += 1;
            tree.text[s] = c;
            if s < MAX_MATCH - 1 {
                tree.text[s + WINDOW_SIZE] = c;
            }
            s = (s + 1) & (WINDOW_SIZE - 1);
            r = (r + 1) & (WINDOW_SIZE - 1);
            tree.insert(r);
            i += 1;
        }
        while i < last_match_length {
            i += 1;
            tree.delete(s);
            s = (s + 1) & (WINDOW_SIZE - 1);
            r = (r + 1) & (WINDOW_SIZE - 1);
            len -= 1;
            if len > 0 {
                tree.insert(r);
            }
        }
        if len == 0 {
            break;
        }
    }

    if code_len > 1 {
        out.extend_from_slice(&code[..code_len]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_only_stream() {
        let payload = [0x0F, 0x01, 0x02, 0x03, 0x04];
        let out = decode(&payload, 4);
        assert_eq!(out.data, vec![1, 2, 3, 4]);
        assert_eq!(out.consumed, 5);
    }

    #[test]
    fn reference_into_zeroed_ring() {
        // Flag 0: one back-reference of length 3 at ring position 0.
        let payload = [0x00, 0x00, 0x00];
        let out = decode(&payload, 3);
        assert_eq!(out.data, vec![0, 0, 0]);
        assert_eq!(out.consumed, 3);
    }

    #[test]
    fn copy_is_clamped_to_raw_size() {
        // Back-reference of 66 bytes, but only 5 requested.
        let payload = [0x00, 0x00, 0x3F];
        let out = decode(&payload, 5);
        assert_eq!(out.data.len(), 5);
    }

    #[test]
    fn empty_input_encodes_to_nothing() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[], 0).data.is_empty());
    }

    #[test]
    fn runs_compress() {
        let data = vec![0x55u8; 4096];
        let packed = encode(&data);
        assert!(packed.len() < data.len() / 10);
        assert_eq!(decode(&packed, data.len()).data, data);
    }

    #[test]
    fn wraps_the_ring_buffer() {
        let data: Vec<u8> = (0..3 * WINDOW_SIZE + 17)
            .map(|i| ((i * 7) % 251) as u8 ^ ((i / 300) as u8))
            .collect();
        let packed = encode(&data);
        let out = decode(&packed, data.len());
        assert_eq!(out.data, data);
        assert_eq!(out.consumed, packed.len());
    }
}
