//! Immutable view over an input ROM image.
//!
//! Layout of the fields this crate reads:
//! ```text
//! 0x00  u32  magic 0x80371240
//! 0x3B  [4]  game identifier (ASCII)
//! ```
//! Reads past the end of the image are lenient and return zero.  Count and
//! offset tables are the exception: a table that does not fit inside the
//! image is rejected, since its count drives allocation.

use std::fs;
use std::path::Path;

use crate::block::{decode_block, DecodedBlock};
use crate::bytes::{be16_at, be32_at, byte_at, range_at, tail};
use crate::error::{Error, Result};

pub const ROM_MAGIC: u32 = 0x8037_1240;
pub const GAME_ID_OFFSET: usize = 59;
pub const GAME_ID_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct Rom {
    data: Vec<u8>,
}

impl Rom {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let magic = be32_at(&data, 0);
        if data.len() < 4 || magic != ROM_MAGIC {
            return Err(Error::BadMagic { found: hex::encode(range_at(&data, 0, 4)) });
        }
        Ok(Self { data })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| Error::file(path, e))?;
        Self::from_bytes(data)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The 4-character identifier at bytes 59..63, e.g. `NMVE`.
    pub fn game_id(&self) -> String {
        String::from_utf8_lossy(&range_at(&self.data, GAME_ID_OFFSET, GAME_ID_LEN)).into_owned()
    }

    // ── Lenient reads ────────────────────────────────────────────────────────

    #[inline]
    pub fn u8_at(&self, offset: usize) -> u8 {
        byte_at(&self.data, offset)
    }

    #[inline]
    pub fn u16_at(&self, offset: usize) -> u16 {
        be16_at(&self.data, offset)
    }

    #[inline]
    pub fn u32_at(&self, offset: usize) -> u32 {
        be32_at(&self.data, offset)
    }

    /// `len` bytes from `offset`, zero-filled past the end of the image.
    pub fn range(&self, offset: usize, len: usize) -> Vec<u8> {
        range_at(&self.data, offset, len)
    }

    /// Decode the compressed block at `offset`.
    pub fn block_at(&self, offset: usize) -> Result<DecodedBlock> {
        Ok(decode_block(tail(&self.data, offset))?)
    }

    // ── Tables ───────────────────────────────────────────────────────────────

    /// Read a `u32 count, u32 entry[count]` table at `base`.
    pub fn table(&self, base: usize) -> Result<Vec<u32>> {
        let count = self.u32_at(base) as usize;
        self.entries(base + 4, count)
            .map_err(|_| Error::Malformed(format!(
                "table at {base:#x} declares {count} entries, past the end of a {:#x} byte ROM",
                self.len()
            )))
    }

    /// `count` consecutive u32 words from `offset`, all inside the image.
    pub fn entries(&self, offset: usize, count: usize) -> Result<Vec<u32>> {
        let end = count
            .checked_mul(4)
            .and_then(|n| n.checked_add(offset))
            .filter(|&end| end <= self.len())
            .ok_or_else(|| Error::Malformed(format!("{count} words at {offset:#x} do not fit the ROM")))?;
        Ok(self.data[offset..end]
            .chunks_exact(4)
            .map(|w| be32_at(w, 0))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal image carrying the magic and `id` at the identifier slot.
    pub(crate) fn blank_rom(len: usize, id: &str) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[..4].copy_from_slice(&ROM_MAGIC.to_be_bytes());
        data[GAME_ID_OFFSET..GAME_ID_OFFSET + GAME_ID_LEN].copy_from_slice(id.as_bytes());
        data
    }

    #[test]
    fn magic_and_id() {
        let rom = Rom::from_bytes(blank_rom(0x100, "NMVE")).unwrap();
        assert_eq!(rom.game_id(), "NMVE");
        assert_eq!(rom.u32_at(0), ROM_MAGIC);
        assert_eq!(rom.u32_at(0x1000), 0);
    }

    #[test]
    fn bad_magic_is_malformed() {
        let err = Rom::from_bytes(vec![0x37, 0x80, 0x40, 0x12, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::BadMagic { ref found } if found == "37804012"));
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedInput);
        assert!(Rom::from_bytes(vec![0x80]).is_err());
    }

    #[test]
    fn tables_must_fit() {
        let mut data = blank_rom(0x80, "NMWE");
        data[0x40..0x44].copy_from_slice(&2u32.to_be_bytes());
        data[0x44..0x48].copy_from_slice(&0x10u32.to_be_bytes());
        data[0x48..0x4C].copy_from_slice(&0x20u32.to_be_bytes());
        let rom = Rom::from_bytes(data).unwrap();
        assert_eq!(rom.table(0x40).unwrap(), vec![0x10, 0x20]);

        let mut data = rom.as_bytes().to_vec();
        data[0x40..0x44].copy_from_slice(&0xFFFF_FFFFu32.to_be_bytes());
        let rom = Rom::from_bytes(data).unwrap();
        assert!(matches!(rom.table(0x40), Err(Error::Malformed(_))));
    }
}
