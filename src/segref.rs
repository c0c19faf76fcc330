//! Segment reference table.
//!
//! A segment's address is embedded in code as a pair of 16-bit immediates:
//! ```text
//! value = (hi << 16) + sign_extend(lo)
//! ```
//! Writing an address back therefore adds one to `hi` whenever `lo` has its
//! sign bit set.  Several patch sites may share one segment name; all sites
//! with the same `(name, end)` key carry the same value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bytes::be16_at;
use crate::error::{Error, Result};
use crate::rom::Rom;

/// One patch site as listed in the game descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegRefEntry {
    pub segname: String,
    pub hi:      u32,
    pub lo:      u32,
    #[serde(default)]
    pub end:     bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegRef {
    pub name:  String,
    pub hi:    usize,
    pub lo:    usize,
    pub end:   bool,
    pub value: u32,
}

/// Combine two immediates into an address.
#[inline]
pub fn join_address(hi: u16, lo: u16) -> u32 {
    (u32::from(hi) << 16).wrapping_add(lo as i16 as i32 as u32)
}

/// Split an address into the immediates [`join_address`] reverses.
#[inline]
pub fn split_address(value: u32) -> (u16, u16) {
    let lo = value as u16;
    let mut hi = (value >> 16) as u16;
    if lo >= 0x8000 {
        hi = hi.wrapping_add(1);
    }
    (hi, lo)
}

#[derive(Debug, Clone, Default)]
pub struct SegRefTable {
    refs: Vec<SegRef>,
}

impl SegRefTable {
    /// Read every site's current value from `rom` and check that each
    /// `(name, end)` group agrees.
    pub fn load(entries: &[SegRefEntry], rom: &Rom) -> Result<Self> {
        let refs = entries
            .iter()
            .map(|e| {
                let (hi, lo) = (e.hi as usize, e.lo as usize);
                SegRef {
                    name:  e.segname.clone(),
                    hi,
                    lo,
                    end:   e.end,
                    value: join_address(rom.u16_at(hi), rom.u16_at(lo)),
                }
            })
            .collect();
        let table = Self::new(refs)?;
        debug!(sites = table.refs.len(), "loaded segment references");
        Ok(table)
    }

    pub fn new(mut refs: Vec<SegRef>) -> Result<Self> {
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        let mut seen: BTreeMap<(&str, bool), u32> = BTreeMap::new();
        for r in &refs {
            match seen.get(&(r.name.as_str(), r.end)) {
                Some(&first) if first != r.value => {
                    return Err(Error::SegRefMismatch {
                        name:   r.name.clone(),
                        end:    r.end,
                        first,
                        second: r.value,
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert((r.name.as_str(), r.end), r.value);
                }
            }
        }
        Ok(Self { refs })
    }

    /// Start address of `name`.
    pub fn resolve(&self, name: &str) -> Result<u32> {
        self.refs
            .iter()
            .find(|r| r.name == name && !r.end)
            .map(|r| r.value)
            .ok_or_else(|| Error::UnknownSegment(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.refs.iter().any(|r| r.name == name && !r.end)
    }

    /// Update every site of `(name, end)`.  Returns how many were updated.
    pub fn set(&mut self, name: &str, value: u32, end: bool) -> usize {
        let mut n = 0;
        for r in self.refs.iter_mut().filter(|r| r.name == name && r.end == end) {
            r.value = value;
            n += 1;
        }
        n
    }

    /// Write every site into `image`.
    pub fn patch(&self, image: &mut [u8]) -> Result<()> {
        for r in &self.refs {
            let (hi, lo) = split_address(r.value);
            put_u16(image, r.hi, hi)?;
            put_u16(image, r.lo, lo)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegRef> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

fn put_u16(image: &mut [u8], offset: usize, value: u16) -> Result<()> {
    let len = image.len();
    let slot = image
        .get_mut(offset..offset.saturating_add(2))
        .filter(|s| s.len() == 2)
        .ok_or_else(|| Error::Malformed(format!("patch site {offset:#x} outside a {len:#x} byte image")))?;
    slot.copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Read back the address stored at a pair of sites.
pub fn read_sites(image: &[u8], hi: usize, lo: usize) -> u32 {
    join_address(be16_at(image, hi), be16_at(image, lo))
}
