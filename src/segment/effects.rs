//! Effect table: `u32 ?, u32 count`, then `count` records of 0x208 bytes
//! and a 16 byte trailer.  Copied as one blob.

use std::io::{Seek, Write};

use crate::error::{Error, Result};
use crate::layout::LayoutWriter;
use crate::rom::Rom;
use crate::scheduler::{Batch, Slots, Ticket};
use crate::segref::SegRefTable;

use super::{take_bytes, Leaf, LeafData};

pub const EFFECT_RECORD_LEN: usize = 0x208;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectTable {
    pub name: String,
    pub base: u32,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct EffectPlan {
    name:   String,
    base:   u32,
    ticket: Ticket,
}

pub fn table_len(rom: &Rom, base: usize) -> Result<usize> {
    let count = rom.u32_at(base + 4) as usize;
    count
        .checked_mul(EFFECT_RECORD_LEN)
        .and_then(|n| n.checked_add(16))
        .ok_or_else(|| Error::Malformed(format!("effect table at {base:#x} declares {count} records")))
}

impl EffectTable {
    pub fn plan(rom: &Rom, name: &str, base: u32, batch: &mut Batch<Leaf>) -> Result<EffectPlan> {
        let seg = base as usize;
        let ticket = batch.submit(Leaf::slice(seg, table_len(rom, seg)?)?);
        Ok(EffectPlan { name: name.to_owned(), base, ticket })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut LayoutWriter<W>, refs: &mut SegRefTable) -> Result<()> {
        w.segment(refs, &self.name, |w| w.write_bytes(&self.data))
    }
}

impl EffectPlan {
    pub fn assemble(self, slots: &mut Slots<LeafData>) -> Result<EffectTable> {
        Ok(EffectTable { name: self.name, base: self.base, data: take_bytes(slots, self.ticket)? })
    }
}
