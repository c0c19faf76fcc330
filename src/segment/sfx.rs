//! Sound effect banks, copied as one blob.
//!
//! The blob ends where its last file ends; that file's `{u32 off, u32 size}`
//! header sits at `h`:
//! - `MBF0`: `h = 0x6C`
//! - legacy: `h = 4 + count * 8 + 32`, `count = u16@2`

use std::io::{Seek, Write};

use crate::error::Result;
use crate::format::BankLayout;
use crate::layout::LayoutWriter;
use crate::rom::Rom;
use crate::scheduler::{Batch, Slots, Ticket};
use crate::segref::SegRefTable;

use super::{take_bytes, Leaf, LeafData};

const MBF0_LAST_FILE: usize = 64 + 44;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfxBank {
    pub name:   String,
    pub base:   u32,
    pub layout: BankLayout,
    pub data:   Vec<u8>,
}

#[derive(Debug)]
pub struct SfxPlan {
    name:   String,
    base:   u32,
    layout: BankLayout,
    ticket: Ticket,
}

/// Byte length of the bank at `base`.
pub fn bank_len(rom: &Rom, base: usize, layout: BankLayout) -> usize {
    let header = match layout {
        BankLayout::Mbf0 => base + MBF0_LAST_FILE,
        BankLayout::Legacy => base + 4 + usize::from(rom.u16_at(base + 2)) * 8 + 32,
    };
    rom.u32_at(header) as usize + rom.u32_at(header + 4) as usize
}

impl SfxBank {
    pub fn plan(rom: &Rom, name: &str, base: u32, layout: BankLayout, batch: &mut Batch<Leaf>) -> Result<SfxPlan> {
        let seg = base as usize;
        let ticket = batch.submit(Leaf::slice(seg, bank_len(rom, seg, layout))?);
        Ok(SfxPlan { name: name.to_owned(), base, layout, ticket })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut LayoutWriter<W>, refs: &mut SegRefTable) -> Result<()> {
        w.segment(refs, &self.name, |w| w.write_bytes(&self.data))
    }
}

impl SfxPlan {
    pub fn assemble(self, slots: &mut Slots<LeafData>) -> Result<SfxBank> {
        Ok(SfxBank {
            name:   self.name,
            base:   self.base,
            layout: self.layout,
            data:   take_bytes(slots, self.ticket)?,
        })
    }
}
