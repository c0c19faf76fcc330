//! Raw block archives (background images and background animations).
//!
//! ```text
//! u32 n+1, u32 off[n+1]     (relative to base; off[n] marks the end)
//! block 0 … block n-1       (each padded to 2 bytes)
//! ```

use std::io::{Seek, Write};

use crate::error::{Error, Result};
use crate::layout::LayoutWriter;
use crate::rom::Rom;
use crate::scheduler::{Batch, Slots, Ticket};
use crate::segref::SegRefTable;

use super::{at, count32, take_bytes, Leaf, LeafData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArchive {
    pub name:   String,
    pub base:   u32,
    pub blocks: Vec<Vec<u8>>,
}

#[derive(Debug)]
pub struct ImagePlan {
    name:    String,
    base:    u32,
    tickets: Vec<Ticket>,
}

impl ImageArchive {
    pub fn plan(rom: &Rom, name: &str, base: u32, batch: &mut Batch<Leaf>) -> Result<ImagePlan> {
        let seg = base as usize;
        let offsets = rom.table(seg)?;
        if offsets.is_empty() {
            return Err(Error::Malformed(format!("{name}: block table at {seg:#x} has no end marker")));
        }
        let tickets = offsets
            .windows(2)
            .map(|pair| {
                let (start, end) = (pair[0], pair[1]);
                let len = end.checked_sub(start).ok_or_else(|| {
                    Error::Malformed(format!("{name}: block ends at {end:#x} before it starts at {start:#x}"))
                })?;
                Ok(batch.submit(Leaf::slice(at(seg, start)?, len as usize)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ImagePlan { name: name.to_owned(), base, tickets })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut LayoutWriter<W>, refs: &mut SegRefTable) -> Result<()> {
        w.segment(refs, &self.name, |w| {
            let slots = self.blocks.len() + 1;
            let mut table = w.begin_table(count32(slots, "blocks")?, slots)?;
            for block in &self.blocks {
                w.mark(&mut table)?;
                w.write_bytes(block)?;
                w.align(2, 0)?;
            }
            w.mark(&mut table)?;
            w.finish_table(table)
        })
    }
}

impl ImagePlan {
    pub fn assemble(self, slots: &mut Slots<LeafData>) -> Result<ImageArchive> {
        let blocks = self
            .tickets
            .into_iter()
            .map(|t| take_bytes(slots, t))
            .collect::<Result<Vec<_>>>()?;
        Ok(ImageArchive { name: self.name, base: self.base, blocks })
    }
}
